//! JVM application packaging.
//!
//! Turns a directory of jars into a generic archive, Linux AppImages, a
//! macOS application bundle and disk image, and a Windows installer.

pub mod builder;
pub mod error;
pub mod icon;
pub mod platform;
pub mod registry;
pub mod settings;
pub mod toolchain;
pub mod utils;

pub use builder::{PackagingContext, Packager, TargetOutcome, package_target};
pub use error::{Error, Result};
pub use platform::Target;
pub use registry::{CleanupGuard, TempDirHandle, TempRegistry};
pub use settings::{Application, ApplicationBuilder, DmgSettings, IconInputs, SigningSettings};
pub use toolchain::{CommandRunner, HostRunner, ProcessOutput, ToolInvocation};
