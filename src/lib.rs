//! JVM application packager
//!
//! This library packages a directory of compiled jars into:
//! - a generic tar.gz with a shell launcher
//! - Linux AppImages (arm64, x64)
//! - a macOS application bundle and DMG, optionally signed and notarized
//! - a Windows Inno Setup installer
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;

// Re-export commonly used types
pub use error::{BundlerError, CliError, Result};
