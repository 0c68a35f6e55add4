//! Per-target configurators.
//!
//! The target set is closed: each variant describes the install tree layout
//! of its base distribution and the post-processing that turns the
//! assembled tree into distributable artifacts.

pub mod generic;
pub mod linux;
pub mod macos;
pub mod windows;

use crate::bundler::builder::PackagingContext;
use crate::bundler::error::Result;
use crate::bundler::settings::Application;
use crate::bundler::toolchain::CommandRunner;
use crate::bundler::utils::http;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the launcher root and binary inside every base distribution.
pub const LAUNCHER: &str = "Launcher";

/// A packaging target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Target {
    /// tar.gz with a shell launcher, no bundled runtime
    #[value(name = "generic", alias = "Generic")]
    Generic,
    /// AppImage for 64-bit ARM Linux
    #[value(name = "linux-arm64", alias = "LinuxArm64")]
    LinuxArm64,
    /// AppImage for x86_64 Linux
    #[value(name = "linux-x64", alias = "LinuxX64")]
    LinuxX64,
    /// App bundle and DMG for Intel macOS
    #[value(name = "mac-x64", alias = "MacX64")]
    MacX64,
    /// Inno Setup installer for 64-bit Windows
    #[value(name = "windows-x64", alias = "WindowsX64")]
    WindowsX64,
}

impl Target {
    /// Every target, in declaration order.
    pub const ALL: [Target; 5] = [
        Target::Generic,
        Target::LinuxArm64,
        Target::LinuxX64,
        Target::MacX64,
        Target::WindowsX64,
    ];

    /// Name of the target's output subdirectory.
    pub fn short_name(self) -> &'static str {
        match self {
            Target::Generic => "generic",
            Target::LinuxArm64 => "linux-arm64",
            Target::LinuxX64 => "linux-x64",
            Target::MacX64 => "mac-x64",
            Target::WindowsX64 => "windows-x64",
        }
    }

    /// Base distribution URL; `None` when no runtime is bundled.
    pub fn distribution_url(self) -> Option<&'static str> {
        match self {
            Target::Generic => None,
            Target::LinuxArm64 => Some(http::LINUX_ARM64_URL),
            Target::LinuxX64 => Some(http::LINUX_X64_URL),
            Target::MacX64 => Some(http::MAC_X64_URL),
            Target::WindowsX64 => Some(http::WINDOWS_X64_URL),
        }
    }

    /// Root directory extracted from the base distribution.
    pub fn launcher_dir_name(self) -> String {
        self.install_dir_name(LAUNCHER)
    }

    /// Install root for an application called `name`.
    pub fn install_dir_name(self, name: &str) -> String {
        match self {
            Target::MacX64 => format!("{}.app", name),
            _ => name.to_string(),
        }
    }

    /// Main executable relative to the install root.
    pub fn executable_rel_path(self, name: &str) -> PathBuf {
        match self {
            Target::Generic => PathBuf::from(name),
            Target::LinuxArm64 | Target::LinuxX64 => Path::new("bin").join(name),
            Target::MacX64 => Path::new("Contents/MacOS").join(name),
            Target::WindowsX64 => PathBuf::from(format!("{}.exe", name)),
        }
    }

    /// Directory receiving the payload, relative to the install root.
    pub fn payload_rel_path(self) -> &'static str {
        match self {
            Target::Generic => "lib",
            Target::LinuxArm64 | Target::LinuxX64 => "lib/app",
            Target::MacX64 => "Contents/app",
            Target::WindowsX64 => "app",
        }
    }

    /// Turns the assembled install tree in `out_dir` into artifacts.
    pub async fn post_process<R: CommandRunner>(
        self,
        ctx: &PackagingContext<R>,
        out_dir: &Path,
        app: &Application,
    ) -> Result<Vec<PathBuf>> {
        match self {
            Target::Generic => generic::post_process(out_dir, app).await,
            Target::LinuxArm64 => {
                linux::appimage::post_process(ctx, out_dir, app, linux::LinuxArch::Arm64).await
            }
            Target::LinuxX64 => {
                linux::appimage::post_process(ctx, out_dir, app, linux::LinuxArch::X64).await
            }
            Target::MacX64 => macos::post_process(ctx, out_dir, app).await,
            Target::WindowsX64 => windows::inno::post_process(ctx, out_dir, app).await,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
