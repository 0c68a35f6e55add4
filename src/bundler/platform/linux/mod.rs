//! Linux packaging.

pub mod appimage;

use std::fmt;

/// CPU architecture of a Linux target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinuxArch {
    Arm64,
    X64,
}

impl LinuxArch {
    /// Name understood by appimagetool's `ARCH` variable.
    pub fn appimage_arch(self) -> &'static str {
        match self {
            LinuxArch::Arm64 => "aarch64",
            LinuxArch::X64 => "x86_64",
        }
    }
}

impl fmt::Display for LinuxArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.appimage_arch())
    }
}
