//! Containerized toolchain invocation.
//!
//! All image conversion, signing, disk-image and installer tools run inside
//! a single builder image. Host directories are bind-mounted read-write and
//! the container is always started with `--rm`, so it is removed when the
//! command exits whatever the exit code.

use super::ToolInvocation;
use crate::bundler::error::Result;
use crate::bundler::registry::{TempDirHandle, TempRegistry};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Image bundling every external packaging tool.
pub const BUILDER_IMAGE: &str = "docker.io/teras/appimage-builder";

/// Mount point of a [`ContainerRunner`]'s working directory.
pub const WORK_MOUNT: &str = "/work";

/// Supported container engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Docker,
    Podman,
}

impl EngineKind {
    /// Executable name looked up on the host.
    pub fn binary_name(self) -> &'static str {
        match self {
            EngineKind::Docker => "docker",
            EngineKind::Podman => "podman",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// A read-write bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub host: PathBuf,
    pub container: String,
}

impl VolumeMount {
    pub fn new(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }

    fn as_arg(&self) -> String {
        format!("{}:{}", self.host.display(), self.container)
    }
}

/// A detected container engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEngine {
    kind: EngineKind,
    binary: PathBuf,
}

impl ContainerEngine {
    pub fn new(kind: EngineKind, binary: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            binary: binary.into(),
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Builds `<engine> run --rm -t -v ... [-w dir] <image> sh -c <command>`.
    pub fn invocation(
        &self,
        mounts: &[VolumeMount],
        workdir: Option<&str>,
        command: &str,
    ) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(self.binary.to_string_lossy())
            .args(["run", "--rm", "-t"]);

        for mount in mounts {
            invocation = invocation.arg("-v").arg(mount.as_arg());
        }
        if let Some(dir) = workdir {
            invocation = invocation.arg("-w").arg(dir);
        }

        invocation.arg(BUILDER_IMAGE).args(["sh", "-c"]).arg(command)
    }
}

/// Runs shell commands in a container with a private working directory.
///
/// The working directory is a registry-owned temp dir mounted at `/work`;
/// callers stage input files there before invoking tools and collect the
/// results afterwards.
#[derive(Debug)]
pub struct ContainerRunner {
    engine: ContainerEngine,
    registry: Arc<TempRegistry>,
    workdir: TempDirHandle,
}

impl ContainerRunner {
    /// Allocates a working directory named `<prefix>...<suffix>` in `registry`.
    pub fn new(
        engine: ContainerEngine,
        registry: Arc<TempRegistry>,
        prefix: &str,
        suffix: &str,
    ) -> Result<Self> {
        let workdir = registry.create(prefix, suffix)?;
        Ok(Self {
            engine,
            registry,
            workdir,
        })
    }

    /// Host side of the working directory.
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Wraps `command` to run inside the container from `/work`.
    pub fn invoke(&self, command: &str) -> ToolInvocation {
        self.engine.invocation(
            &[VolumeMount::new(self.workdir.path(), WORK_MOUNT)],
            Some(WORK_MOUNT),
            command,
        )
    }

    /// Releases the working directory.
    pub fn dispose(self) {
        self.registry.release(&self.workdir);
    }
}

/// Single-quotes `value` for `sh -c`.
pub fn quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+%@,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
