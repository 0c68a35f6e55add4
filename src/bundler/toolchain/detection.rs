//! Container engine detection.
//!
//! Detection runs once per process and is cached: a packaging run never
//! switches engines half way through.

use super::container::{ContainerEngine, EngineKind};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Directories searched when an engine is not on `PATH`.
const COMMON_LOCATIONS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/bin", "/bin"];

/// Engine detected on this host, if any.
pub static CONTAINER_ENGINE: LazyLock<Option<ContainerEngine>> = LazyLock::new(select_engine);

/// Returns the first working engine, docker preferred over podman.
pub fn select_engine() -> Option<ContainerEngine> {
    select_engine_with(|kind| locate(kind.binary_name()))
}

/// Engine selection with an injectable probe, for deterministic tests.
pub fn select_engine_with<F>(mut probe: F) -> Option<ContainerEngine>
where
    F: FnMut(EngineKind) -> Option<PathBuf>,
{
    for kind in [EngineKind::Docker, EngineKind::Podman] {
        if let Some(binary) = probe(kind) {
            log::info!("✓ Using {} at {}", kind, binary.display());
            return Some(ContainerEngine::new(kind, binary));
        }
    }
    log::debug!("Neither docker nor podman found");
    None
}

/// Finds `name` on `PATH` or in the common locations and checks that it runs.
fn locate(name: &str) -> Option<PathBuf> {
    let candidates = which::which(name)
        .ok()
        .into_iter()
        .chain(COMMON_LOCATIONS.iter().map(|dir| Path::new(dir).join(name)));

    for candidate in candidates {
        if !candidate.is_file() {
            continue;
        }
        if responds_to_version(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn responds_to_version(path: &Path) -> bool {
    match std::process::Command::new(path).arg("--version").output() {
        Ok(output) if output.status.success() => {
            log::debug!(
                "{}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stdout).trim()
            );
            true
        }
        Ok(output) => {
            log::warn!(
                "{} found but --version check failed (exit code: {:?})",
                path.display(),
                output.status.code()
            );
            false
        }
        Err(e) => {
            log::warn!("{} found but failed to execute: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_preferred_when_both_present() {
        let engine = select_engine_with(|kind| Some(PathBuf::from(format!("/usr/bin/{kind}"))))
            .unwrap();
        assert_eq!(engine.kind(), EngineKind::Docker);
    }

    #[test]
    fn test_podman_selected_when_docker_missing() {
        let engine = select_engine_with(|kind| match kind {
            EngineKind::Docker => None,
            EngineKind::Podman => Some(PathBuf::from("/opt/bin/podman")),
        })
        .unwrap();
        assert_eq!(engine.kind(), EngineKind::Podman);
        assert_eq!(engine.binary(), Path::new("/opt/bin/podman"));
    }

    #[test]
    fn test_none_when_nothing_found() {
        assert!(select_engine_with(|_| None).is_none());
    }

    #[test]
    fn test_locate_rejects_unknown_binary() {
        assert!(locate("kpacker-definitely-not-a-command").is_none());
    }
}
