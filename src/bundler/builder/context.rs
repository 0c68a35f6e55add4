//! Shared dependencies of a packaging run.

use crate::bundler::error::{Error, Result};
use crate::bundler::registry::{TempDirHandle, TempRegistry};
use crate::bundler::toolchain::{
    CommandRunner, ContainerEngine, ContainerRunner, ProcessOutput, ToolInvocation,
    require_success,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a target build needs besides the descriptor.
///
/// The registry is the only mutable state shared between concurrently
/// running targets. The engine is detected once by the caller and may be
/// absent; only the stages that actually need a container fail then.
#[derive(Debug)]
pub struct PackagingContext<R> {
    registry: Arc<TempRegistry>,
    runner: R,
    engine: Option<ContainerEngine>,
    cache_dir: PathBuf,
}

impl<R: CommandRunner> PackagingContext<R> {
    pub fn new(
        registry: Arc<TempRegistry>,
        runner: R,
        engine: Option<ContainerEngine>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            runner,
            engine,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn registry(&self) -> &Arc<TempRegistry> {
        &self.registry
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Directory holding downloaded distributions and the default icon.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The detected container engine.
    pub fn engine(&self) -> Result<&ContainerEngine> {
        self.engine.as_ref().ok_or(Error::NoToolchainAvailable)
    }

    /// Creates a container runner with a fresh working directory.
    pub fn container_runner(&self, prefix: &str, suffix: &str) -> Result<ContainerRunner> {
        ContainerRunner::new(self.engine()?.clone(), self.registry.clone(), prefix, suffix)
    }

    /// Creates a registry-owned temp directory.
    pub fn temp_dir(&self, prefix: &str, suffix: &str) -> Result<TempDirHandle> {
        self.registry.create(prefix, suffix)
    }

    pub fn release(&self, handle: &TempDirHandle) {
        self.registry.release(handle);
    }

    /// Runs `invocation`; the exit code is left to the caller.
    pub async fn run(&self, invocation: &ToolInvocation) -> Result<ProcessOutput> {
        self.runner.output(invocation).await
    }

    /// Runs a required step.
    pub async fn require(&self, invocation: &ToolInvocation, step: &str) -> Result<ProcessOutput> {
        require_success(&self.runner, invocation, step).await
    }

    /// Runs a best-effort step, logging instead of failing.
    ///
    /// Returns whether the step succeeded.
    pub async fn attempt(&self, invocation: &ToolInvocation, step: &str) -> bool {
        match self.require(invocation, step).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("{} skipped: {}", step, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::toolchain::HostRunner;

    #[test]
    fn test_missing_engine_fails_only_on_use() {
        let root = tempfile::tempdir().unwrap();
        let ctx = PackagingContext::new(
            Arc::new(TempRegistry::with_root(root.path())),
            HostRunner,
            None,
            root.path().join("cache"),
        );

        let handle = ctx.temp_dir("plain-", "").unwrap();
        assert!(handle.path().is_dir());
        assert!(matches!(
            ctx.container_runner("work-", ""),
            Err(Error::NoToolchainAvailable)
        ));
        ctx.release(&handle);
        assert!(ctx.registry().is_empty());
    }
}
