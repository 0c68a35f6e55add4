//! Install tree assembly and multi-target fan-out.
//!
//! [`package_target`] builds one target into its own output directory.
//! [`Packager`] runs it once per requested target on separate tokio tasks, so
//! a failing or panicking target never affects its siblings.

use super::context::PackagingContext;
use crate::bundler::{
    error::{Error, ErrorExt, Result},
    platform::{LAUNCHER, Target},
    settings::Application,
    toolchain::CommandRunner,
    utils::{archive, fs, http},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of packaging one target.
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: Target,
    /// Directory the target was built into.
    pub out_dir: PathBuf,
    /// Artifacts on success.
    pub result: Result<Vec<PathBuf>>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Builds `target` for `app` into `out_dir`.
///
/// # Process
///
/// 1. Clears and recreates `out_dir`
/// 2. Extracts the cached base distribution (not for generic)
/// 3. Renames the launcher root and binary after the application
/// 4. Recreates the payload directory with the launcher configuration
/// 5. Copies the source directory into the payload directory
/// 6. Runs the target's post-processing
pub async fn package_target<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    app: &Application,
    target: Target,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    log::info!("Packaging {} for {} into {}", app.name(), target, out_dir.display());
    fs::create_dir_all(out_dir, true).await?;

    let install_dir = out_dir.join(target.install_dir_name(app.name()));
    let payload_dir = install_dir.join(target.payload_rel_path());

    match target.distribution_url() {
        Some(url) => {
            let distribution = http::cached_download(url, ctx.cache_dir()).await?;
            archive::extract_distribution(&distribution, out_dir).await?;
            adopt_launcher(out_dir, &install_dir, app, target).await?;

            fs::create_dir_all(&payload_dir, true).await?;
            let config = payload_dir.join(format!("{}.cfg", app.name()));
            tokio::fs::write(&config, app.launcher_config())
                .await
                .fs_context("writing launcher configuration", &config)?;
        }
        None => fs::create_dir_all(&payload_dir, false).await?,
    }

    fs::copy_dir(app.source_dir(), &payload_dir).await?;
    log::debug!("Installed payload into {}", payload_dir.display());

    let artifacts = target.post_process(ctx, out_dir, app).await?;
    log::info!("✓ Packaged {} for {}", app.name(), target);
    Ok(artifacts)
}

/// Renames the extracted launcher root and binary after the application.
async fn adopt_launcher(
    out_dir: &Path,
    install_dir: &Path,
    app: &Application,
    target: Target,
) -> Result<()> {
    let launcher_dir = out_dir.join(target.launcher_dir_name());
    if !launcher_dir.is_dir() {
        return Err(Error::GenericError(format!(
            "base distribution for {} has no {}",
            target,
            target.launcher_dir_name()
        )));
    }
    if launcher_dir != install_dir {
        fs::remove_dir_all(install_dir).await?;
        tokio::fs::rename(&launcher_dir, install_dir)
            .await
            .fs_context("renaming launcher directory", &launcher_dir)?;
    }

    let from = install_dir.join(target.executable_rel_path(LAUNCHER));
    let to = install_dir.join(target.executable_rel_path(app.name()));
    if from != to {
        tokio::fs::rename(&from, &to)
            .await
            .fs_context("renaming launcher", &from)?;
    }
    Ok(())
}

/// Runs [`package_target`] for several targets concurrently.
#[derive(Debug)]
pub struct Packager<R> {
    ctx: Arc<PackagingContext<R>>,
    app: Arc<Application>,
}

impl<R> Clone for Packager<R> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            app: Arc::clone(&self.app),
        }
    }
}

impl<R: CommandRunner + 'static> Packager<R> {
    pub fn new(ctx: PackagingContext<R>, app: Application) -> Self {
        Self {
            ctx: Arc::new(ctx),
            app: Arc::new(app),
        }
    }

    pub fn context(&self) -> &PackagingContext<R> {
        &self.ctx
    }

    pub fn application(&self) -> &Application {
        &self.app
    }

    /// Builds one target into `<out_root>/<target short name>`.
    pub async fn package(&self, target: Target, out_root: &Path) -> TargetOutcome {
        let out_dir = out_root.join(target.short_name());
        let result = package_target(&self.ctx, &self.app, target, &out_dir).await;
        TargetOutcome {
            target,
            out_dir,
            result,
        }
    }

    /// Builds every target concurrently and waits for all of them.
    ///
    /// Outcomes are returned in the order of `targets`. Duplicates are built
    /// once.
    pub async fn package_all(&self, targets: &[Target], out_root: &Path) -> Vec<TargetOutcome> {
        let mut unique: Vec<Target> = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique.contains(target) {
                unique.push(*target);
            }
        }

        let handles: Vec<_> = unique
            .into_iter()
            .map(|target| {
                let packager = self.clone();
                let out_root = out_root.to_path_buf();
                let handle = tokio::spawn(async move { packager.package(target, &out_root).await });
                (target, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (target, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("{} build task failed: {}", target, e);
                    TargetOutcome {
                        target,
                        out_dir: out_root.join(target.short_name()),
                        result: Err(Error::GenericError(format!(
                            "{} build task failed: {}",
                            target, e
                        ))),
                    }
                }
            };
            if let Err(e) = &outcome.result {
                log::error!("{} failed: {}", target, e);
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
