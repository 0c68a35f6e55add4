//! macOS DMG disk image assembly.
//!
//! Images are built on Linux hosts: a sparse file is formatted as HFS+ in a
//! container, attached to a loop device with udisksctl, filled, torn down
//! and finally compressed with the `dmg` tool.
//!
//! # Architecture
//!
//! - `template` - Extracting the contents of a user supplied template image
//! - `creation` - Allocating and formatting a blank image
//! - `volume` - Loop device attachment, mounting and teardown
//! - `conversion` - Compressing (or keeping) the assembled image
//!
//! # States
//!
//! ```text
//! Idle -> TemplateAcquired -> ImageCreated -> Mounted -> ContentMerged
//!      -> Unmounted -> Compressed -> Done
//! Idle -> ScratchCreated -> ImageCreated -> ...
//! ```
//!
//! Any failure while using a template restarts assembly from scratch.

pub mod conversion;
pub mod creation;
pub mod template;
pub mod volume;

use crate::bundler::{
    builder::PackagingContext,
    error::{ErrorExt, Result},
    settings::Application,
    toolchain::CommandRunner,
    utils::fs,
};
use std::path::{Path, PathBuf};

/// Target of the `Applications` link placed next to the bundle.
pub const APPLICATIONS_LINK: &str = "/Applications";

/// A step of disk image assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmgState {
    Idle,
    TemplateAcquired,
    ScratchCreated,
    ImageCreated,
    Mounted,
    ContentMerged,
    Unmounted,
    Compressed,
    Done,
}

/// Record of one assembly run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DmgReport {
    transitions: Vec<DmgState>,
    fallback: Option<String>,
    mounts: usize,
    teardowns: usize,
    output: Option<PathBuf>,
}

impl DmgReport {
    fn enter(&mut self, state: DmgState) {
        log::debug!("DMG assembly: {:?}", state);
        self.transitions.push(state);
    }

    /// Every state entered, in order.
    pub fn transitions(&self) -> &[DmgState] {
        &self.transitions
    }

    /// Why the template path was abandoned, if it was.
    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn mounts(&self) -> usize {
        self.mounts
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns
    }

    /// The final image, once assembly is done.
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    fn fall_back(&mut self, reason: String) {
        log::warn!("DMG template unusable, building from scratch: {}", reason);
        self.fallback = Some(reason);
    }
}

/// `<name>-<version>.dmg` and its uncompressed intermediate.
pub fn image_paths(out_dir: &Path, app: &Application) -> (PathBuf, PathBuf) {
    let stem = format!("{}-{}", app.name(), app.version());
    (
        out_dir.join(format!("{}.dmg", stem)),
        out_dir.join(format!("{}-uncompressed.dmg", stem)),
    )
}

/// Builds the DMG for `bundle` in `out_dir`.
///
/// Template problems are never fatal: acquisition failures and failures of
/// template-based assembly both fall back to a scratch image.
pub async fn build<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    out_dir: &Path,
    bundle: &Path,
    app: &Application,
) -> Result<DmgReport> {
    let mut report = DmgReport::default();
    report.enter(DmgState::Idle);

    let (output, uncompressed) = image_paths(out_dir, app);
    log::info!("Creating DMG {}", output.display());

    let result = assemble_with_fallback(ctx, bundle, app, &uncompressed, &mut report).await;
    let result = match result {
        Ok(()) => conversion::finalize(ctx, &uncompressed, &output, app.dmg().compress).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        discard(&uncompressed).await;
        return Err(e);
    }

    report.enter(DmgState::Compressed);
    report.output = Some(output.clone());
    report.enter(DmgState::Done);
    log::info!("✓ Created DMG: {}", output.display());
    Ok(report)
}

async fn assemble_with_fallback<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    bundle: &Path,
    app: &Application,
    uncompressed: &Path,
    report: &mut DmgReport,
) -> Result<()> {
    let contents = match app.dmg().template.as_deref() {
        None => None,
        Some(template) => match template::acquire(ctx, template).await {
            Ok(contents) => {
                report.enter(DmgState::TemplateAcquired);
                Some(contents)
            }
            Err(e) => {
                report.fall_back(e.to_string());
                None
            }
        },
    };

    if let Some(contents) = contents {
        let result = assemble(ctx, bundle, app, uncompressed, Some(contents.path()), report).await;
        ctx.release(&contents);
        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                report.fall_back(e.to_string());
                discard(uncompressed).await;
            }
        }
    }

    report.enter(DmgState::ScratchCreated);
    assemble(ctx, bundle, app, uncompressed, None, report).await
}

async fn assemble<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    bundle: &Path,
    app: &Application,
    image: &Path,
    template: Option<&Path>,
    report: &mut DmgReport,
) -> Result<()> {
    creation::create_image(ctx, image, app.name()).await?;
    report.enter(DmgState::ImageCreated);

    let volume = volume::attach(ctx, image, false).await?;
    report.mounts += 1;
    report.enter(DmgState::Mounted);

    let merged = merge(volume.mount_point(), template, bundle, app).await;
    if merged.is_ok() {
        report.enter(DmgState::ContentMerged);
    }

    volume.teardown(ctx).await;
    report.teardowns += 1;
    report.enter(DmgState::Unmounted);

    merged
}

/// Fills a mounted volume.
///
/// Template entries are copied first, then any bundle the template carried is
/// replaced by ours and the Applications link is (re)created.
pub async fn merge(
    mount_point: &Path,
    template: Option<&Path>,
    bundle: &Path,
    app: &Application,
) -> Result<()> {
    if let Some(template) = template {
        let mut entries = tokio::fs::read_dir(template)
            .await
            .fs_context("reading template contents", template)?;
        while let Some(entry) = entries.next_entry().await? {
            let dst = mount_point.join(entry.file_name());
            if let Err(e) = fs::copy_entry(&entry.path(), &dst).await {
                log::warn!("Could not copy template entry {}: {}", entry.path().display(), e);
            }
        }
    }

    let mut entries = tokio::fs::read_dir(mount_point)
        .await
        .fs_context("reading mounted volume", mount_point)?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_bundle = path.extension().is_some_and(|ext| ext == "app");
        if is_bundle && entry.file_type().await?.is_dir() {
            log::debug!("Removing template bundle {}", path.display());
            fs::remove_dir_all(&path).await?;
        }
    }

    fs::copy_dir(bundle, &mount_point.join(format!("{}.app", app.name()))).await?;
    fs::symlink(Path::new(APPLICATIONS_LINK), &mount_point.join("Applications"))?;
    Ok(())
}

async fn discard(image: &Path) {
    match tokio::fs::remove_file(image).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {}", image.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_records_fallback() {
        let mut report = DmgReport::default();
        report.enter(DmgState::Idle);
        report.fall_back("DMG template not found: /nope.dmg".into());
        report.enter(DmgState::ScratchCreated);
        assert_eq!(report.transitions(), [DmgState::Idle, DmgState::ScratchCreated]);
        assert_eq!(report.fallback(), Some("DMG template not found: /nope.dmg"));
        assert!(report.output().is_none());
    }
}
