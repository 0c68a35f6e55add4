//! DMG template acquisition.
//!
//! A template is a `.dmg`, or a `.zip` holding one. Its top-level contents
//! are copied out of the mounted image into a registry-owned directory so
//! they can be merged into the new image later.

use super::volume;
use crate::{
    bail,
    bundler::{
        builder::PackagingContext,
        error::Result,
        registry::TempDirHandle,
        toolchain::CommandRunner,
        utils::{archive, fs},
    },
};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filesystem journal entries that cannot be copied out of an HFS+ volume.
pub fn is_journal_entry(name: &str) -> bool {
    name.starts_with(".journal") || name == ".journal_info_block"
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
}

/// First `.dmg` under `dir`, in sorted walk order.
pub fn find_dmg(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && has_extension(entry.path(), "dmg"))
        .map(|entry| entry.into_path())
}

/// Extracts the template's contents into a new registry-owned directory.
pub async fn acquire<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    template: &Path,
) -> Result<TempDirHandle> {
    if !template.is_file() {
        bail!("DMG template not found: {}", template.display());
    }

    let contents = ctx.temp_dir("dmg-template-", "-extract")?;
    let result = if has_extension(template, "zip") {
        from_zip(ctx, template, contents.path()).await
    } else if has_extension(template, "dmg") {
        extract_contents(ctx, template, contents.path()).await
    } else {
        Err(crate::bundler::Error::GenericError(format!(
            "DMG template must be a .zip or .dmg file: {}",
            template.display()
        )))
    };

    match result {
        Ok(()) => {
            log::debug!("Template contents extracted to {}", contents.path().display());
            Ok(contents)
        }
        Err(e) => {
            ctx.release(&contents);
            Err(e)
        }
    }
}

async fn from_zip<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    template: &Path,
    contents: &Path,
) -> Result<()> {
    let unpacked = ctx.temp_dir("dmg-zip-", "-extract")?;
    let result = async {
        archive::extract_zip(template, unpacked.path()).await?;
        let Some(dmg) = find_dmg(unpacked.path()) else {
            bail!("no DMG file found in template {}", template.display());
        };
        log::debug!("Found template image {}", dmg.display());
        extract_contents(ctx, &dmg, contents).await
    }
    .await;
    ctx.release(&unpacked);
    result
}

/// Copies the top-level entries of the image `dmg` into `dest`.
///
/// Entries that fail to copy are logged and skipped.
pub async fn extract_contents<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    dmg: &Path,
    dest: &Path,
) -> Result<()> {
    let volume = volume::attach(ctx, dmg, true).await?;
    let copied = copy_top_level(volume.mount_point(), dest).await;
    volume.teardown(ctx).await;
    copied
}

async fn copy_top_level(mount_point: &Path, dest: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(mount_point).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if is_journal_entry(&name.to_string_lossy()) {
            log::debug!("Skipping {}", name.to_string_lossy());
            continue;
        }
        if let Err(e) = fs::copy_entry(&entry.path(), &dest.join(&name)).await {
            log::warn!("Could not copy template entry {}: {}", entry.path().display(), e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_entries() {
        assert!(is_journal_entry(".journal"));
        assert!(is_journal_entry(".journal_info_block"));
        assert!(!is_journal_entry(".background"));
        assert!(!is_journal_entry(".DS_Store"));
    }

    #[test]
    fn test_find_dmg_nested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"").unwrap();
        std::fs::write(dir.path().join("b/inner/Layout.DMG"), b"").unwrap();
        assert_eq!(
            find_dmg(dir.path()).unwrap(),
            dir.path().join("b/inner/Layout.DMG")
        );
        std::fs::remove_file(dir.path().join("b/inner/Layout.DMG")).unwrap();
        assert!(find_dmg(dir.path()).is_none());
    }
}
