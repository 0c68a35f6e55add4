//! File system utilities for packaging.
//!
//! Copies preserve symbolic links as links and keep file permissions, so
//! launchers and native libraries stay executable in the install tree.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::{io, path::Path};
use tokio::fs;

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        remove_dir_all(path).await?;
    }
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Fs {
            context: "removing directory",
            path: path.to_path_buf(),
            error: e,
        }),
    }
}

/// Makes a symbolic link, replacing whatever is at `dst`.
#[cfg(unix)]
pub fn symlink(target: &Path, dst: &Path) -> Result<()> {
    if dst.symlink_metadata().is_ok() {
        if dst.is_dir() && !dst.is_symlink() {
            std::fs::remove_dir_all(dst).fs_context("replacing directory", dst)?;
        } else {
            std::fs::remove_file(dst).fs_context("replacing file", dst)?;
        }
    }
    std::os::unix::fs::symlink(target, dst).fs_context("creating symlink", dst)
}

#[cfg(windows)]
pub fn symlink(target: &Path, dst: &Path) -> Result<()> {
    if dst.symlink_metadata().is_ok() {
        std::fs::remove_file(dst).fs_context("replacing file", dst)?;
    }
    std::os::windows::fs::symlink_file(target, dst).fs_context("creating symlink", dst)
}

#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> Result<()> {
    let target = std::fs::read_link(src).fs_context("reading symlink", src)?;
    symlink(&target, dst)
}

#[cfg(windows)]
fn copy_link(src: &Path, dst: &Path) -> Result<()> {
    let target = std::fs::read_link(src).fs_context("reading symlink", src)?;
    let result = if src.is_dir() {
        std::os::windows::fs::symlink_dir(&target, dst)
    } else {
        std::os::windows::fs::symlink_file(&target, dst)
    };
    result.fs_context("creating symlink", dst)
}

/// Copies a regular file, creating the destination's parent directories.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.is_file() {
        return Err(Error::GenericError(format!(
            "{} is not a file",
            from.display()
        )));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}

/// Recursively copies a directory, merging into `to` if it already exists.
///
/// Symbolic links are recreated, never followed.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        return Err(Error::GenericError(format!(
            "{} is not a directory",
            from.display()
        )));
    }

    let from = from.to_path_buf();
    let to = to.to_path_buf();

    tokio::task::spawn_blocking(move || copy_tree(&from, &to))
        .await
        .map_err(|e| Error::GenericError(format!("Directory copy task panicked: {}", e)))?
}

/// Copies a file, directory or symbolic link to `to`.
pub async fn copy_entry(from: &Path, to: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(from)
        .await
        .fs_context("reading metadata", from)?;

    if metadata.file_type().is_symlink() {
        let (from, to) = (from.to_path_buf(), to.to_path_buf());
        return tokio::task::spawn_blocking(move || copy_link(&from, &to))
            .await
            .map_err(|e| Error::GenericError(format!("Symlink copy task panicked: {}", e)))?;
    }
    if metadata.is_dir() {
        return copy_dir(from, to).await;
    }
    copy_file(from, to).await
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
    }

    for entry in walkdir::WalkDir::new(from).sort_by_file_name() {
        let entry = entry?;
        let rel_path = entry.path().strip_prefix(from)?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            copy_link(entry.path(), &dest_path)?;
        } else if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest_path).fs_context("creating directory", &dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path).fs_context("copying file", entry.path())?;
        }
    }

    Ok(())
}

/// Adds execute permission for owner, group and others.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)
        .fs_context("reading permissions", path)?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions).fs_context("setting permissions", path)
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
