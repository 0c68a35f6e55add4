//! Cached downloads of base distributions and the default icon.
//!
//! A cache hit is any regular file already at the cache path; there is no
//! freshness check. Each download lands in its own uniquely named `.part`
//! file and is renamed into place, so an interrupted transfer never leaves a
//! truncated hit and concurrent misses for one URL never share a file.

use crate::bundler::error::{Context, Error, ErrorExt, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Linux arm64 launcher and runtime.
pub const LINUX_ARM64_URL: &str = "https://github.com/teras/KPacker/releases/download/filerepo/linux_arm64_template.zip";
/// Linux x64 launcher and runtime.
pub const LINUX_X64_URL: &str = "https://github.com/teras/KPacker/releases/download/filerepo/linux_x64_template.zip";
/// macOS x64 app bundle skeleton and runtime.
pub const MAC_X64_URL: &str = "https://github.com/teras/KPacker/releases/download/filerepo/mac_x64_template.zip";
/// Windows x64 launcher and runtime.
pub const WINDOWS_X64_URL: &str = "https://github.com/teras/KPacker/releases/download/filerepo/windows_x64_template.zip";
/// Icon used when the user supplies none.
pub const DEFAULT_ICON_URL: &str = "https://github.com/teras/KPacker/releases/download/filerepo/default_icon.png";

/// `$HOME/.cache/jubpak/jres`.
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".cache").join("jubpak").join("jres"))
        .context("could not determine home directory for the download cache")
}

/// Cache location for `url`: its last path segment under `cache_dir`.
pub fn cache_path(url: &str, cache_dir: &Path) -> Result<PathBuf> {
    let parsed = url::Url::parse(url)?;
    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .with_context(|| format!("download URL {} has no file name", url))?;
    Ok(cache_dir.join(file_name))
}

/// Returns the cached copy of `url`, downloading it on a miss.
pub async fn cached_download(url: &str, cache_dir: &Path) -> Result<PathBuf> {
    let target = cache_path(url, cache_dir)?;

    match tokio::fs::symlink_metadata(&target).await {
        Ok(meta) if meta.is_file() => {
            log::debug!("Using cached {}", target.display());
            return Ok(target);
        }
        Ok(meta) if meta.is_dir() => {
            tokio::fs::remove_dir_all(&target)
                .await
                .fs_context("removing stale cache entry", &target)?;
        }
        Ok(_) => {
            tokio::fs::remove_file(&target)
                .await
                .fs_context("removing stale cache entry", &target)?;
        }
        Err(_) => {}
    }

    tokio::fs::create_dir_all(cache_dir)
        .await
        .fs_context("creating cache directory", cache_dir)?;

    log::info!("Downloading {}", url);
    let mut response = reqwest::get(url).await?.error_for_status()?;

    let partial = partial_path(&target);
    let mut file = tokio::fs::File::create(&partial)
        .await
        .fs_context("creating download file", &partial)?;

    let mut total = 0usize;
    while let Some(chunk) = response.chunk().await? {
        total += chunk.len();
        file.write_all(&chunk)
            .await
            .fs_context("writing download file", &partial)?;
    }
    file.flush()
        .await
        .fs_context("writing download file", &partial)?;
    drop(file);

    if total == 0 {
        discard(&partial).await;
        return Err(Error::GenericError(format!("empty download from {}", url)));
    }

    if let Err(e) = tokio::fs::rename(&partial, &target).await {
        discard(&partial).await;
        // Another download of the same URL may have finished first.
        if tokio::fs::metadata(&target).await.is_ok_and(|m| m.is_file()) {
            log::debug!("Using concurrently downloaded {}", target.display());
            return Ok(target);
        }
        return Err(e).fs_context("finalizing download", &target);
    }
    log::info!("✓ Downloaded {} ({} bytes)", target.display(), total);

    Ok(target)
}

/// `<file>.<uuid>.part` next to `target`.
fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!("{}.{}.part", name, uuid::Uuid::new_v4().simple()))
}

async fn discard(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        log::debug!("Could not remove {}: {}", partial.display(), e);
    }
}
