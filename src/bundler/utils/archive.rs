//! Zip extraction and tar.gz creation.

use crate::bundler::error::{Error, ErrorExt, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Entry of a distribution zip that describes the archive instead of being extracted.
pub const METADATA_ENTRY: &str = ".metadata";

/// Contents of a distribution's `.metadata` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ArchiveMetadata {
    /// Paths, relative to the extraction root, that must be executable.
    #[serde(default)]
    pub executables: Vec<String>,
}

/// Extracts a base distribution and applies its executable list.
pub async fn extract_distribution(archive: &Path, dest: &Path) -> Result<ArchiveMetadata> {
    log::info!("Extracting {}", archive.display());
    let data = tokio::fs::read(archive)
        .await
        .fs_context("reading archive", archive)?;

    let (count, metadata) = extract_entries(data, dest).await?;
    log::debug!("Extracted {} files into {}", count, dest.display());

    let metadata = metadata.unwrap_or_default();
    for relative in &metadata.executables {
        let path = dest.join(relative.trim_start_matches('/'));
        if !path.is_file() {
            log::warn!("Listed executable {} was not extracted", path.display());
            continue;
        }
        super::fs::make_executable(&path)?;
    }

    Ok(metadata)
}

/// Extracts every file entry of a zip archive into `dest`.
pub async fn extract_zip(archive: &Path, dest: &Path) -> Result<usize> {
    let data = tokio::fs::read(archive)
        .await
        .fs_context("reading archive", archive)?;
    let (count, _) = extract_entries(data, dest).await?;
    Ok(count)
}

async fn extract_entries(data: Vec<u8>, dest: &Path) -> Result<(usize, Option<ArchiveMetadata>)> {
    use async_zip::base::read::mem::ZipFileReader;
    use futures_lite::io::AsyncReadExt as _;

    let reader = ZipFileReader::new(data)
        .await
        .map_err(|e| Error::GenericError(format!("Failed to read ZIP archive: {}", e)))?;

    let mut count = 0;
    let mut metadata = None;

    for i in 0..reader.file().entries().len() {
        let entry = reader
            .file()
            .entries()
            .get(i)
            .ok_or_else(|| Error::GenericError(format!("Failed to get ZIP entry {}", i)))?;

        let filename = entry
            .filename()
            .as_str()
            .map_err(|e| Error::GenericError(format!("Invalid filename in ZIP: {}", e)))?
            .to_string();

        let is_dir = entry
            .dir()
            .map_err(|e| Error::GenericError(format!("Failed to inspect ZIP entry: {}", e)))?;
        if is_dir {
            continue;
        }

        let mut entry_reader = reader
            .reader_with_entry(i)
            .await
            .map_err(|e| Error::GenericError(format!("Failed to read ZIP entry: {}", e)))?;
        let mut content = Vec::new();
        entry_reader.read_to_end(&mut content).await?;

        if filename.trim_start_matches('/') == METADATA_ENTRY {
            metadata = Some(serde_json::from_slice(&content)?);
            continue;
        }

        let file_path = dest.join(safe_relative(&filename)?);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating directory", parent)?;
        }
        tokio::fs::write(&file_path, content)
            .await
            .fs_context("writing extracted file", &file_path)?;
        count += 1;
    }

    Ok((count, metadata))
}

/// Rejects absolute entry names and `..` components.
fn safe_relative(name: &str) -> Result<PathBuf> {
    let path = Path::new(name.trim_start_matches('/'));
    let escapes = name.starts_with('\\')
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || path.as_os_str().is_empty() {
        return Err(Error::GenericError(format!(
            "Invalid ZIP entry path (potential traversal attack): {}",
            name
        )));
    }
    Ok(path.to_path_buf())
}

/// Packs `source_dir` into a gzip-compressed tarball rooted at its own name.
///
/// Symbolic links are stored as links and file modes are kept.
pub async fn create_tar_gz(source_dir: &Path, archive: &Path) -> Result<()> {
    let source_dir = source_dir.to_path_buf();
    let archive = archive.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let root = source_dir
            .file_name()
            .ok_or_else(|| Error::GenericError(format!("{} has no name", source_dir.display())))?
            .to_os_string();

        let file = std::fs::File::create(&archive).fs_context("creating archive", &archive)?;
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);
        builder
            .append_dir_all(&root, &source_dir)
            .fs_context("archiving directory", &source_dir)?;
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .fs_context("finishing archive", &archive)?;
        Ok(())
    })
    .await
    .map_err(|e| Error::GenericError(format!("Archive task panicked: {}", e)))?
}
