//! Blank HFS+ disk image creation.

use crate::bundler::{
    builder::PackagingContext,
    error::{Context, ErrorExt, Result},
    toolchain::{CommandRunner, VolumeMount, WORK_MOUNT, quote},
};
use std::path::Path;

/// Capacity of a freshly created image.
pub const IMAGE_SIZE: u64 = 200 * 1024 * 1024;

/// Creates a sparse image at `image` and formats it as HFS+.
///
/// Formatting runs in a container with the image's directory mounted at
/// `/work`; the volume is labelled `volume_name`.
pub async fn create_image<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    image: &Path,
    volume_name: &str,
) -> Result<()> {
    let file = tokio::fs::File::create(image)
        .await
        .fs_context("creating disk image", image)?;
    file.set_len(IMAGE_SIZE)
        .await
        .fs_context("allocating disk image", image)?;
    drop(file);

    let dir = image
        .parent()
        .with_context(|| format!("{} has no parent directory", image.display()))?;
    let file_name = image
        .file_name()
        .with_context(|| format!("{} has no file name", image.display()))?
        .to_string_lossy();

    let command = format!(
        "mkfs.hfsplus -v {} {}/{}",
        quote(volume_name),
        WORK_MOUNT,
        quote(&file_name)
    );
    let invocation = ctx
        .engine()?
        .invocation(&[VolumeMount::new(dir, WORK_MOUNT)], None, &command);
    ctx.require(&invocation, "formatting disk image").await?;

    log::debug!("Created blank image {}", image.display());
    Ok(())
}
