//! Final image production from the assembled read-write image.

use crate::bundler::{
    builder::PackagingContext,
    error::{Context, Error, ErrorExt, Result},
    toolchain::{CommandRunner, VolumeMount, quote},
};
use std::path::Path;

/// Turns `uncompressed` into `output`.
///
/// With `compress`, the `dmg` tool writes a compressed image and the
/// intermediate is deleted. Otherwise the intermediate is renamed.
pub async fn finalize<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    uncompressed: &Path,
    output: &Path,
    compress: bool,
) -> Result<()> {
    if !compress {
        tokio::fs::rename(uncompressed, output)
            .await
            .fs_context("renaming disk image", output)?;
        log::debug!("Kept uncompressed image as {}", output.display());
        return Ok(());
    }

    log::info!("Compressing {}", output.display());
    let dir = output
        .parent()
        .with_context(|| format!("{} has no parent directory", output.display()))?;
    let name = |path: &Path| -> Result<String> {
        Ok(path
            .file_name()
            .with_context(|| format!("{} has no file name", path.display()))?
            .to_string_lossy()
            .into_owned())
    };

    let command = format!(
        "dmg /data/{} /data/{}",
        quote(&name(uncompressed)?),
        quote(&name(output)?)
    );
    let invocation = ctx
        .engine()?
        .invocation(&[VolumeMount::new(dir, "/data")], None, &command);
    ctx.require(&invocation, "compressing disk image").await?;

    if !output.is_file() {
        return Err(Error::GenericError(format!(
            "dmg produced no {}",
            output.display()
        )));
    }
    tokio::fs::remove_file(uncompressed)
        .await
        .fs_context("removing uncompressed image", uncompressed)?;
    Ok(())
}
