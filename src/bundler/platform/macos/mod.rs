//! macOS packaging: app bundle, optional signing, DMG and notarization.

pub mod app;
pub mod dmg;
pub mod sign;

use crate::bundler::{
    builder::PackagingContext,
    error::Result,
    settings::Application,
    toolchain::CommandRunner,
};
use std::path::{Path, PathBuf};

/// Finishes `<name>.app` in `out_dir` and wraps it in a DMG.
///
/// The bundle is signed before it is copied into the image so the image
/// carries the signed bundle. The image itself is signed and notarized
/// afterwards. Missing credentials only skip those steps.
pub async fn post_process<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    out_dir: &Path,
    app: &Application,
) -> Result<Vec<PathBuf>> {
    let bundle = out_dir.join(format!("{}.app", app.name()));
    app::update_bundle(ctx, &bundle, app).await?;

    let credentials = signing_credentials(app);
    if let Some(credentials) = credentials {
        sign::sign_bundle(ctx, &bundle, credentials).await?;
    }

    let mut artifacts = vec![bundle.clone()];
    if app.dmg().skip {
        log::info!("Skipping DMG creation for {}", app.name());
        return Ok(artifacts);
    }

    let report = dmg::build(ctx, out_dir, &bundle, app).await?;
    let Some(image) = report.output().map(Path::to_path_buf) else {
        return Ok(artifacts);
    };

    if let Some(credentials) = credentials {
        sign::sign_item(ctx, &image, credentials, false).await?;
        match app.signing().notary_json.as_deref() {
            Some(key) if key.is_file() => {
                sign::notarize(ctx, &image, key).await?;
            }
            Some(key) => {
                log::warn!("Notary key {} not found, skipping notarization", key.display())
            }
            None => log::warn!("No notary key supplied, skipping notarization"),
        }
    }

    artifacts.push(image);
    Ok(artifacts)
}

fn signing_credentials(app: &Application) -> Option<sign::Credentials<'_>> {
    let signing = app.signing();
    if !signing.enabled {
        return None;
    }
    match signing.credentials() {
        Some((p12_file, p12_pass)) => Some(sign::Credentials { p12_file, p12_pass }),
        None => {
            log::warn!(
                "Signing enabled but the certificate or its password file is missing, \
                 skipping signing"
            );
            None
        }
    }
}
