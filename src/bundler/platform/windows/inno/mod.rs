//! Windows Inno Setup installer creation.
//!
//! # Module Organization
//!
//! - `template` - ISS and VERSIONINFO templates
//! - `script` - Installer script generation
//! - `resources` - ICO conversion and executable resource patching

mod resources;
mod script;
mod template;

pub use resources::{IcoSet, version_quad, version_rc};
pub use script::{app_id, render as render_script};

use crate::{
    bail,
    bundler::{
        builder::PackagingContext,
        error::{ErrorExt, Result},
        icon::IconSet,
        settings::Application,
        toolchain::{CommandRunner, ContainerRunner},
        utils::fs,
    },
};
use std::path::{Path, PathBuf};

/// Build the installer for the tree in `out_dir`.
///
/// # Process
///
/// 1. Standardize icons and convert them to ICO
/// 2. Patch icon and version info into `<name>.exe`
/// 3. Render `installer.iss` next to the icons
/// 4. Compile it with Inno Setup in a container
///
/// # Returns
///
/// Vector containing the path to `<name>-<version>-x64.exe`.
pub async fn post_process<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    out_dir: &Path,
    app: &Application,
) -> Result<Vec<PathBuf>> {
    log::info!("Building Windows installer for {}", app.name());

    let res_dir = ctx.temp_dir("installer-", "-res")?;
    let result = build(ctx, out_dir, app, res_dir.path()).await;
    ctx.release(&res_dir);

    let installer = result?;
    log::info!("✓ Created Windows installer: {}", installer.display());
    Ok(vec![installer])
}

async fn build<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    out_dir: &Path,
    app: &Application,
    res_dir: &Path,
) -> Result<PathBuf> {
    let install_dir = out_dir.join(app.name());

    let icons = IconSet::build(ctx, app).await?;
    let icos = resources::convert_icons(ctx, &icons, res_dir).await?;

    let exe = install_dir.join(format!("{}.exe", app.name()));
    match (&icos.app, exe.is_file()) {
        (Some(app_ico), true) => {
            if let Err(e) = resources::patch_executable(ctx, &exe, app_ico, app).await {
                log::warn!("Could not update resources of {}: {}", exe.display(), e);
            }
        }
        (None, _) => log::warn!("No application icon available, leaving {} unchanged", exe.display()),
        (_, false) => log::warn!("Launcher {} not found, skipping resource update", exe.display()),
    }

    let iss = res_dir.join("installer.iss");
    let content = script::render(app, icos.install.is_some(), icos.document.is_some())?;
    tokio::fs::write(&iss, content)
        .await
        .fs_context("writing installer script", &iss)?;

    let runner = ctx.container_runner("kpacker-inno-", "-work")?;
    let result = compile(ctx, &runner, res_dir, &install_dir, out_dir, app).await;
    runner.dispose();
    result
}

async fn compile<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    runner: &ContainerRunner,
    res_dir: &Path,
    install_dir: &Path,
    out_dir: &Path,
    app: &Application,
) -> Result<PathBuf> {
    let work = runner.workdir();
    fs::copy_dir(res_dir, work).await?;
    fs::copy_dir(install_dir, &work.join("app")).await?;

    ctx.require(&runner.invoke("innosetup installer.iss"), "Inno Setup")
        .await?;

    let generated = work.join(format!("{}.exe", app.name()));
    if !generated.is_file() {
        bail!("Inno Setup produced no {}", generated.display());
    }
    let installer = out_dir.join(format!("{}-{}-x64.exe", app.name(), app.version()));
    tokio::fs::copy(&generated, &installer)
        .await
        .fs_context("copying installer", &installer)?;
    Ok(installer)
}
