//! Installer icons and executable resources.
//!
//! Standardized PNGs become multi-size ICO files with ImageMagick, and the
//! launcher executable gets its icon and VERSIONINFO replaced with
//! resourcehacker. Every step here degrades to a logged warning.

use super::template::VERSION_RC_TEMPLATE;
use crate::bundler::{
    builder::PackagingContext,
    error::{ErrorExt, Result},
    icon::IconSet,
    settings::Application,
    toolchain::{CommandRunner, ContainerRunner, quote},
};
use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// ICO files written into the installer resource directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IcoSet {
    pub install: Option<PathBuf>,
    pub app: Option<PathBuf>,
    pub document: Option<PathBuf>,
}

fn ico_command(input: &str, output: &str) -> String {
    format!(
        "convert {} -resize 256x256 -define icon:auto-resize=256,128,64,48,32,16 {}",
        quote(input),
        quote(output)
    )
}

/// Converts one staged PNG; returns the ICO path in `res_dir` on success.
async fn convert_slot<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    runner: &ContainerRunner,
    png: &Path,
    slot: &str,
    res_dir: &Path,
) -> Result<Option<PathBuf>> {
    let staged = format!("{}.png", slot);
    let ico = format!("{}.ico", slot);
    tokio::fs::copy(png, runner.workdir().join(&staged))
        .await
        .fs_context("staging icon", png)?;

    let step = format!("{} icon conversion", slot);
    if !ctx.attempt(&runner.invoke(&ico_command(&staged, &ico)), &step).await {
        return Ok(None);
    }
    let produced = runner.workdir().join(&ico);
    if !produced.is_file() {
        log::warn!("{} produced no {}", step, ico);
        return Ok(None);
    }
    let target = res_dir.join(&ico);
    tokio::fs::copy(&produced, &target)
        .await
        .fs_context("copying icon", &target)?;
    Ok(Some(target))
}

async fn reuse(source: &Path, target: PathBuf) -> Result<PathBuf> {
    tokio::fs::copy(source, &target)
        .await
        .fs_context("copying icon", &target)?;
    Ok(target)
}

/// Produces `install.ico`, `app.ico` and, with associations, `document.ico`.
///
/// Slots without a distinct image reuse an ICO already produced. A failed
/// install icon leaves every slot empty.
pub async fn convert_icons<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    icons: &IconSet,
    res_dir: &Path,
) -> Result<IcoSet> {
    let runner = ctx.container_runner("kpacker-ico-", "-work")?;
    let result = convert_icons_in(ctx, &runner, icons, res_dir).await;
    runner.dispose();
    result
}

async fn convert_icons_in<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    runner: &ContainerRunner,
    icons: &IconSet,
    res_dir: &Path,
) -> Result<IcoSet> {
    let Some(install) = convert_slot(ctx, runner, &icons.install, "install", res_dir).await? else {
        return Ok(IcoSet::default());
    };

    let app = if icons.distinct_install() {
        match convert_slot(ctx, runner, &icons.app, "app", res_dir).await? {
            Some(ico) => ico,
            None => reuse(&install, res_dir.join("app.ico")).await?,
        }
    } else {
        reuse(&install, res_dir.join("app.ico")).await?
    };

    let document = match icons.document.as_deref() {
        None => None,
        Some(png) if icons.distinct_document() => {
            convert_slot(ctx, runner, png, "document", res_dir).await?
        }
        Some(png) if png == icons.app.as_path() => {
            Some(reuse(&app, res_dir.join("document.ico")).await?)
        }
        Some(_) => Some(reuse(&install, res_dir.join("document.ico")).await?),
    };

    Ok(IcoSet {
        install: Some(install),
        app: Some(app),
        document,
    })
}

/// Numeric `major.minor.patch.build` of a version string.
///
/// Anything after the first `-` is ignored; missing or non-numeric parts
/// default to 1.0.0 and the build is always 0.
pub fn version_quad(version: &str) -> [u32; 4] {
    let core = version.split('-').next().unwrap_or_default();
    let mut parts = core.split('.').map(|part| part.trim().parse::<u32>().ok());
    let major = parts.next().flatten().unwrap_or(1);
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    [major, minor, patch, 0]
}

#[derive(Serialize)]
struct VersionData<'a> {
    name: &'a str,
    version: &'a str,
    major: u32,
    minor: u32,
    patch: u32,
    build: u32,
    year: i32,
}

/// Render the VERSIONINFO resource script.
pub fn version_rc(app: &Application) -> Result<String> {
    use chrono::Datelike;

    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_template_string("version.rc", VERSION_RC_TEMPLATE)?;

    let [major, minor, patch, build] = version_quad(app.version());
    let data = VersionData {
        name: app.name(),
        version: app.version(),
        major,
        minor,
        patch,
        build,
        year: chrono::Local::now().year(),
    };
    Ok(handlebars.render("version.rc", &data)?)
}

/// Embeds `app_ico` and fresh version information into `exe`.
pub async fn patch_executable<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    exe: &Path,
    app_ico: &Path,
    app: &Application,
) -> Result<()> {
    let runner = ctx.container_runner("kpacker-reshack-", "-work")?;
    let result = patch_in(ctx, &runner, exe, app_ico, app).await;
    runner.dispose();
    result
}

async fn patch_in<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    runner: &ContainerRunner,
    exe: &Path,
    app_ico: &Path,
    app: &Application,
) -> Result<()> {
    let work = runner.workdir();
    let exe_name = format!("{}.exe", app.name());
    let clean_name = format!("{}_clean.exe", app.name());
    let new_name = format!("{}_new.exe", app.name());
    let (exe_q, clean_q, new_q) = (quote(&exe_name), quote(&clean_name), quote(&new_name));

    tokio::fs::copy(exe, work.join(&exe_name))
        .await
        .fs_context("staging executable", exe)?;
    tokio::fs::copy(app_ico, work.join("app.ico"))
        .await
        .fs_context("staging icon", app_ico)?;

    let embed_icon = format!(
        "resourcehacker -open {exe_q} -save {exe_q} -action addoverwrite -res app.ico \
         -mask ICONGROUP,MAINICON"
    );
    if ctx.attempt(&runner.invoke(&embed_icon), "embedding icon").await {
        log::debug!("Embedded icon into {}", exe_name);
    }

    let rc = work.join("version.rc");
    tokio::fs::write(&rc, version_rc(app)?)
        .await
        .fs_context("writing version.rc", &rc)?;

    let steps = [
        (
            "resourcehacker -open version.rc -save version.res -action compile".to_string(),
            "compiling version.rc",
        ),
        (
            format!("resourcehacker -open {exe_q} -save {clean_q} -action delete -mask VERSIONINFO,,"),
            "removing old version info",
        ),
        (
            format!("resourcehacker -open {clean_q} -save {new_q} -action add -res version.res"),
            "adding version info",
        ),
        (format!("mv {new_q} {exe_q}"), "replacing executable"),
    ];
    for (command, step) in steps {
        if !ctx.attempt(&runner.invoke(&command), step).await {
            break;
        }
    }

    let patched = work.join(&exe_name);
    if patched.is_file() {
        tokio::fs::copy(&patched, exe)
            .await
            .fs_context("copying executable", exe)?;
        log::debug!("Updated resources of {}", exe.display());
    }
    Ok(())
}
