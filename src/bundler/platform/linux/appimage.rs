//! AppImage bundler - portable Linux applications.

use super::LinuxArch;
use crate::{
    bail,
    bundler::{
        builder::PackagingContext,
        error::{Context, ErrorExt, Result},
        icon,
        settings::Application,
        toolchain::{CommandRunner, ContainerRunner, quote},
        utils::fs,
    },
};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Bundle the assembled tree as an AppImage.
///
/// # Process
///
/// 1. Generates the .desktop file inside the install root
/// 2. Copies the standardized icon next to it
/// 3. Links `AppRun` to the launcher
/// 4. Runs appimagetool in a container on a copy of the tree
///
/// # Returns
///
/// Vector containing the path to the generated .AppImage file.
pub async fn post_process<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    out_dir: &Path,
    app: &Application,
    arch: LinuxArch,
) -> Result<Vec<PathBuf>> {
    let name = app.name();
    let app_dir = out_dir.join(name);

    log::info!("Building AppImage for {} ({})", name, arch);

    create_desktop_file(app, &app_dir).await?;

    let icon = icon::standardize(ctx, app.icons().app.as_deref(), name, "app").await?;
    let icon_dst = app_dir.join(icon_file_name(name));
    tokio::fs::copy(&icon, &icon_dst)
        .await
        .fs_context("copying icon", &icon_dst)?;

    fs::symlink(&Path::new("bin").join(name), &app_dir.join("AppRun"))?;

    let runner = ctx.container_runner("kpacker-appimage-", "-work")?;
    let result = build_in(ctx, &runner, &app_dir, out_dir, app, arch).await;
    runner.dispose();

    let appimage = result?;
    log::info!("✓ Created AppImage: {}", appimage.display());
    Ok(vec![appimage])
}

async fn build_in<R: CommandRunner>(
    ctx: &PackagingContext<R>,
    runner: &ContainerRunner,
    app_dir: &Path,
    out_dir: &Path,
    app: &Application,
    arch: LinuxArch,
) -> Result<PathBuf> {
    let name = app.name();
    fs::copy_dir(app_dir, &runner.workdir().join(name)).await?;

    let command = format!(
        "export VERSION={} ARCH={} && /opt/appimage/AppRun {}",
        quote(app.version()),
        arch.appimage_arch(),
        quote(name)
    );
    ctx.require(&runner.invoke(&command), "appimagetool").await?;

    let built = find_appimage(runner.workdir())?;
    let appimage = out_dir.join(format!(
        "{}-{}-{}.AppImage",
        name,
        app.version(),
        arch.appimage_arch()
    ));
    tokio::fs::copy(&built, &appimage)
        .await
        .fs_context("copying AppImage", &appimage)?;
    fs::make_executable(&appimage)?;

    Ok(appimage)
}

/// First `*.AppImage` produced in `dir`.
fn find_appimage(dir: &Path) -> Result<PathBuf> {
    let dir_str = dir.to_str().context("work directory path contains invalid UTF-8")?;
    let pattern = format!("{}/*.AppImage", glob::Pattern::escape(dir_str));

    let mut found: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    found.sort();

    match found.into_iter().next() {
        Some(path) => Ok(path),
        None => bail!("appimagetool produced no AppImage in {}", dir.display()),
    }
}

/// Lowercased name with everything except `[a-z0-9]` removed.
pub fn command_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Icon file named after the desktop entry's `Icon=` key.
fn icon_file_name(name: &str) -> String {
    format!("{}.png", command_name(name))
}

/// Create .desktop file for the AppImage.
async fn create_desktop_file(app: &Application, app_dir: &Path) -> Result<()> {
    let cname = command_name(app.name());
    let desktop_file = app_dir.join(format!("{}.desktop", cname));
    let mut file = tokio::fs::File::create(&desktop_file)
        .await
        .fs_context("creating desktop file", &desktop_file)?;

    file.write_all(desktop_entry(app).as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

fn desktop_entry(app: &Application) -> String {
    let cname = command_name(app.name());
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={name}\n\
         Exec={cname} %u\n\
         Categories=Development;\n\
         Comment={name} application\n\
         Icon={cname}\n",
        name = app.name(),
        cname = cname,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("My Cool-App 2"), "mycoolapp2");
        assert_eq!(command_name("ÄBC"), "bc");
    }

    #[test]
    fn test_icon_file_matches_desktop_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let mut writer =
            zip::ZipWriter::new(std::fs::File::create(dir.path().join("src/app.jar")).unwrap());
        writer
            .start_file("META-INF/MANIFEST.MF", zip::write::SimpleFileOptions::default())
            .unwrap();
        std::io::Write::write_all(&mut writer, b"Main-Class: demo.Main\r\n").unwrap();
        writer.finish().unwrap();

        let app = Application::builder(dir.path().join("src"))
            .name("My Cool-App 2")
            .build()
            .unwrap();
        let entry = desktop_entry(&app);
        assert!(entry.contains("Icon=mycoolapp2\n"));
        assert_eq!(icon_file_name(app.name()), "mycoolapp2.png");
    }

    #[test]
    fn test_find_appimage_requires_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        assert!(find_appimage(dir.path()).is_err());

        std::fs::write(dir.path().join("Demo-x86_64.AppImage"), b"elf").unwrap();
        assert_eq!(
            find_appimage(dir.path()).unwrap(),
            dir.path().join("Demo-x86_64.AppImage")
        );
    }
}
