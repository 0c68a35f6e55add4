//! Generic tar.gz bundler - a shell launcher plus the payload, no runtime.

use crate::bundler::{
    error::{ErrorExt, Result},
    settings::Application,
    utils::{archive, fs},
};
use std::path::{Path, PathBuf};

/// Bundle the assembled tree as `<name>-<version>-generic.tar.gz`.
///
/// The install root `<name>/` already holds `lib/` with the payload. A bash
/// launcher is written next to it, the tree is archived natively and the
/// install root is removed afterwards so only the archive remains.
pub async fn post_process(out_dir: &Path, app: &Application) -> Result<Vec<PathBuf>> {
    let name = app.name();
    let install_dir = out_dir.join(name);

    let launcher = install_dir.join(name);
    tokio::fs::write(&launcher, launcher_script(app))
        .await
        .fs_context("writing launcher script", &launcher)?;
    fs::make_executable(&launcher)?;

    let tarball = out_dir.join(format!("{}-{}-generic.tar.gz", name, app.version()));
    log::info!("Creating {}", tarball.display());
    archive::create_tar_gz(&install_dir, &tarball).await?;

    fs::remove_dir_all(&install_dir).await?;

    log::info!("✓ Created generic archive: {}", tarball.display());
    Ok(vec![tarball])
}

fn launcher_script(app: &Application) -> String {
    format!(
        r#"#!/bin/bash

# {name} Launcher Script
# Version: {version}

# Get the directory where this script is located
SCRIPT_DIR="$(cd "$(dirname "${{BASH_SOURCE[0]}}")" && pwd)"

# Set up classpath
CLASSPATH="$SCRIPT_DIR/lib/*"

# Launch the application
java -cp "$CLASSPATH" {main_class} "$@"
"#,
        name = app.name(),
        version = app.version(),
        main_class = app.main_class(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::settings::Application;
    use std::io::Write;

    fn application(dir: &Path) -> Application {
        let jar = dir.join("demo.jar");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&jar).unwrap());
        writer
            .start_file("META-INF/MANIFEST.MF", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(b"Manifest-Version: 1.0\r\nMain-Class: org.demo.Main\r\n")
            .unwrap();
        writer.finish().unwrap();
        Application::builder(dir)
            .name("Demo")
            .version("2.1.0")
            .build()
            .unwrap()
    }

    #[test]
    fn test_launcher_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = launcher_script(&application(dir.path()));
        assert!(script.starts_with("#!/bin/bash\n\n# Demo Launcher Script\n# Version: 2.1.0\n"));
        assert!(script.contains(r#"SCRIPT_DIR="$(cd "$(dirname "${BASH_SOURCE[0]}")" && pwd)""#));
        assert!(script.ends_with("java -cp \"$CLASSPATH\" org.demo.Main \"$@\"\n"));
    }

    #[tokio::test]
    async fn test_archive_replaces_install_tree() {
        let src = tempfile::tempdir().unwrap();
        let app = application(src.path());
        let out = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(out.path().join("Demo/lib")).unwrap();
        std::fs::write(out.path().join("Demo/lib/demo.jar"), b"jar").unwrap();

        let artifacts = post_process(out.path(), &app).await.unwrap();
        assert_eq!(artifacts, [out.path().join("Demo-2.1.0-generic.tar.gz")]);
        assert!(!out.path().join("Demo").exists());

        let decoder = flate2::read::GzDecoder::new(std::fs::File::open(&artifacts[0]).unwrap());
        let names: Vec<String> = tar::Archive::new(decoder)
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n == "Demo/Demo"));
        assert!(names.iter().any(|n| n == "Demo/lib/demo.jar"));
    }
}
