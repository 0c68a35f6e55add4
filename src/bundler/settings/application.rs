//! Application descriptor.
//!
//! The descriptor is derived once from user input and never mutated; every
//! packaging stage reads from the same value.

use super::manifest::Manifest;
use crate::bundler::error::{Context, Error, ErrorExt, Result};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Default application version.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Manifest key naming the entry point.
pub const MAIN_CLASS_KEY: &str = "Main-Class";

/// Icon inputs as given by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconInputs {
    pub app: Option<PathBuf>,
    pub install: Option<PathBuf>,
    pub document: Option<PathBuf>,
}

/// macOS code signing and notarization configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningSettings {
    /// Whether signing was requested at all.
    pub enabled: bool,
    /// PKCS#12 certificate.
    pub p12_file: Option<PathBuf>,
    /// File holding the certificate password.
    pub p12_pass: Option<PathBuf>,
    /// App Store Connect API key for notarization.
    pub notary_json: Option<PathBuf>,
}

impl SigningSettings {
    /// Certificate and password file, when both exist on disk.
    pub fn credentials(&self) -> Option<(&Path, &Path)> {
        let p12 = self.p12_file.as_deref()?;
        let pass = self.p12_pass.as_deref()?;
        (p12.is_file() && pass.is_file()).then_some((p12, pass))
    }
}

/// macOS disk image configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmgSettings {
    /// `.dmg` or `.zip` holding a `.dmg` whose layout is reused.
    pub template: Option<PathBuf>,
    /// Compress the final image.
    pub compress: bool,
    /// Skip disk image creation entirely.
    pub skip: bool,
}

impl Default for DmgSettings {
    fn default() -> Self {
        Self {
            template: None,
            compress: true,
            skip: false,
        }
    }
}

/// Immutable description of the application being packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    source_dir: PathBuf,
    main_jar: String,
    other_jars: Vec<String>,
    name: String,
    version: String,
    main_class: String,
    icons: IconInputs,
    document_extensions: Vec<String>,
    document_name: Option<String>,
    signing: SigningSettings,
    dmg: DmgSettings,
}

impl Application {
    /// Starts building a descriptor for the files in `source_dir`.
    pub fn builder(source_dir: impl Into<PathBuf>) -> ApplicationBuilder {
        ApplicationBuilder::new(source_dir)
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Primary payload file name.
    pub fn main_jar(&self) -> &str {
        &self.main_jar
    }

    /// Remaining payload file names in listing order.
    pub fn other_jars(&self) -> &[String] {
        &self.other_jars
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn main_class(&self) -> &str {
        &self.main_class
    }

    pub fn icons(&self) -> &IconInputs {
        &self.icons
    }

    pub fn document_extensions(&self) -> &[String] {
        &self.document_extensions
    }

    /// Human readable document type name, `"<name> Document"` by default.
    pub fn document_name(&self) -> String {
        self.document_name
            .clone()
            .unwrap_or_else(|| format!("{} Document", self.name))
    }

    pub fn signing(&self) -> &SigningSettings {
        &self.signing
    }

    pub fn dmg(&self) -> &DmgSettings {
        &self.dmg
    }

    /// Renders the launcher configuration read by the bundled launcher.
    pub fn launcher_config(&self) -> String {
        let mut out = format!(
            "[Application]\napp.mainclass={}\napp.classpath=$APPDIR/{}\n",
            self.main_class, self.main_jar
        );
        for jar in &self.other_jars {
            out.push_str(&format!("app.classpath=$APPDIR/{}\n", jar));
        }
        out.push_str(&format!(
            "\n[JavaOptions]\njava-options=-Djpackage.app-version={}\n",
            self.version
        ));
        out
    }
}

/// Builder for [`Application`].
///
/// `build` performs the only filesystem reads: it lists the payload jars and
/// loads the primary jar's manifest. Every error it returns is a
/// configuration error.
#[derive(Debug, Default)]
pub struct ApplicationBuilder {
    source_dir: PathBuf,
    main_jar: Option<String>,
    name: Option<String>,
    version: Option<String>,
    icons: IconInputs,
    document_extensions: Option<String>,
    document_name: Option<String>,
    signing: SigningSettings,
    dmg: DmgSettings,
}

impl ApplicationBuilder {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            ..Default::default()
        }
    }

    /// Selects the primary payload explicitly.
    pub fn main_jar(mut self, jar: impl Into<String>) -> Self {
        self.main_jar = Some(jar.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn icons(mut self, icons: IconInputs) -> Self {
        self.icons = icons;
        self
    }

    /// Comma separated extensions to associate with the application.
    pub fn document_extensions(mut self, extensions: impl Into<String>) -> Self {
        self.document_extensions = Some(extensions.into());
        self
    }

    pub fn document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    pub fn signing(mut self, signing: SigningSettings) -> Self {
        self.signing = signing;
        self
    }

    pub fn dmg(mut self, dmg: DmgSettings) -> Self {
        self.dmg = dmg;
        self
    }

    /// Resolves the payload and builds the descriptor.
    pub fn build(self) -> Result<Application> {
        let source_dir = self
            .source_dir
            .absolutize()
            .fs_context("resolving source directory", &self.source_dir)?
            .to_path_buf();

        let jars = list_jars(&source_dir)?;
        let main_jar = match self.main_jar {
            Some(jar) if jars.contains(&jar) => jar,
            Some(jar) => return Err(Error::MainJarMissing(jar)),
            None => match jars.as_slice() {
                [only] => only.clone(),
                [] => return Err(Error::NoJars(source_dir)),
                _ => {
                    return Err(Error::MultipleJars {
                        dir: source_dir,
                        jars,
                    });
                }
            },
        };
        let other_jars = jars.into_iter().filter(|jar| *jar != main_jar).collect();

        let jar_path = source_dir.join(&main_jar);
        let manifest = Manifest::load(&jar_path)
            .with_context(|| format!("reading manifest of {}", jar_path.display()))?;
        let main_class = manifest
            .get(MAIN_CLASS_KEY)
            .filter(|class| !class.is_empty())
            .ok_or_else(|| Error::MissingManifestKey {
                key: MAIN_CLASS_KEY,
                jar: jar_path.clone(),
            })?
            .to_string();

        let name = self.name.unwrap_or_else(|| {
            main_jar
                .strip_suffix(".jar")
                .unwrap_or(&main_jar)
                .to_string()
        });

        let document_extensions = self
            .document_extensions
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|ext| !ext.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Application {
            source_dir,
            main_jar,
            other_jars,
            name,
            version: self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            main_class,
            icons: self.icons,
            document_extensions,
            document_name: self.document_name,
            signing: self.signing,
            dmg: self.dmg,
        })
    }
}

/// Sorted names of the `*.jar` entries directly inside `dir`.
fn list_jars(dir: &Path) -> Result<Vec<String>> {
    let mut jars = Vec::new();
    for entry in std::fs::read_dir(dir).fs_context("listing source directory", dir)? {
        let entry = entry.fs_context("listing source directory", dir)?;
        if entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".jar") {
            jars.push(name);
        }
    }
    jars.sort();
    Ok(jars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_jar(dir: &Path, name: &str, manifest: &str) {
        let mut writer = zip::ZipWriter::new(std::fs::File::create(dir.join(name)).unwrap());
        writer
            .start_file("META-INF/MANIFEST.MF", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(manifest.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_single_jar_selected_and_name_from_stem() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(dir.path(), "tool.jar", "Main-Class: demo.Tool\n");
        std::fs::write(dir.path().join("README.txt"), "hi").unwrap();

        let app = Application::builder(dir.path()).build().unwrap();
        assert_eq!(app.main_jar(), "tool.jar");
        assert_eq!(app.name(), "tool");
        assert_eq!(app.version(), DEFAULT_VERSION);
        assert_eq!(app.main_class(), "demo.Tool");
        assert!(app.other_jars().is_empty());
        assert_eq!(app.document_name(), "tool Document");
    }

    #[test]
    fn test_multiple_jars_without_mainjar_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(dir.path(), "a.jar", "Main-Class: A\n");
        write_jar(dir.path(), "b.jar", "Main-Class: B\n");

        let err = Application::builder(dir.path()).build().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("multiple payloads found"));
    }

    #[test]
    fn test_explicit_mainjar_and_classpath_order() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(dir.path(), "lib-b.jar", "Main-Class: B\n");
        write_jar(dir.path(), "app.jar", "Main-Class: demo.App\n");
        write_jar(dir.path(), "lib-a.jar", "Main-Class: A\n");

        let app = Application::builder(dir.path())
            .main_jar("app.jar")
            .name("Demo")
            .version("2.3.4")
            .build()
            .unwrap();
        assert_eq!(app.other_jars(), ["lib-a.jar", "lib-b.jar"]);
        assert_eq!(
            app.launcher_config(),
            "[Application]\n\
             app.mainclass=demo.App\n\
             app.classpath=$APPDIR/app.jar\n\
             app.classpath=$APPDIR/lib-a.jar\n\
             app.classpath=$APPDIR/lib-b.jar\n\
             \n\
             [JavaOptions]\n\
             java-options=-Djpackage.app-version=2.3.4\n"
        );
    }

    #[test]
    fn test_unknown_mainjar_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(dir.path(), "app.jar", "Main-Class: A\n");

        let err = Application::builder(dir.path())
            .main_jar("other.jar")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "main jar other.jar not found");
    }

    #[test]
    fn test_no_jars_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Application::builder(dir.path()).build().unwrap_err();
        assert!(matches!(err, Error::NoJars(_)));
    }

    #[test]
    fn test_missing_main_class_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(dir.path(), "app.jar", "Manifest-Version: 1.0\n");

        let err = Application::builder(dir.path()).build().unwrap_err();
        assert!(matches!(err, Error::MissingManifestKey { key: "Main-Class", .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_document_extensions_split_and_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(dir.path(), "app.jar", "Main-Class: A\n");

        let app = Application::builder(dir.path())
            .document_extensions(" txt, md,,pdf ")
            .document_name("Notes")
            .build()
            .unwrap();
        assert_eq!(app.document_extensions(), ["txt", "md", "pdf"]);
        assert_eq!(app.document_name(), "Notes");
    }

    #[test]
    fn test_credentials_require_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let p12 = dir.path().join("cert.p12");
        std::fs::write(&p12, b"cert").unwrap();

        let mut signing = SigningSettings {
            enabled: true,
            p12_file: Some(p12.clone()),
            p12_pass: Some(dir.path().join("missing.txt")),
            notary_json: None,
        };
        assert!(signing.credentials().is_none());

        let pass = dir.path().join("pass.txt");
        std::fs::write(&pass, b"secret").unwrap();
        signing.p12_pass = Some(pass.clone());
        assert_eq!(signing.credentials(), Some((p12.as_path(), pass.as_path())));
    }
}
