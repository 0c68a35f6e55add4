//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap, with cross-field
//! validation and conversion into the application descriptor.

use crate::bundler::{
    Application, DmgSettings, IconInputs, SigningSettings, Target,
    settings::DEFAULT_VERSION,
};
use crate::error::CliError;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Packages a compiled JVM application for several platforms
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kpacker",
    disable_version_flag = true,
    about = "Packages a compiled JVM application for several platforms",
    long_about = "Packages a directory of jars into a generic tar.gz, Linux AppImages, a macOS \
application bundle and DMG, and a Windows installer.

Each target is built concurrently into <OUT>/<target>. Platform tools run inside a \
docker or podman container.

Usage:
  kpacker --source build/libs --name Demo --target generic,linux-x64 --out dist
  kpacker --source build/libs --name Demo --target mac-x64 --out dist --skip-dmg

Exit code 0 = every requested target was packaged."
)]
pub struct Args {
    /// Directory holding the application jars
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,

    /// Application name
    #[arg(long)]
    pub name: String,

    /// Application version
    #[arg(long, default_value = DEFAULT_VERSION)]
    pub version: String,

    /// Jar holding the entry point, required when the source has several jars
    #[arg(long, value_name = "JAR")]
    pub mainjar: Option<String>,

    /// Targets to build, comma separated or repeated
    #[arg(long, value_enum, value_delimiter = ',', required = true)]
    pub target: Vec<Target>,

    /// Output directory
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Application icon
    #[arg(long, value_name = "FILE")]
    pub icon: Option<PathBuf>,

    /// Installer icon, defaults to the application icon
    #[arg(long, value_name = "FILE")]
    pub install_icon: Option<PathBuf>,

    /// Icon for document types (required when --document-extensions is specified)
    #[arg(long, value_name = "FILE")]
    pub document_icon: Option<PathBuf>,

    /// Comma-separated list of file extensions to associate with the app (e.g. "txt,md,pdf")
    #[arg(long, value_name = "LIST")]
    pub document_extensions: Option<String>,

    /// Human-readable name for the document type (defaults to "<name> Document")
    #[arg(long)]
    pub document_name: Option<String>,

    /// Delete temporary directories on exit
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub remove_temp: bool,

    /// PKCS#12 signing certificate
    #[arg(long, value_name = "FILE")]
    pub p12_file: Option<PathBuf>,

    /// File holding the certificate password
    #[arg(long, value_name = "FILE")]
    pub p12_pass: Option<PathBuf>,

    /// App Store Connect API key used for notarization
    #[arg(long, value_name = "FILE")]
    pub notary_json: Option<PathBuf>,

    /// Sign and notarize the macOS bundle and disk image
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub enable_signing: bool,

    /// .dmg, or .zip holding a .dmg, whose layout is reused
    #[arg(long, value_name = "FILE")]
    pub dmg_template: Option<PathBuf>,

    /// Compress the disk image (default)
    #[arg(long, overrides_with = "no_dmg_compress")]
    pub dmg_compress: bool,

    /// Keep the disk image uncompressed
    #[arg(long, overrides_with = "dmg_compress")]
    pub no_dmg_compress: bool,

    /// Stop after the macOS application bundle
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub skip_dmg: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_ansi: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), CliError> {
        if !self.source.is_dir() {
            return Err(CliError::InvalidArguments {
                reason: format!("source {} is not a directory", self.source.display()),
            });
        }

        if self.name.trim().is_empty() {
            return Err(CliError::InvalidArguments {
                reason: "name cannot be empty".to_string(),
            });
        }

        let has_extensions = self
            .document_extensions
            .as_deref()
            .is_some_and(|list| list.split(',').any(|ext| !ext.trim().is_empty()));
        if has_extensions && self.document_icon.is_none() {
            return Err(CliError::MissingArgument {
                argument: "--document-icon (required with --document-extensions)".to_string(),
            });
        }

        Ok(())
    }

    /// Whether the disk image should be compressed.
    pub fn dmg_compress(&self) -> bool {
        self.dmg_compress || !self.no_dmg_compress
    }

    /// Builds the application descriptor.
    ///
    /// Reads the source directory and the main jar's manifest; every error
    /// is a configuration error.
    pub fn to_application(&self) -> crate::bundler::Result<Application> {
        let mut builder = Application::builder(&self.source)
            .name(self.name.clone())
            .version(self.version.clone())
            .icons(IconInputs {
                app: self.icon.clone(),
                install: self.install_icon.clone(),
                document: self.document_icon.clone(),
            })
            .signing(SigningSettings {
                enabled: self.enable_signing,
                p12_file: self.p12_file.clone(),
                p12_pass: self.p12_pass.clone(),
                notary_json: self.notary_json.clone(),
            })
            .dmg(DmgSettings {
                template: self.dmg_template.clone(),
                compress: self.dmg_compress(),
                skip: self.skip_dmg,
            });

        if let Some(jar) = &self.mainjar {
            builder = builder.main_jar(jar.clone());
        }
        if let Some(extensions) = &self.document_extensions {
            builder = builder.document_extensions(extensions.clone());
        }
        if let Some(name) = &self.document_name {
            builder = builder.document_name(name.clone());
        }

        builder.build()
    }
}
