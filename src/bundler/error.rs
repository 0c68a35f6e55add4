//! Error types for packaging operations.
//!
//! Provides contextual error chaining, filesystem-specific errors and the
//! configuration/toolchain variants that decide whether a failure is fatal
//! for the whole run or only for a single target.
//!
//! # Features
//!
//! - **Context trait**: Add context to errors similar to anyhow
//! - **ErrorExt trait**: Filesystem operations with automatic path context
//! - **bail! macro**: Early return with formatted error messages
//!
//! # Example
//!
//! ```no_run
//! use kpacker::bundler::error::{Context, ErrorExt, Result};
//! use std::path::Path;
//!
//! fn read_config(path: &Path) -> Result<String> {
//!     let contents = std::fs::read_to_string(path)
//!         .fs_context("reading launcher config", path)?;
//!
//!     if contents.is_empty() {
//!         kpacker::bail!("launcher config {} is empty", path.display());
//!     }
//!
//!     contents
//!         .lines()
//!         .next()
//!         .map(str::to_string)
//!         .context("launcher config has no lines")
//! }
//! ```

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Errors returned by the packager.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading manifest")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// An external tool could not be started at all.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command line that failed to spawn
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// A required external step exited with a non-zero code.
    #[error("{step} failed with exit code {code}")]
    ToolFailed {
        /// Human readable name of the step
        step: String,
        /// Exit code reported by the process
        code: i32,
    },

    /// Expected pattern missing from a tool's textual output.
    #[error("could not determine {what} from tool output {output:?}")]
    OutputParse {
        /// What was being extracted (loop device, mount point)
        what: &'static str,
        /// The raw output that was scanned
        output: String,
    },

    /// Neither docker nor podman could be found.
    #[error("no container runtime (docker or podman) found in PATH or common locations")]
    NoToolchainAvailable,

    /// `--mainjar` names a jar that is not in the source directory.
    #[error("main jar {0} not found")]
    MainJarMissing(String),

    /// The source directory contains no jar at all.
    #[error("main jar not found in {}", .0.display())]
    NoJars(PathBuf),

    /// Several jars and no `--mainjar` to choose between them.
    #[error("multiple payloads found in {}: {}", dir.display(), jars.join(", "))]
    MultipleJars {
        /// Source directory that was scanned
        dir: PathBuf,
        /// Candidate jar names
        jars: Vec<String>,
    },

    /// A required key is absent from the primary jar's manifest.
    #[error("{key} not found in manifest of {}", jar.display())]
    MissingManifestKey {
        /// Manifest key that was looked up
        key: &'static str,
        /// Jar whose manifest was read
        jar: PathBuf,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking a directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// ZIP archive reading error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Handlebars template rendering error.
    #[error("{0}")]
    HandleBarsError(#[from] handlebars::RenderError),

    /// Handlebars template parsing error.
    #[error("{0}")]
    Template(#[from] handlebars::TemplateError),

    /// JSON serialization/deserialization error.
    #[error("{0}")]
    JsonError(#[from] serde_json::error::Error),

    /// Regular expression error.
    #[error("{0}")]
    RegexError(#[from] regex::Error),

    /// HTTP client error (downloading distributions).
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid glob pattern.
    #[error("{0}")]
    GlobPattern(#[from] glob::PatternError),

    /// URL parsing error.
    #[error("{0}")]
    UrlParse(#[from] url::ParseError),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Whether this error belongs to the configuration class that must
    /// abort the run before any target starts.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::MainJarMissing(_)
            | Error::NoJars(_)
            | Error::MultipleJars { .. }
            | Error::MissingManifestKey { .. } => true,
            Error::Context(_, inner) => inner.is_configuration(),
            _ => false,
        }
    }
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with the packager's Error type.
/// Works with both `Result<T, E>` and `Option<T>`.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory", "copying icon".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::error::Error::GenericError(format!($msg)))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::error::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::error::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        assert!(Error::NoJars(PathBuf::from("/src")).is_configuration());
        assert!(
            Error::MultipleJars {
                dir: PathBuf::from("/src"),
                jars: vec!["a.jar".into(), "b.jar".into()],
            }
            .is_configuration()
        );
        assert!(!Error::NoToolchainAvailable.is_configuration());
    }

    #[test]
    fn test_context_preserves_classification() {
        let result: Result<()> = Err(Error::MainJarMissing("app.jar".into()));
        let err = result.context("building application").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "building application: main jar app.jar not found"
        );
    }

    #[test]
    fn test_multiple_jars_message() {
        let err = Error::MultipleJars {
            dir: PathBuf::from("/src"),
            jars: vec!["a.jar".into(), "b.jar".into()],
        };
        assert_eq!(err.to_string(), "multiple payloads found in /src: a.jar, b.jar");
    }

    #[test]
    fn test_option_context() {
        let value: Option<u8> = None;
        let err = value.context("nothing here").unwrap_err();
        assert_eq!(err.to_string(), "nothing here");
    }
}
