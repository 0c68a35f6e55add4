//! Top-level error types for the kpacker binary.
//!
//! The library reports [`crate::bundler::Error`]; this module wraps it
//! together with argument errors for the entry routine.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, BundlerError>;

/// Main error type of the entry routine
#[derive(Error, Debug)]
pub enum BundlerError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Packaging errors
    #[error("{0}")]
    Bundler(#[from] crate::bundler::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },
}

impl BundlerError {
    /// Whether the run was rejected before any target started.
    pub fn is_configuration(&self) -> bool {
        match self {
            BundlerError::Cli(_) => true,
            BundlerError::Bundler(e) => e.is_configuration(),
            BundlerError::Io(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_configuration_classification() {
        let missing = BundlerError::from(CliError::MissingArgument {
            argument: "--document-icon".into(),
        });
        assert!(missing.is_configuration());
        assert_eq!(
            missing.to_string(),
            "CLI error: Missing required argument: --document-icon"
        );

        let no_jars = BundlerError::from(crate::bundler::Error::NoJars(PathBuf::from("/src")));
        assert!(no_jars.is_configuration());

        let io = BundlerError::from(std::io::Error::other("disk full"));
        assert!(!io.is_configuration());
    }
}
