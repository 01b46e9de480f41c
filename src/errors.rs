//! Fatal error types for the harness.
//!
//! Only conditions that abort a whole run live here. Per-fixture problems
//! (a transform that crashes, an output mismatch) are recorded as
//! [`Outcome`](crate::runner::Outcome) values and never surface as errors.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors that stop the harness before or outside of fixture processing.
#[derive(Error, Diagnostic, Debug)]
pub enum HarnessError {
    #[error("Discovery error: cannot read fixture directory '{}'", .dir.display())]
    #[diagnostic(
        code(goldrun::discovery::fixture_dir),
        help("pass an existing directory with --fixture-dir")
    )]
    Discovery {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Discovery error: failed to walk '{}': {message}", .dir.display())]
    #[diagnostic(code(goldrun::discovery::walk))]
    Walk { dir: PathBuf, message: String },

    #[error("Discovery error: transform executable '{program}' not found")]
    #[diagnostic(
        code(goldrun::discovery::transform),
        help("check --transform-cmd; bare names are looked up on PATH")
    )]
    TransformNotFound { program: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(goldrun::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("I/O error on '{}': {source}", .path.display())]
    #[diagnostic(code(goldrun::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub fn config(message: impl Into<String>) -> Self {
        HarnessError::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        HarnessError::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors raised while locating fixtures or the transform.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            HarnessError::Discovery { .. }
                | HarnessError::Walk { .. }
                | HarnessError::TransformNotFound { .. }
        )
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_message_names_the_cause() {
        let err = HarnessError::io(
            "fixtures/a.out",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
        );
        let text = err.to_string();
        assert!(text.contains("fixtures/a.out"), "{text}");
        assert!(text.contains("permission denied"), "{text}");
    }

    #[test]
    fn discovery_errors_are_classified() {
        let err = HarnessError::TransformNotFound {
            program: "m4".into(),
        };
        assert!(err.is_discovery());
        assert!(!HarnessError::config("bad").is_discovery());
    }
}
