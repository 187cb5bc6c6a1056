//! Unified error type and exit code mapping.
//!
//! Subsystem errors (interpreter resolution, test execution, output
//! writing) bridge into `FailpromptError` via `From`, and each variant maps
//! to a stable process exit code:
//! - `2`: invalid arguments (bad input from caller)
//! - `3`: no usable Python interpreter
//! - `4`: test execution failed (spawn error, timeout)
//! - `5`: could not write the output file
//! - `10`: internal errors (bugs, unexpected state)

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::runner::{InterpreterError, RunError};

// ============================================================================
// Unified Error Type
// ============================================================================

/// The single error type surfaced by the CLI.
#[derive(Debug, Error)]
pub enum FailpromptError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// No Python interpreter could be resolved.
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),

    /// The test run itself failed (not failing tests -- failure to run).
    #[error(transparent)]
    Run(#[from] RunError),

    /// The prompt or JSON output could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON serialization failure.
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FailpromptError {
    /// Stable exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            FailpromptError::InvalidArguments(_) => 2,
            FailpromptError::Interpreter(_) => 3,
            FailpromptError::Run(_) => 4,
            FailpromptError::WriteOutput { .. } => 5,
            FailpromptError::Serialize(_) => 10,
        }
    }
}

/// Convenience alias for pipeline-level results.
pub type Result<T> = std::result::Result<T, FailpromptError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(
            FailpromptError::InvalidArguments("x".into()).exit_code(),
            2
        );
        let write = FailpromptError::WriteOutput {
            path: PathBuf::from("prompt.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(write.exit_code(), 5);
    }

    #[test]
    fn write_error_names_the_path() {
        let err = FailpromptError::WriteOutput {
            path: PathBuf::from("out/prompt.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("out/prompt.txt"));
    }
}
