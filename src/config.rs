//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FailpromptError;

/// Everything one analysis run needs, assembled by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the project under analysis.
    pub project_root: PathBuf,
    /// Test directory passed to `unittest discover`, relative to the root.
    pub test_dir: String,
    /// How many failures to include; 0 means all of them.
    pub number_of_issues: usize,
    /// Where the prompt (or JSON report) is written.
    pub output_file: PathBuf,
    /// Keep every top-level import instead of filtering to the used ones.
    pub all_imports: bool,
    /// Emit a JSON report instead of the prompt text.
    pub json: bool,
    /// Kill the test run after this many seconds; `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Canonicalize the project root and check it is a directory.
    pub fn validate(mut self) -> Result<Self, FailpromptError> {
        self.project_root = self.project_root.canonicalize().map_err(|err| {
            FailpromptError::InvalidArguments(format!(
                "project root {} is not accessible: {err}",
                self.project_root.display()
            ))
        })?;
        if !self.project_root.is_dir() {
            return Err(FailpromptError::InvalidArguments(format!(
                "project root {} is not a directory",
                self.project_root.display()
            )));
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
