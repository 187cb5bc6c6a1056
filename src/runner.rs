//! Test execution: run `unittest discover` and capture its output.
//!
//! ## Interpreter Resolution
//!
//! 1. `$FAILPROMPT_PYTHON` environment variable
//! 2. `python3` from `$PATH`
//! 3. `python` from `$PATH`
//!
//! A resolution miss is an error; the tool cannot do anything useful
//! without an interpreter.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Environment variable overriding interpreter discovery.
pub const PYTHON_ENV_VAR: &str = "FAILPROMPT_PYTHON";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("no Python interpreter found (set $FAILPROMPT_PYTHON or put python3 on $PATH)")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("test run exceeded {}s and was killed", .timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("test process I/O failed: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Test Run Result
// ============================================================================

/// Captured output of one `unittest discover` invocation.
#[derive(Debug, Clone)]
pub struct TestRunResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code; `None` when killed by a signal.
    pub exit_code: Option<i32>,
}

impl TestRunResult {
    /// Whether the run reported failures or errors. unittest exits non-zero
    /// for both, and a signal death counts as a failure too.
    pub fn has_failures(&self) -> bool {
        self.exit_code != Some(0)
    }

    /// stdout and stderr concatenated. unittest writes its report to
    /// stderr, but tests print wherever they like, so failures are parsed
    /// out of both streams.
    pub fn combined_output(&self) -> String {
        let mut combined = self.stdout.clone();
        if !combined.is_empty() && !self.stderr.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&self.stderr);
        combined
    }
}

// ============================================================================
// Runner
// ============================================================================

pub struct TestRunner {
    python: PathBuf,
    test_dir: String,
    timeout: Option<Duration>,
}

impl TestRunner {
    /// Resolve an interpreter and prepare a runner for `test_dir`.
    pub fn new(test_dir: &str, timeout: Option<Duration>) -> Result<Self, InterpreterError> {
        let python = resolve_python()?;
        debug!(python = %python.display(), "resolved interpreter");
        Ok(TestRunner {
            python,
            test_dir: test_dir.to_string(),
            timeout,
        })
    }

    /// Run `unittest discover` in `project_root` and capture both streams.
    ///
    /// Failing tests are not an error here; they are exactly what the rest
    /// of the pipeline wants. Only failing to run at all is.
    pub fn run_tests(&self, project_root: &Path) -> Result<TestRunResult, RunError> {
        let mut command = Command::new(&self.python);
        command
            .args(["-m", "unittest", "discover", &self.test_dir])
            .current_dir(project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!(test_dir = %self.test_dir, "running tests");
        match self.timeout {
            None => {
                let output = command.output().map_err(|err| RunError::Spawn {
                    command: self.describe(),
                    source: err,
                })?;
                Ok(TestRunResult {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                })
            }
            Some(timeout) => self.run_with_timeout(command, timeout),
        }
    }

    /// Spawn with piped streams drained on background threads, then wait
    /// with a deadline. Draining must not block the wait: a test that fills
    /// the pipe buffer would otherwise deadlock against a waiting parent.
    fn run_with_timeout(
        &self,
        mut command: Command,
        timeout: Duration,
    ) -> Result<TestRunResult, RunError> {
        let mut child = command.spawn().map_err(|err| RunError::Spawn {
            command: self.describe(),
            source: err,
        })?;

        let stdout_reader = child.stdout.take().map(drain_in_background);
        let stderr_reader = child.stderr.take().map(drain_in_background);

        let status = match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = timeout.as_secs(), "test run timed out; killing");
                child.kill()?;
                child.wait()?;
                return Err(RunError::Timeout { timeout });
            }
        };

        Ok(TestRunResult {
            stdout: join_reader(stdout_reader),
            stderr: join_reader(stderr_reader),
            exit_code: status.code(),
        })
    }

    fn describe(&self) -> String {
        format!(
            "{} -m unittest discover {}",
            self.python.display(),
            self.test_dir
        )
    }
}

/// Find a Python interpreter, preferring the explicit override.
pub fn resolve_python() -> Result<PathBuf, InterpreterError> {
    if let Some(path) = std::env::var_os(PYTHON_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    for candidate in ["python3", "python"] {
        if let Ok(path) = which::which(candidate) {
            return Ok(path);
        }
    }
    Err(InterpreterError::NotFound)
}

fn drain_in_background(mut stream: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error past this point just truncates the capture.
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_exit_counts_as_failures() {
        let result = TestRunResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(1),
        };
        assert!(result.has_failures());
    }

    #[test]
    fn signal_death_counts_as_failures() {
        let result = TestRunResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
        };
        assert!(result.has_failures());
    }

    #[test]
    fn clean_exit_is_not_a_failure() {
        let result = TestRunResult {
            stdout: "OK\n".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        assert!(!result.has_failures());
    }

    #[test]
    fn combined_output_keeps_streams_separated_by_newline() {
        let result = TestRunResult {
            stdout: "printed".to_string(),
            stderr: "FAIL: test_x".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(result.combined_output(), "printed\nFAIL: test_x");
    }

    #[test]
    fn combined_output_with_empty_stdout_is_just_stderr() {
        let result = TestRunResult {
            stdout: String::new(),
            stderr: "report".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(result.combined_output(), "report");
    }
}
