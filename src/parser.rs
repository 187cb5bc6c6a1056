//! Parse unittest output into structured failure reports.
//!
//! unittest prints one block per failing test, fenced by `====` separator
//! lines:
//!
//! ```text
//! ======================================================================
//! FAIL: test_value (tests.test_sample.SampleTest)
//! ----------------------------------------------------------------------
//! Traceback (most recent call last):
//!   File "/proj/tests/test_sample.py", line 12, in test_value
//!     self.assertEqual(self.value, 2)
//! AssertionError: 1 != 2
//! ```
//!
//! Each block becomes one [`TestFailure`]. The file and line are taken from
//! the **last** `File "...", line N` entry in the block, the deepest frame
//! of the traceback, which is where the assertion actually fired.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// ============================================================================
// Failure record
// ============================================================================

/// One failing test, as reported by unittest.
#[derive(Debug, Clone, Serialize)]
pub struct TestFailure {
    /// Test method name (`test_value`).
    pub test_name: String,
    /// Unqualified test class name (`SampleTest`).
    pub test_class: String,
    /// File of the deepest traceback frame.
    pub file_path: PathBuf,
    /// 1-based line of the deepest traceback frame.
    pub line_number: usize,
    /// Last line of the block, typically the assertion message.
    pub failure_message: String,
    /// The traceback portion of the block.
    pub traceback: String,
    /// The complete block, verbatim.
    pub full_output: String,
}

// ============================================================================
// Parser
// ============================================================================

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(FAIL|ERROR): (test_\w+) \(([\w.]+)\)").unwrap()
});

// `, in <module>` style suffixes after the line number are ignored.
static FILE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "([^"]+)", line (\d+)(?:, .*)?"#).unwrap());

static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^=+$").unwrap());

/// Extracts [`TestFailure`]s from raw unittest output.
pub struct TestOutputParser {
    number_of_issues: usize,
}

impl TestOutputParser {
    /// `number_of_issues` caps how many failures are returned; 0 means all.
    pub fn new(number_of_issues: usize) -> Self {
        TestOutputParser { number_of_issues }
    }

    /// Parse the full output, in report order.
    pub fn parse_output(&self, output: &str) -> Vec<TestFailure> {
        let mut failures = Vec::new();
        for block in SEPARATOR.split(output) {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }
            if let Some(failure) = parse_block(block) {
                failures.push(failure);
                if self.number_of_issues > 0 && failures.len() >= self.number_of_issues {
                    break;
                }
            }
        }
        failures
    }
}

fn parse_block(block: &str) -> Option<TestFailure> {
    let header = HEADER.captures(block)?;
    let test_name = header[2].to_string();
    let test_class = class_from_qualified(&header[3], &test_name);

    let deepest = FILE_LINE.captures_iter(block).last()?;
    let file_path = PathBuf::from(&deepest[1]);
    let line_number: usize = deepest[2].parse().ok()?;

    let failure_message = block.lines().last().unwrap_or("").trim().to_string();

    let traceback_start = block.find("Traceback").unwrap_or(0);
    // "Traceback" may first appear on the block's final line, after the
    // last newline; never slice backwards.
    let traceback_end = block.rfind('\n').unwrap_or(block.len()).max(traceback_start);
    let traceback = block[traceback_start..traceback_end].trim().to_string();

    Some(TestFailure {
        test_name,
        test_class,
        file_path,
        line_number,
        failure_message,
        traceback,
        full_output: block.to_string(),
    })
}

/// Unqualified class name from the parenthesized path in the header line.
///
/// Python <= 3.10 prints `(module.Class)`; 3.11+ appends the method as
/// `(module.Class.method)`, so a trailing component equal to the test name
/// is dropped first.
fn class_from_qualified(qualified: &str, test_name: &str) -> String {
    let mut parts = qualified.rsplit('.');
    let last = parts.next().unwrap_or(qualified);
    if last == test_name {
        if let Some(class) = parts.next() {
            return class.to_string();
        }
    }
    last.to_string()
}

// ============================================================================
// Tests
// ============================================================================
