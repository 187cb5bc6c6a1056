//! Shared data types for the analysis core.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// CodeSegment
// ============================================================================

/// A self-contained fragment of extracted source code.
///
/// Exactly one of the two extraction entry points populates a segment:
/// [`CodeExtractor::extract_test_code`](crate::extract::CodeExtractor::extract_test_code)
/// fills `setup_code`/`teardown_code`/`test_code`, while
/// [`CodeExtractor::extract_source_code`](crate::extract::CodeExtractor::extract_source_code)
/// fills `source_code`. The import list is collected either way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSegment {
    /// File the fragment was extracted from.
    pub file_path: PathBuf,
    /// Enclosing class of the matched function, if any.
    pub class_name: Option<String>,
    /// `setUp` body of the matched test's class.
    pub setup_code: Option<String>,
    /// `tearDown` body of the matched test's class.
    pub teardown_code: Option<String>,
    /// Body of the matched test method.
    pub test_code: Option<String>,
    /// Body of a standalone matched function.
    pub source_code: Option<String>,
    /// The file's top-level import statements, in file order.
    pub imports: Vec<String>,
}

impl CodeSegment {
    /// An empty segment for `file_path`, the soft-failure result of every
    /// extraction entry point.
    pub fn empty(file_path: impl Into<PathBuf>) -> Self {
        CodeSegment {
            file_path: file_path.into(),
            ..CodeSegment::default()
        }
    }

    /// True when no text field was populated.
    pub fn is_empty(&self) -> bool {
        self.setup_code.is_none()
            && self.teardown_code.is_none()
            && self.test_code.is_none()
            && self.source_code.is_none()
    }
}

// ============================================================================
// CallTarget
// ============================================================================

/// An outgoing call discovered inside a function body.
///
/// `owner` is the callee's type name when one could be inferred (`v = T();
/// v.m()` yields owner `T`), the receiver name as a hint otherwise
/// (`self.m()` yields owner `self`), or `None` for a bare call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallTarget {
    /// Name of the called function or method.
    pub name: String,
    /// Owner type name, receiver hint, or none for a bare call.
    pub owner: Option<String>,
}

impl CallTarget {
    pub fn new(name: impl Into<String>, owner: Option<String>) -> Self {
        CallTarget {
            name: name.into(),
            owner,
        }
    }
}

// ============================================================================
// FunctionRecord
// ============================================================================

/// One function visited during dependency tracking.
///
/// Identity is (file, name, class). Records are immutable once the traversal
/// appends them; a function that could not be located yields a stub record
/// with no source text and no dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Function name.
    pub name: String,
    /// File the function was resolved to.
    pub file_path: PathBuf,
    /// Enclosing class name, or none for a free-standing function.
    pub class_name: Option<String>,
    /// Verbatim source text including attached decorators.
    pub source_code: Option<String>,
    /// 1-based first line of the extracted span (0 for stubs).
    pub start_line: usize,
    /// 1-based last line of the extracted span (0 for stubs).
    pub end_line: usize,
    /// Outgoing calls, deduplicated in first-seen order.
    pub dependencies: Vec<CallTarget>,
}

impl FunctionRecord {
    /// A stub record for a function that could not be located.
    pub fn stub(name: impl Into<String>, file_path: impl Into<PathBuf>, class_name: Option<String>) -> Self {
        FunctionRecord {
            name: name.into(),
            file_path: file_path.into(),
            class_name,
            source_code: None,
            start_line: 0,
            end_line: 0,
            dependencies: Vec::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
