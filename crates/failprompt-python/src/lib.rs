//! Python static analysis for failprompt.
//!
//! This crate turns "(file, function name)" into an ordered list of
//! self-contained code fragments with their resolved imports, using only
//! syntax-level analysis (no code is executed). It includes:
//! - Project module indexing (dotted module path -> file path)
//! - Verbatim function and test-fixture extraction
//! - Per-file import resolution (aliases, relative imports)
//! - Call collection with receiver-to-constructor tracking
//! - Breadth-first dependency tracking across files

pub mod calls;
pub mod extract;
pub mod imports;
pub mod index;
pub mod syntax;
pub mod tracker;
pub mod types;

pub use extract::CodeExtractor;
pub use imports::{build_import_map, filter_used_imports, ImportBinding, ImportMap};
pub use index::ModuleIndex;
pub use tracker::DependencyTracker;
pub use types::{CallTarget, CodeSegment, FunctionRecord};
