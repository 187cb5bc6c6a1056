//! failprompt: analyze failing Python unit tests and assemble a
//! minimal-context prompt.
//!
//! The pipeline runs `unittest discover`, parses the failure blocks out of
//! the output, statically collects the code each failing test depends on
//! (via the [`python`] analysis crate), and writes a prompt file pairing
//! every failure with exactly the code needed to understand it.

pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod runner;

pub use failprompt_python as python;

pub use config::Config;
pub use error::FailpromptError;
pub use pipeline::{run_analysis, AnalysisOutcome};
