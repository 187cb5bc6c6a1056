//! Assemble and write the final prompt file.
//!
//! The prompt is a plain-text document: an optional instructions section,
//! then one section per failure holding the test output, the test code with
//! its fixtures, and each dependency's source, every code section prefixed
//! with its file path and import lines. Failures are separated by a line of
//! seventy `=` characters.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use failprompt_python::CodeSegment;

use crate::error::FailpromptError;

/// Optional preamble file, read from the project root.
const INSTRUCTIONS_FILE: &str = "prompt_instructions.txt";

const FAILURE_SEPARATOR_WIDTH: usize = 70;

// ============================================================================
// Failure info
// ============================================================================

/// Everything the prompt needs for one failing test.
#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    /// The verbatim unittest failure block.
    pub test_output: String,
    /// The failing test with its class fixtures and imports.
    pub test_code: CodeSegment,
    /// Dependency sources, each preceding its dependents, test last.
    pub source_segments: Vec<CodeSegment>,
}

// ============================================================================
// Generator
// ============================================================================

pub struct PromptGenerator {
    project_root: PathBuf,
}

impl PromptGenerator {
    pub fn new(project_root: &Path) -> Self {
        PromptGenerator {
            project_root: project_root.to_path_buf(),
        }
    }

    /// Render the prompt and write it to `output_file`.
    pub fn generate_prompt(
        &self,
        failures: &[FailureInfo],
        output_file: &Path,
    ) -> Result<(), FailpromptError> {
        let content = self.render(failures);
        fs::write(output_file, content).map_err(|err| FailpromptError::WriteOutput {
            path: output_file.to_path_buf(),
            source: err,
        })?;
        info!(failures = failures.len(), output = %output_file.display(), "wrote prompt");
        Ok(())
    }

    /// Render the prompt document as a string.
    pub fn render(&self, failures: &[FailureInfo]) -> String {
        let mut content: Vec<String> = Vec::new();

        if let Some(instructions) = self.read_instructions() {
            content.push("=== INSTRUCTIONS ===".to_string());
            content.push(instructions);
            content.push(String::new());
        }

        for (i, failure) in failures.iter().enumerate() {
            content.push("=== TEST OUTPUT ===".to_string());
            content.push(failure.test_output.clone());
            content.push(String::new());

            push_segment_header(&mut content, &failure.test_code);
            let test = &failure.test_code;
            if test.class_name.is_some() {
                if let Some(setup) = &test.setup_code {
                    content.push(setup.clone());
                    content.push(String::new());
                }
                if let Some(teardown) = &test.teardown_code {
                    content.push(teardown.clone());
                    content.push(String::new());
                }
            }
            if let Some(test_code) = &test.test_code {
                content.push(test_code.clone());
                content.push(String::new());
            }

            for segment in &failure.source_segments {
                push_segment_header(&mut content, segment);
                if let Some(source) = &segment.source_code {
                    content.push(source.clone());
                    content.push(String::new());
                }
            }

            if i + 1 < failures.len() {
                content.push("=".repeat(FAILURE_SEPARATOR_WIDTH));
                content.push(String::new());
            }
        }

        content.join("\n")
    }

    /// `prompt_instructions.txt` from the project root, if present. A read
    /// failure only costs the preamble, never the prompt.
    fn read_instructions(&self) -> Option<String> {
        let path = self.project_root.join(INSTRUCTIONS_FILE);
        if !path.exists() {
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(text) => Some(text.trim().to_string()),
            Err(err) => {
                warn!(file = %path.display(), error = %err, "failed to read instructions");
                None
            }
        }
    }
}

fn push_segment_header(content: &mut Vec<String>, segment: &CodeSegment) {
    content.push(format!("=== {} ===", segment.file_path.display()));
    content.push(format_imports(&segment.imports));
    content.push(String::new());
}

/// Import lines trimmed but kept in extraction order.
fn format_imports(imports: &[String]) -> String {
    imports
        .iter()
        .map(|imp| imp.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Tests
// ============================================================================
