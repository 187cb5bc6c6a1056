//! End-to-end analysis: run tests, parse failures, collect code, write the
//! prompt.

use std::fs;

use tracing::{info, warn};

use failprompt_python::{filter_used_imports, CodeExtractor, DependencyTracker};

use crate::config::Config;
use crate::error::{FailpromptError, Result};
use crate::parser::{TestFailure, TestOutputParser};
use crate::prompt::{FailureInfo, PromptGenerator};
use crate::runner::TestRunner;

/// What a run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Every test passed; nothing to report.
    AllPassed,
    /// Tests failed but no failure block could be parsed from the output.
    NoFailuresParsed,
    /// The report was written with this many failures.
    Written { failures: usize },
}

/// Run the whole workflow for `config`.
pub fn run_analysis(config: &Config) -> Result<AnalysisOutcome> {
    let runner = TestRunner::new(&config.test_dir, config.timeout())?;
    let result = runner.run_tests(&config.project_root)?;

    if !result.has_failures() {
        info!("all tests passed");
        return Ok(AnalysisOutcome::AllPassed);
    }

    let output = result.combined_output();
    let failures = TestOutputParser::new(config.number_of_issues).parse_output(&output);
    if failures.is_empty() {
        warn!("tests failed but no failure blocks were parsed");
        return Ok(AnalysisOutcome::NoFailuresParsed);
    }

    let extractor = CodeExtractor::new();
    let tracker = DependencyTracker::new(&config.project_root);

    let infos: Vec<FailureInfo> = failures
        .iter()
        .map(|failure| build_failure_info(failure, &extractor, &tracker, config.all_imports))
        .collect();

    if config.json {
        let report = serde_json::to_string_pretty(&infos)?;
        fs::write(&config.output_file, report).map_err(|err| FailpromptError::WriteOutput {
            path: config.output_file.clone(),
            source: err,
        })?;
        info!(failures = infos.len(), output = %config.output_file.display(), "wrote JSON report");
    } else {
        PromptGenerator::new(&config.project_root).generate_prompt(&infos, &config.output_file)?;
    }

    Ok(AnalysisOutcome::Written {
        failures: infos.len(),
    })
}

/// Collect the code behind one failure: the test with its fixtures, then
/// every function the test transitively depends on.
///
/// The tracker's final record is the test itself; it is skipped here since
/// the test section already carries that code. Records without a locatable
/// body (builtins, third-party calls) are skipped too. Unless
/// `all_imports` is set, each source segment keeps only the imports its own
/// fragment uses; the test section keeps all of its file's imports, since
/// fixtures routinely lean on module-level state the fragment alone does
/// not mention.
pub fn build_failure_info(
    failure: &TestFailure,
    extractor: &CodeExtractor,
    tracker: &DependencyTracker,
    all_imports: bool,
) -> FailureInfo {
    info!(test = %failure.test_name, "processing failure");

    let test_code = extractor.extract_test_code(&failure.file_path, &failure.test_name);

    let records = tracker.track_dependencies(
        &failure.file_path,
        &failure.test_name,
        Some(&failure.test_class),
    );

    let mut source_segments = Vec::new();
    for record in &records {
        if record.name == failure.test_name
            && record.class_name.as_deref() == Some(failure.test_class.as_str())
        {
            continue;
        }
        let mut segment = extractor.extract_source_code(
            &record.file_path,
            &record.name,
            record.class_name.as_deref(),
        );
        let Some(source) = segment.source_code.clone() else {
            continue;
        };
        if !all_imports {
            segment.imports = filter_used_imports(&segment.imports, &source);
        }
        source_segments.push(segment);
    }

    FailureInfo {
        test_output: failure.full_output.clone(),
        test_code,
        source_segments,
    }
}

// ============================================================================
// Tests
// ============================================================================
