//! Failure-to-prompt flow over a real project tree, driven by captured
//! unittest output instead of a live interpreter.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use failprompt::parser::TestOutputParser;
use failprompt::pipeline::build_failure_info;
use failprompt::prompt::PromptGenerator;
use failprompt::python::{CodeExtractor, DependencyTracker};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn unittest_output(test_file: &Path) -> String {
    format!(
        "F\n\
         ======================================================================\n\
         FAIL: test_total (tests.test_cart.CartTest)\n\
         ----------------------------------------------------------------------\n\
         Traceback (most recent call last):\n\
         \x20 File \"{}\", line 10, in test_total\n\
         \x20   self.assertEqual(total([2, 3]), 6)\n\
         AssertionError: 5 != 6\n",
        test_file.display()
    )
}

#[test]
fn failure_output_becomes_a_complete_prompt() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "cart.py",
        concat!(
            "import math\n",
            "\n",
            "def add(a, b):\n",
            "    return a + b\n",
            "\n",
            "def total(items):\n",
            "    result = 0\n",
            "    for item in items:\n",
            "        result = add(result, item)\n",
            "    return result\n",
        ),
    );
    write(
        dir.path(),
        "tests/test_cart.py",
        concat!(
            "import unittest\n",
            "from cart import total\n",
            "\n",
            "class CartTest(unittest.TestCase):\n",
            "    def setUp(self):\n",
            "        self.items = [2, 3]\n",
            "\n",
            "    def test_total(self):\n",
            "        self.assertEqual(total(self.items), 6)\n",
        ),
    );

    let test_file = dir.path().join("tests/test_cart.py");
    let output = unittest_output(&test_file);

    let failures = TestOutputParser::new(0).parse_output(&output);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].test_name, "test_total");
    assert_eq!(failures[0].test_class, "CartTest");
    assert_eq!(failures[0].file_path, test_file);

    let extractor = CodeExtractor::new();
    let tracker = DependencyTracker::new(dir.path());
    let info = build_failure_info(&failures[0], &extractor, &tracker, false);

    // total() and its helper add() both made it in, helper first.
    let files: Vec<_> = info
        .source_segments
        .iter()
        .map(|s| s.file_path.clone())
        .collect();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.ends_with("cart.py")));
    assert!(info.source_segments[0]
        .source_code
        .as_ref()
        .unwrap()
        .contains("def add"));
    assert!(info.source_segments[1]
        .source_code
        .as_ref()
        .unwrap()
        .contains("def total"));

    // Neither function touches math, so the filter drops the import.
    assert!(info.source_segments.iter().all(|s| s.imports.is_empty()));

    let output_file = dir.path().join("prompt.txt");
    PromptGenerator::new(dir.path())
        .generate_prompt(&[info], &output_file)
        .unwrap();

    let prompt = fs::read_to_string(output_file).unwrap();
    assert!(prompt.starts_with("=== TEST OUTPUT ==="));
    assert!(prompt.contains("AssertionError: 5 != 6"));
    assert!(prompt.contains("def setUp"));
    assert!(prompt.contains("def test_total"));
    assert!(prompt.contains("def add"));
    let setup_at = prompt.find("def setUp").unwrap();
    let sources_at = prompt.find("def total").unwrap();
    assert!(setup_at < sources_at);
}
