//! Verbatim source extraction.
//!
//! Locates a named function (optionally qualified by its enclosing class) or
//! a test method with its fixtures, and returns the exact source text. Every
//! entry point fails softly: unreadable or unparseable files yield an empty
//! [`CodeSegment`], never an error.

use std::fs;
use std::path::Path;

use rustpython_parser::ast;
use rustpython_parser::text_size::TextRange;
use tracing::warn;

use crate::imports::top_level_import_statements;
use crate::syntax::{line_number, line_snippet, parse_python, FuncDef};
use crate::types::CodeSegment;

// ============================================================================
// Function lookup
// ============================================================================

/// A located function definition with its enclosing class, if any.
#[derive(Debug, Clone, Copy)]
pub struct FoundFunction<'a> {
    pub def: FuncDef<'a>,
    pub class_name: Option<&'a str>,
}

/// Locate `name` in a parsed module.
///
/// Walks the tree in pre-order (a definition is checked before its body is
/// descended into, statements in file order); the first satisfying match
/// wins. With `owner` present, the innermost enclosing class must carry that
/// name; with `owner` absent only functions outside any class match.
pub fn find_function<'a>(
    suite: &'a [ast::Stmt],
    name: &str,
    owner: Option<&str>,
) -> Option<FoundFunction<'a>> {
    let mut class_stack: Vec<&'a str> = Vec::new();
    find_in_stmts(suite, name, owner, &mut class_stack)
}

fn find_in_stmts<'a>(
    stmts: &'a [ast::Stmt],
    name: &str,
    owner: Option<&str>,
    class_stack: &mut Vec<&'a str>,
) -> Option<FoundFunction<'a>> {
    for stmt in stmts {
        if let Some(def) = FuncDef::from_stmt(stmt) {
            if def.name() == name && class_stack.last().copied() == owner {
                return Some(FoundFunction {
                    def,
                    class_name: class_stack.last().copied(),
                });
            }
            // Nested defs keep the same enclosing class.
            if let Some(found) = find_in_stmts(def.body(), name, owner, class_stack) {
                return Some(found);
            }
        } else if let ast::Stmt::ClassDef(class_def) = stmt {
            class_stack.push(class_def.name.as_str());
            let found = find_in_stmts(&class_def.body, name, owner, class_stack);
            class_stack.pop();
            if found.is_some() {
                return found;
            }
        } else {
            for body in child_bodies(stmt) {
                if let Some(found) = find_in_stmts(body, name, owner, class_stack) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Statement bodies that can hide a definition (conditional defs, defs under
/// try/except, and so on).
fn child_bodies(stmt: &ast::Stmt) -> Vec<&[ast::Stmt]> {
    match stmt {
        ast::Stmt::If(s) => vec![&s.body, &s.orelse],
        ast::Stmt::While(s) => vec![&s.body, &s.orelse],
        ast::Stmt::For(s) => vec![&s.body, &s.orelse],
        ast::Stmt::AsyncFor(s) => vec![&s.body, &s.orelse],
        ast::Stmt::With(s) => vec![&s.body],
        ast::Stmt::AsyncWith(s) => vec![&s.body],
        ast::Stmt::Try(s) => {
            let mut bodies: Vec<&[ast::Stmt]> = vec![&s.body, &s.orelse, &s.finalbody];
            for handler in &s.handlers {
                let ast::ExceptHandler::ExceptHandler(handler) = handler;
                bodies.push(&handler.body);
            }
            bodies
        }
        ast::Stmt::TryStar(s) => {
            let mut bodies: Vec<&[ast::Stmt]> = vec![&s.body, &s.orelse, &s.finalbody];
            for handler in &s.handlers {
                let ast::ExceptHandler::ExceptHandler(handler) = handler;
                bodies.push(&handler.body);
            }
            bodies
        }
        ast::Stmt::Match(s) => s.cases.iter().map(|case| case.body.as_slice()).collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// CodeExtractor
// ============================================================================

/// Extracts verbatim source fragments from Python files.
///
/// Stateless; the file is read and parsed on every call. Callers that visit
/// the same file repeatedly keep their own content cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeExtractor;

impl CodeExtractor {
    pub fn new() -> Self {
        CodeExtractor
    }

    /// Extract the source of `function_name`, decorators included.
    ///
    /// `class_name` selects a method by its innermost enclosing class; when
    /// absent only free-standing functions match. The file's top-level
    /// import statements are collected on the same pass.
    pub fn extract_source_code(
        &self,
        file_path: &Path,
        function_name: &str,
        class_name: Option<&str>,
    ) -> CodeSegment {
        let Some((source, suite)) = read_and_parse(file_path) else {
            return CodeSegment::empty(file_path);
        };

        let mut segment = CodeSegment::empty(file_path);
        segment.imports = top_level_import_statements(&suite, &source);

        if let Some(found) = find_function(&suite, function_name, class_name) {
            segment.class_name = found.class_name.map(str::to_string);
            segment.source_code = Some(line_snippet(&source, found.def.full_range()));
        }
        segment
    }

    /// Extract a test method together with its class fixtures.
    ///
    /// The segment carries the owning class name, the `setUp`/`tearDown` of
    /// that same class (sibling tests are never included), the test body,
    /// and the file's top-level import statements. When the owning class
    /// inherits and defines no `setUp` of its own, same-file classes named
    /// like a base are scanned for one -- a single-file heuristic, not an
    /// inheritance resolver.
    pub fn extract_test_code(&self, file_path: &Path, test_name: &str) -> CodeSegment {
        let Some((source, suite)) = read_and_parse(file_path) else {
            return CodeSegment::empty(file_path);
        };

        let mut segment = CodeSegment::empty(file_path);
        segment.imports = top_level_import_statements(&suite, &source);

        let Some(parts) = find_test_class(&suite, test_name) else {
            return segment;
        };

        let setup = parts.setup.or_else(|| {
            parts
                .bases
                .iter()
                .find_map(|base| find_setup_in_class(&suite, base))
        });

        segment.class_name = Some(parts.class_name);
        segment.setup_code = setup.map(|range| line_snippet(&source, range));
        segment.teardown_code = parts.teardown.map(|range| line_snippet(&source, range));
        segment.test_code = Some(line_snippet(&source, parts.test));
        segment
    }
}

fn read_and_parse(file_path: &Path) -> Option<(String, ast::Suite)> {
    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(err) => {
            warn!(file = %file_path.display(), error = %err, "failed to read file");
            return None;
        }
    };
    let suite = parse_python(&source, file_path)?;
    Some((source, suite))
}

// ============================================================================
// Test-class scanning
// ============================================================================

struct TestParts {
    class_name: String,
    bases: Vec<String>,
    setup: Option<TextRange>,
    teardown: Option<TextRange>,
    test: TextRange,
}

/// Find the class whose immediate members contain `test_name`, scanning its
/// members for fixtures in the same pass.
fn find_test_class(stmts: &[ast::Stmt], test_name: &str) -> Option<TestParts> {
    for stmt in stmts {
        let ast::Stmt::ClassDef(class_def) = stmt else {
            continue;
        };

        let mut setup = None;
        let mut teardown = None;
        let mut test = None;
        for member in &class_def.body {
            let Some(def) = FuncDef::from_stmt(member) else {
                continue;
            };
            if def.name() == test_name {
                test = Some(def.full_range());
            } else if def.name() == "setUp" {
                setup = Some(def.full_range());
            } else if def.name() == "tearDown" {
                teardown = Some(def.full_range());
            }
        }

        if let Some(test) = test {
            return Some(TestParts {
                class_name: class_def.name.as_str().to_string(),
                bases: base_class_names(class_def),
                setup,
                teardown,
                test,
            });
        }

        // Nested test classes.
        if let Some(parts) = find_test_class(&class_def.body, test_name) {
            return Some(parts);
        }
    }
    None
}

/// `setUp` member of a class named `class_name`, anywhere in the module.
fn find_setup_in_class(stmts: &[ast::Stmt], class_name: &str) -> Option<TextRange> {
    for stmt in stmts {
        let ast::Stmt::ClassDef(class_def) = stmt else {
            continue;
        };
        if class_def.name.as_str() == class_name {
            for member in &class_def.body {
                if let Some(def) = FuncDef::from_stmt(member) {
                    if def.name() == "setUp" {
                        return Some(def.full_range());
                    }
                }
            }
        }
        if let Some(range) = find_setup_in_class(&class_def.body, class_name) {
            return Some(range);
        }
    }
    None
}

/// Base-class names of a class definition: bare names directly, the final
/// attribute of a dotted base (`unittest.TestCase` -> `TestCase`).
fn base_class_names(class_def: &ast::StmtClassDef) -> Vec<String> {
    class_def
        .bases
        .iter()
        .filter_map(|base| match base {
            ast::Expr::Name(name) => Some(name.id.as_str().to_string()),
            ast::Expr::Attribute(attr) => Some(attr.attr.as_str().to_string()),
            _ => None,
        })
        .collect()
}

/// 1-based line span of a range within `source`.
pub(crate) fn line_span(source: &str, range: TextRange) -> (usize, usize) {
    (
        line_number(source, usize::from(range.start())),
        line_number(source, usize::from(range.end())),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const TEST_FILE: &str = r#"import os
import unittest

from helpers import make_widget


class TestWidget(unittest.TestCase):
    def setUp(self):
        self.widget = make_widget()

    def tearDown(self):
        self.widget.close()

    def test_ok(self):
        self.assertTrue(self.widget.ok())

    def test_fail(self):
        self.assertEqual(self.widget.size(), 3)


class TestOther(unittest.TestCase):
    def setUp(self):
        self.other = object()

    def test_other(self):
        self.assertIsNone(None)
"#;

    #[test]
    fn extract_test_includes_fixture_and_excludes_siblings() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "test_widget.py", TEST_FILE);

        let segment = CodeExtractor::new().extract_test_code(&path, "test_fail");

        assert_eq!(segment.class_name.as_deref(), Some("TestWidget"));
        let test = segment.test_code.unwrap();
        assert!(test.contains("test_fail"));
        assert!(!test.contains("test_ok"));
        let setup = segment.setup_code.unwrap();
        assert!(setup.contains("make_widget()"));
        assert!(segment.teardown_code.unwrap().contains("close()"));
    }

    #[test]
    fn extract_test_takes_fixtures_from_owning_class_only() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "test_widget.py", TEST_FILE);

        let segment = CodeExtractor::new().extract_test_code(&path, "test_other");

        assert_eq!(segment.class_name.as_deref(), Some("TestOther"));
        assert!(segment.setup_code.unwrap().contains("object()"));
        assert!(segment.teardown_code.is_none());
    }

    #[test]
    fn extract_test_collects_top_level_imports() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "test_widget.py", TEST_FILE);

        let segment = CodeExtractor::new().extract_test_code(&path, "test_fail");

        assert_eq!(
            segment.imports,
            vec![
                "import os".to_string(),
                "import unittest".to_string(),
                "from helpers import make_widget".to_string(),
            ]
        );
    }

    #[test]
    fn extract_test_falls_back_to_parent_class_setup() {
        let source = r#"class Base:
    def setUp(self):
        self.shared = 1


class TestChild(Base):
    def test_child(self):
        self.assertEqual(self.shared, 1)
"#;
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "test_child.py", source);

        let segment = CodeExtractor::new().extract_test_code(&path, "test_child");

        assert_eq!(segment.class_name.as_deref(), Some("TestChild"));
        assert!(segment.setup_code.unwrap().contains("self.shared = 1"));
    }

    #[test]
    fn extract_test_missing_name_yields_empty_text() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "test_widget.py", TEST_FILE);

        let segment = CodeExtractor::new().extract_test_code(&path, "test_absent");
        assert!(segment.is_empty());
        assert!(!segment.imports.is_empty());
    }

    #[test]
    fn extract_source_matches_free_function() {
        let source = "def helper(x):\n    return x + 1\n\nclass C:\n    def helper(self):\n        return 0\n";
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "mod.py", source);

        let segment = CodeExtractor::new().extract_source_code(&path, "helper", None);

        assert!(segment.class_name.is_none());
        assert!(segment.source_code.unwrap().contains("return x + 1"));
    }

    #[test]
    fn extract_source_matches_method_by_owner() {
        let source = "def helper(x):\n    return x + 1\n\nclass C:\n    def helper(self):\n        return 0\n";
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "mod.py", source);

        let segment = CodeExtractor::new().extract_source_code(&path, "helper", Some("C"));

        assert_eq!(segment.class_name.as_deref(), Some("C"));
        assert!(segment.source_code.unwrap().contains("return 0"));
    }

    #[test]
    fn extract_source_includes_decorators() {
        let source = "@functools.cache\ndef slow(n):\n    return n\n";
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "mod.py", source);

        let segment = CodeExtractor::new().extract_source_code(&path, "slow", None);
        assert!(segment.source_code.unwrap().starts_with("@functools.cache"));
    }

    #[test]
    fn first_match_wins_in_pre_order() {
        // Two free functions named target: the one earlier in the file wins.
        let source = "def target():\n    return 'first'\n\ndef wrapper():\n    def target():\n        return 'nested'\n";
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "mod.py", source);

        let segment = CodeExtractor::new().extract_source_code(&path, "target", None);
        assert!(segment.source_code.unwrap().contains("'first'"));
    }

    #[test]
    fn conditional_definitions_are_found() {
        let source = "import sys\nif sys.platform == 'linux':\n    def plat():\n        return 'linux'\n";
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "mod.py", source);

        let segment = CodeExtractor::new().extract_source_code(&path, "plat", None);
        assert!(segment.source_code.unwrap().contains("'linux'"));
    }

    #[test]
    fn unreadable_file_yields_empty_segment() {
        let segment =
            CodeExtractor::new().extract_source_code(Path::new("/nonexistent/mod.py"), "f", None);
        assert!(segment.is_empty());
        assert!(segment.imports.is_empty());
    }

    #[test]
    fn unparseable_file_yields_empty_segment() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "broken.py", "def broken(:\n");

        let segment = CodeExtractor::new().extract_test_code(&path, "test_x");
        assert!(segment.is_empty());
    }
}
