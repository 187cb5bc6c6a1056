//! Import resolution and used-import filtering.
//!
//! [`build_import_map`] turns a file's top-level import statements into a
//! table from locally bound names to resolved project files, delegating
//! module lookup to [`ModuleIndex`]. [`filter_used_imports`] selects the
//! subset of import statements a code fragment actually references.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rustpython_parser::ast::{self, Ranged};
use rustpython_parser::Parse;
use tracing::debug;

use crate::index::ModuleIndex;
use crate::syntax::{line_snippet, walk_stmts};

// ============================================================================
// Import map
// ============================================================================

/// Where a locally bound name was imported from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// The project file the name resolves to.
    pub file_path: PathBuf,
    /// For `from m import N`, the name as defined in the target file. A
    /// method call on the binding then looks up its owner there. Plain
    /// `import m` binds a module, so calls through it are free functions
    /// and this stays none.
    pub class_name: Option<String>,
}

/// Per-file table: locally usable name -> origin of that name.
pub type ImportMap = HashMap<String, ImportBinding>;

/// Build the import map for a parsed file.
///
/// Only top-level statements are inspected. `import m [as a]` binds the
/// alias (or the module name as written) to `m`'s resolved file. `from m
/// import n [as a]` resolves `m` once -- honoring its relative level -- and
/// binds both the local alias and the qualified `m.n` form, so attribute
/// style references resolve too. Modules the index cannot resolve are
/// omitted; a later lookup miss then falls back to "same file" at the
/// tracker.
pub fn build_import_map(suite: &[ast::Stmt], file: &Path, index: &ModuleIndex) -> ImportMap {
    let mut map = ImportMap::new();

    for stmt in suite {
        match stmt {
            ast::Stmt::Import(import) => {
                for alias in &import.names {
                    let module = alias.name.as_str();
                    let Some(resolved) = index.resolve(file, module, 0) else {
                        continue;
                    };
                    let bound = alias
                        .asname
                        .as_ref()
                        .map_or(module, ast::Identifier::as_str);
                    map.insert(
                        bound.to_string(),
                        ImportBinding {
                            file_path: resolved,
                            class_name: None,
                        },
                    );
                }
            }
            ast::Stmt::ImportFrom(import_from) => {
                let module = import_from
                    .module
                    .as_ref()
                    .map_or("", ast::Identifier::as_str);
                let level = import_from.level.as_ref().map_or(0, ast::Int::to_u32);
                let Some(resolved) = index.resolve(file, module, level) else {
                    continue;
                };
                for alias in &import_from.names {
                    let name = alias.name.as_str();
                    let bound = alias.asname.as_ref().map_or(name, ast::Identifier::as_str);
                    let binding = ImportBinding {
                        file_path: resolved.clone(),
                        class_name: Some(name.to_string()),
                    };
                    if !module.is_empty() {
                        map.insert(format!("{module}.{name}"), binding.clone());
                    }
                    map.insert(bound.to_string(), binding);
                }
            }
            _ => {}
        }
    }

    map
}

/// Verbatim text of a file's top-level import statements, in file order.
pub fn top_level_import_statements(suite: &[ast::Stmt], source: &str) -> Vec<String> {
    suite
        .iter()
        .filter(|stmt| {
            matches!(stmt, ast::Stmt::Import(_) | ast::Stmt::ImportFrom(_))
        })
        .map(|stmt| line_snippet(source, stmt.range()))
        .collect()
}

// ============================================================================
// Used-import filtering
// ============================================================================

/// Return the candidates whose bound names the fragment references.
///
/// A candidate counts as used when any name it binds appears in the fragment
/// as a loaded identifier or as the root (or a prefix) of a dotted attribute
/// chain. When the fragment cannot be parsed, every candidate is kept:
/// over-inclusion beats silently dropping an import the fragment needs.
pub fn filter_used_imports(candidates: &[String], fragment: &str) -> Vec<String> {
    let suite = match ast::Suite::parse(fragment, "<fragment>") {
        Ok(suite) => suite,
        Err(err) => {
            debug!(error = %err, "fragment did not parse; keeping all imports");
            return candidates.to_vec();
        }
    };

    let used = collect_used_names(&suite);

    candidates
        .iter()
        .filter(|candidate| {
            let bound = bound_names(candidate);
            // An unparseable candidate is kept, same rationale as above.
            bound.is_empty() || bound.iter().any(|name| used.contains(name))
        })
        .cloned()
        .collect()
}

/// Loaded identifiers plus every dotted prefix of attribute chains
/// (`os.path.join` contributes `os`, `os.path`, and `os.path.join`).
fn collect_used_names(suite: &[ast::Stmt]) -> HashSet<String> {
    let mut used = HashSet::new();
    walk_stmts(suite, &mut |_| {}, &mut |expr| match expr {
        ast::Expr::Name(name) => {
            if matches!(name.ctx, ast::ExprContext::Load) {
                used.insert(name.id.as_str().to_string());
            }
        }
        ast::Expr::Attribute(attr) => {
            if let Some(chain) = attribute_chain(attr) {
                let mut dotted = String::new();
                for part in &chain {
                    if !dotted.is_empty() {
                        dotted.push('.');
                    }
                    dotted.push_str(part);
                    used.insert(dotted.clone());
                }
            }
        }
        _ => {}
    });
    used
}

/// `a.b.c` as `["a", "b", "c"]` when rooted at a simple name.
fn attribute_chain(attr: &ast::ExprAttribute) -> Option<Vec<String>> {
    let mut reversed = vec![attr.attr.as_str().to_string()];
    let mut current = &*attr.value;
    loop {
        match current {
            ast::Expr::Attribute(inner) => {
                reversed.push(inner.attr.as_str().to_string());
                current = &inner.value;
            }
            ast::Expr::Name(name) => {
                reversed.push(name.id.as_str().to_string());
                reversed.reverse();
                return Some(reversed);
            }
            _ => return None,
        }
    }
}

/// Names an import statement makes usable in the importing file.
fn bound_names(statement: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let Ok(suite) = ast::Suite::parse(statement, "<import>") else {
        return names;
    };

    for stmt in &suite {
        match stmt {
            ast::Stmt::Import(import) => {
                for alias in &import.names {
                    match &alias.asname {
                        Some(asname) => {
                            names.insert(asname.as_str().to_string());
                        }
                        None => {
                            let full = alias.name.as_str();
                            names.insert(full.to_string());
                            // `import a.b` binds `a` in the namespace.
                            if let Some(root) = full.split('.').next() {
                                names.insert(root.to_string());
                            }
                        }
                    }
                }
            }
            ast::Stmt::ImportFrom(import_from) => {
                let module = import_from
                    .module
                    .as_ref()
                    .map_or("", ast::Identifier::as_str);
                for alias in &import_from.names {
                    let name = alias.name.as_str();
                    let bound = alias.asname.as_ref().map_or(name, ast::Identifier::as_str);
                    names.insert(bound.to_string());
                    if !module.is_empty() {
                        names.insert(format!("{module}.{name}"));
                    }
                }
            }
            _ => {}
        }
    }
    names
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_python;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn project_with(files: &[(&str, &str)]) -> (TempDir, ModuleIndex) {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let index = ModuleIndex::build(dir.path());
        (dir, index)
    }

    fn map_for(source: &str, file: &Path, index: &ModuleIndex) -> ImportMap {
        let suite = parse_python(source, file).unwrap();
        build_import_map(&suite, file, index)
    }

    #[test]
    fn plain_import_binds_module_name() {
        let (dir, index) = project_with(&[("utils.py", ""), ("main.py", "")]);
        let main = dir.path().join("main.py");

        let map = map_for("import utils\n", &main, &index);
        assert!(map["utils"].file_path.ends_with("utils.py"));
        assert_eq!(map["utils"].class_name, None);
    }

    #[test]
    fn aliased_import_binds_alias_only() {
        let (dir, index) = project_with(&[("utils.py", ""), ("main.py", "")]);
        let main = dir.path().join("main.py");

        let map = map_for("import utils as ut\n", &main, &index);
        assert!(map.contains_key("ut"));
        assert!(!map.contains_key("utils"));
    }

    #[test]
    fn from_import_binds_name_and_qualified_form() {
        let (dir, index) = project_with(&[("utils.py", ""), ("main.py", "")]);
        let main = dir.path().join("main.py");

        let map = map_for("from utils import helper\n", &main, &index);
        assert!(map["helper"].file_path.ends_with("utils.py"));
        assert_eq!(map["helper"].class_name.as_deref(), Some("helper"));
        assert!(map["utils.helper"].file_path.ends_with("utils.py"));
    }

    #[test]
    fn relative_from_import_resolves_within_package() {
        let (dir, index) = project_with(&[
            ("pkg/__init__.py", ""),
            ("pkg/local_module.py", ""),
            ("pkg/main.py", ""),
        ]);
        let main = dir.path().join("pkg/main.py");

        let map = map_for("from .local_module import local_func\n", &main, &index);
        assert!(map["local_func"].file_path.ends_with("local_module.py"));
    }

    #[test]
    fn unresolvable_modules_are_omitted() {
        let (dir, index) = project_with(&[("main.py", "")]);
        let main = dir.path().join("main.py");

        let map = map_for("import collections\nfrom typing import Optional\n", &main, &index);
        assert!(map.is_empty());
    }

    #[test]
    fn nested_imports_are_ignored() {
        let (dir, index) = project_with(&[("utils.py", ""), ("main.py", "")]);
        let main = dir.path().join("main.py");

        let map = map_for("def f():\n    import utils\n", &main, &index);
        assert!(map.is_empty());
    }

    #[test]
    fn top_level_statements_are_captured_verbatim() {
        let source = "import os\n\nfrom a import (\n    b,\n    c,\n)\n\ndef f():\n    import sys\n";
        let suite = parse_python(source, &PathBuf::from("m.py")).unwrap();
        let statements = top_level_import_statements(&suite, source);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "import os");
        assert!(statements[1].starts_with("from a import ("));
        assert!(statements[1].ends_with(")"));
    }

    #[test]
    fn filter_keeps_import_with_dotted_root_usage() {
        let kept = filter_used_imports(
            &strings(&["import sys", "import os"]),
            "os.path.join('a')",
        );
        assert_eq!(kept, strings(&["import os"]));
    }

    #[test]
    fn filter_keeps_from_import_by_bare_name() {
        let kept = filter_used_imports(
            &strings(&["from utils import helper", "from utils import unused"]),
            "result = helper(1)\n",
        );
        assert_eq!(kept, strings(&["from utils import helper"]));
    }

    #[test]
    fn filter_matches_alias_not_original_name() {
        let candidates = strings(&["import numpy as np"]);
        assert_eq!(
            filter_used_imports(&candidates, "np.zeros(3)\n"),
            candidates
        );
        assert!(filter_used_imports(&candidates, "numpy.zeros(3)\n").is_empty());
    }

    #[test]
    fn filter_keeps_everything_for_unparseable_fragment() {
        let candidates = strings(&["import os", "import sys"]);
        let kept = filter_used_imports(&candidates, "def broken(:\n");
        assert_eq!(kept, candidates);
    }

    #[test]
    fn filter_ignores_store_context_names() {
        // `os = 1` assigns the name; it does not use the import.
        let kept = filter_used_imports(&strings(&["import os"]), "os = 1\n");
        assert!(kept.is_empty());
    }
}
