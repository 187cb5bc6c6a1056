//! Project module indexing.
//!
//! Maps every Python file under a project root to the dotted module path it
//! would be imported as, and resolves absolute and relative module
//! references back to concrete file paths.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Lookup table from dotted module path to file path.
///
/// Built once per analysis run by scanning the project root; read-only
/// afterwards and safe to share. `pkg/__init__.py` is retained as its own
/// `pkg.__init__` entry so package-level relative imports still resolve.
///
/// Two files can map to the same dotted path (`a.b.py` and `a/b.py` both
/// yield `a.b`); entries are inserted in sorted relative-path order and the
/// first insertion wins, so the lexicographically-first path is the stable
/// tie-break.
#[derive(Debug, Clone)]
pub struct ModuleIndex {
    project_root: PathBuf,
    modules: BTreeMap<String, PathBuf>,
}

impl ModuleIndex {
    /// Scan `project_root` recursively and build the module map.
    ///
    /// Hidden directories and the usual non-source trees (`__pycache__`,
    /// `venv`, `node_modules`) are skipped. An empty tree yields an empty
    /// map, not an error.
    pub fn build(project_root: &Path) -> Self {
        let project_root = fs::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());

        let mut entries: Vec<(String, String, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&project_root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "py") {
                continue;
            }
            let rel_path = match path.strip_prefix(&project_root) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if rel_path
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            {
                continue;
            }
            if rel_path.components().any(|c| {
                let name = c.as_os_str().to_string_lossy();
                name == "__pycache__" || name == "node_modules" || name == "venv"
            }) {
                continue;
            }

            let module_path = dotted_module_path(rel_path);
            let sort_key = rel_path.to_string_lossy().into_owned();
            entries.push((sort_key, module_path, path.to_path_buf()));
        }

        // Sort by the relative path as a string, not component-wise, so the
        // lexicographically-first path wins a dotted-name collision
        // regardless of filesystem order (`a.b.py` beats `a/b.py`).
        entries.sort_by(|(key_a, _, _), (key_b, _, _)| key_a.cmp(key_b));

        let mut modules = BTreeMap::new();
        for (_, module_path, file_path) in entries {
            modules.entry(module_path).or_insert(file_path);
        }

        debug!(root = %project_root.display(), modules = modules.len(), "module index built");
        ModuleIndex {
            project_root,
            modules,
        }
    }

    /// Number of indexed modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True when no module was indexed.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Direct lookup of a dotted module path.
    pub fn get(&self, module_path: &str) -> Option<&Path> {
        self.modules.get(module_path).map(PathBuf::as_path)
    }

    /// Resolve a module reference appearing in `base_file` to a file path.
    ///
    /// `level` is the number of leading dots of a relative import (0 for an
    /// absolute one); level 1 refers to `base_file`'s containing package.
    /// Returns `None` for anything the index cannot account for -- third
    /// party modules, typos, dynamic constructs. That absence is a normal
    /// outcome, not an error.
    pub fn resolve(&self, base_file: &Path, module_ref: &str, level: u32) -> Option<PathBuf> {
        let base_file = fs::canonicalize(base_file).unwrap_or_else(|_| base_file.to_path_buf());

        if level == 0 {
            if let Some(path) = self.modules.get(module_ref) {
                return Some(path.clone());
            }
            // Package-implicit import: a file inside pkg/ saying `import sibling`.
            let prefix = self.dotted_prefix(base_file.parent()?)?;
            return self.modules.get(&join_dotted(&prefix, module_ref)).cloned();
        }

        // Relative import: level 1 is the containing package, each further
        // level climbs one directory.
        let mut dir = base_file.parent()?.to_path_buf();
        for _ in 1..level {
            dir = dir.parent()?.to_path_buf();
        }
        let prefix = self.dotted_prefix(&dir)?;

        if module_ref.is_empty() {
            // `from . import name` -- resolve to the package boundary file.
            return self.modules.get(&join_dotted(&prefix, "__init__")).cloned();
        }

        self.modules
            .get(&join_dotted(&prefix, module_ref))
            .cloned()
            .or_else(|| self.modules.get(module_ref).cloned())
    }

    /// Dotted prefix of a directory relative to the project root ("" for the
    /// root itself), or `None` when the directory lies outside the project.
    fn dotted_prefix(&self, dir: &Path) -> Option<String> {
        let rel = dir.strip_prefix(&self.project_root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("."))
    }
}

/// `dir/sub/mod.py` -> `dir.sub.mod`.
fn dotted_module_path(rel_path: &Path) -> String {
    let stripped = rel_path.with_extension("");
    let parts: Vec<String> = stripped
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join(".")
}

fn join_dotted(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        suffix.to_string()
    } else {
        format!("{prefix}.{suffix}")
    }
}

// ============================================================================
// Tests
// ============================================================================
