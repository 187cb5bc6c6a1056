//! Transitive function dependency tracking.
//!
//! Starting from one function, [`DependencyTracker`] follows its calls
//! through the project: same-file definitions directly, cross-file ones
//! through each file's import map. The result is one [`FunctionRecord`] per
//! reached function, ordered so every dependency precedes its dependents
//! and the starting function comes last.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use rustpython_parser::ast;
use tracing::{debug, warn};

use crate::calls::collect_calls;
use crate::extract::{find_function, line_span};
use crate::imports::{build_import_map, ImportMap};
use crate::index::ModuleIndex;
use crate::syntax::{line_snippet, parse_python};
use crate::types::{CallTarget, FunctionRecord};

// ============================================================================
// Tracker
// ============================================================================

pub struct DependencyTracker {
    index: ModuleIndex,
}

/// Parsed file kept for the duration of one traversal.
struct FileData {
    source: String,
    suite: ast::Suite,
}

/// One function to visit: file, name, owner class if any.
type WorkItem = (PathBuf, String, Option<String>);

impl DependencyTracker {
    /// Index `project_root` and prepare to track within it.
    pub fn new(project_root: &Path) -> Self {
        DependencyTracker {
            index: ModuleIndex::build(project_root),
        }
    }

    pub fn index(&self) -> &ModuleIndex {
        &self.index
    }

    /// Collect every function reachable from `function` by following calls.
    ///
    /// Traversal is breadth-first with a visited set keyed on (file, name,
    /// owner), so cycles terminate and shared dependencies appear once. A
    /// call that cannot be located anywhere yields a stub record, keeping
    /// the unresolved name visible downstream. The returned order puts the
    /// starting function last, dependencies before their dependents.
    pub fn track_dependencies(
        &self,
        file: &Path,
        function: &str,
        class_name: Option<&str>,
    ) -> Vec<FunctionRecord> {
        let seed_file = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());

        let mut files: HashMap<PathBuf, Option<FileData>> = HashMap::new();
        let mut import_maps: HashMap<PathBuf, ImportMap> = HashMap::new();
        let mut visited: HashSet<WorkItem> = HashSet::new();
        let mut queue: VecDeque<WorkItem> = VecDeque::new();
        let mut records: Vec<FunctionRecord> = Vec::new();

        let seed: WorkItem = (
            seed_file,
            function.to_string(),
            class_name.map(str::to_string),
        );
        visited.insert(seed.clone());
        queue.push_back(seed);

        while let Some((path, name, owner)) = queue.pop_front() {
            if !files.contains_key(&path) {
                files.insert(path.clone(), load_file(&path));
            }
            let Some(data) = files.get(&path).and_then(Option::as_ref) else {
                records.push(FunctionRecord::stub(&name, &path, owner));
                continue;
            };

            let Some(found) = find_function(&data.suite, &name, owner.as_deref()) else {
                debug!(function = %name, file = %path.display(), "function not found; recording stub");
                records.push(FunctionRecord::stub(&name, &path, owner));
                continue;
            };

            if !import_maps.contains_key(&path) {
                let map = build_import_map(&data.suite, &path, &self.index);
                import_maps.insert(path.clone(), map);
            }
            let imports = &import_maps[&path];

            let record_class = found.class_name.map(str::to_string);
            let range = found.def.full_range();
            let (start_line, end_line) = line_span(&data.source, range);

            let mut dependencies = Vec::new();
            for call in collect_calls(&found.def) {
                // A `self` receiver means the method's own class.
                let call = match call.owner.as_deref() {
                    Some("self") => CallTarget::new(&call.name, record_class.clone()),
                    _ => call,
                };
                let next = self.resolve_call(&call, &path, imports);
                if visited.insert(next.clone()) {
                    queue.push_back(next);
                }
                dependencies.push(call);
            }

            records.push(FunctionRecord {
                name: name.clone(),
                file_path: path.clone(),
                class_name: record_class,
                source_code: Some(line_snippet(&data.source, range)),
                start_line,
                end_line,
                dependencies,
            });
        }

        // Dependencies were appended after their callers; flipping the list
        // puts them first and the starting function at the end.
        records.reverse();
        records
    }

    /// Decide where a call target should be looked up next.
    ///
    /// An owner bound by an import moves the search to the imported file,
    /// with the owner rewritten to the name as defined there. A bare name
    /// bound by an import is a free function in the imported file. Anything
    /// else stays in the current file, where a later lookup miss turns it
    /// into a stub.
    fn resolve_call(&self, call: &CallTarget, current: &Path, imports: &ImportMap) -> WorkItem {
        if let Some(owner) = &call.owner {
            if let Some(binding) = imports.get(owner) {
                return (
                    binding.file_path.clone(),
                    call.name.clone(),
                    binding.class_name.clone(),
                );
            }
        } else if let Some(binding) = imports.get(&call.name) {
            return (binding.file_path.clone(), call.name.clone(), None);
        }
        (current.to_path_buf(), call.name.clone(), call.owner.clone())
    }
}

fn load_file(path: &Path) -> Option<FileData> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed to read file");
            return None;
        }
    };
    let suite = parse_python(&source, path)?;
    Some(FileData { source, suite })
}

// ============================================================================
// Tests
// ============================================================================
