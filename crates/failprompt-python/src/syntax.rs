//! Parsing and source-span helpers.
//!
//! Thin layer over `rustpython-parser`: a soft-failing parse entry point and
//! the byte-range arithmetic needed to recover verbatim, whole-line snippets
//! from a file.

use std::path::Path;

use rustpython_parser::ast::{self, Ranged};
use rustpython_parser::text_size::TextRange;
use rustpython_parser::Parse;
use tracing::warn;

/// Parse a Python module, logging and swallowing syntax errors.
///
/// A file that fails to parse contributes nothing to the analysis; partial
/// context is still useful downstream, so this never propagates an error.
pub fn parse_python(source: &str, file: &Path) -> Option<ast::Suite> {
    match ast::Suite::parse(source, &file.display().to_string()) {
        Ok(suite) => Some(suite),
        Err(err) => {
            warn!(file = %file.display(), error = %err, "failed to parse file");
            None
        }
    }
}

/// 1-based line number of a byte offset.
pub fn line_number(source: &str, offset: usize) -> usize {
    let offset = offset.min(source.len());
    source.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Extract the snippet covering `range`, widened to whole lines.
///
/// Mirrors line-based extraction: the span grows left to the start of its
/// first line and right to the end of its last line, with trailing newlines
/// stripped.
pub fn line_snippet(source: &str, range: TextRange) -> String {
    let start = usize::from(range.start()).min(source.len());
    let end = usize::from(range.end()).min(source.len());
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[end..].find('\n').map_or(source.len(), |i| end + i);
    source[line_start..line_end].trim_end_matches('\n').to_string()
}

// ============================================================================
// FuncDef
// ============================================================================

/// A unified view over sync and async function definitions.
#[derive(Debug, Clone, Copy)]
pub enum FuncDef<'a> {
    Sync(&'a ast::StmtFunctionDef),
    Async(&'a ast::StmtAsyncFunctionDef),
}

impl<'a> FuncDef<'a> {
    /// View a statement as a function definition, if it is one.
    pub fn from_stmt(stmt: &'a ast::Stmt) -> Option<Self> {
        match stmt {
            ast::Stmt::FunctionDef(def) => Some(FuncDef::Sync(def)),
            ast::Stmt::AsyncFunctionDef(def) => Some(FuncDef::Async(def)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            FuncDef::Sync(def) => def.name.as_str(),
            FuncDef::Async(def) => def.name.as_str(),
        }
    }

    pub fn body(&self) -> &'a [ast::Stmt] {
        match self {
            FuncDef::Sync(def) => &def.body,
            FuncDef::Async(def) => &def.body,
        }
    }

    pub fn decorator_list(&self) -> &'a [ast::Expr] {
        match self {
            FuncDef::Sync(def) => &def.decorator_list,
            FuncDef::Async(def) => &def.decorator_list,
        }
    }

    /// Range of the `def` itself, decorators excluded.
    pub fn range(&self) -> TextRange {
        match self {
            FuncDef::Sync(def) => def.range(),
            FuncDef::Async(def) => def.range(),
        }
    }

    /// Range of the definition including any attached decorators.
    pub fn full_range(&self) -> TextRange {
        self.decorator_list()
            .iter()
            .fold(self.range(), |range, dec| range.cover(dec.range()))
    }
}

// ============================================================================
// Tree walking
// ============================================================================

/// Walk statements in pre-order, invoking `on_stmt` for every statement and
/// `on_expr` for every expression (each before its children are visited).
///
/// Covers every statement and expression position that can contain a call;
/// match patterns and lambda parameter defaults are not descended into.
pub(crate) fn walk_stmts<S, E>(stmts: &[ast::Stmt], on_stmt: &mut S, on_expr: &mut E)
where
    S: FnMut(&ast::Stmt),
    E: FnMut(&ast::Expr),
{
    for stmt in stmts {
        on_stmt(stmt);
        match stmt {
            ast::Stmt::FunctionDef(def) => {
                walk_exprs(&def.decorator_list, on_expr);
                walk_stmts(&def.body, on_stmt, on_expr);
            }
            ast::Stmt::AsyncFunctionDef(def) => {
                walk_exprs(&def.decorator_list, on_expr);
                walk_stmts(&def.body, on_stmt, on_expr);
            }
            ast::Stmt::ClassDef(def) => {
                walk_exprs(&def.decorator_list, on_expr);
                walk_exprs(&def.bases, on_expr);
                for keyword in &def.keywords {
                    walk_expr(&keyword.value, on_expr);
                }
                walk_stmts(&def.body, on_stmt, on_expr);
            }
            ast::Stmt::Return(s) => {
                if let Some(value) = &s.value {
                    walk_expr(value, on_expr);
                }
            }
            ast::Stmt::Delete(s) => walk_exprs(&s.targets, on_expr),
            ast::Stmt::Assign(s) => {
                walk_exprs(&s.targets, on_expr);
                walk_expr(&s.value, on_expr);
            }
            ast::Stmt::AugAssign(s) => {
                walk_expr(&s.target, on_expr);
                walk_expr(&s.value, on_expr);
            }
            ast::Stmt::AnnAssign(s) => {
                walk_expr(&s.target, on_expr);
                walk_expr(&s.annotation, on_expr);
                if let Some(value) = &s.value {
                    walk_expr(value, on_expr);
                }
            }
            ast::Stmt::For(s) => {
                walk_expr(&s.target, on_expr);
                walk_expr(&s.iter, on_expr);
                walk_stmts(&s.body, on_stmt, on_expr);
                walk_stmts(&s.orelse, on_stmt, on_expr);
            }
            ast::Stmt::AsyncFor(s) => {
                walk_expr(&s.target, on_expr);
                walk_expr(&s.iter, on_expr);
                walk_stmts(&s.body, on_stmt, on_expr);
                walk_stmts(&s.orelse, on_stmt, on_expr);
            }
            ast::Stmt::While(s) => {
                walk_expr(&s.test, on_expr);
                walk_stmts(&s.body, on_stmt, on_expr);
                walk_stmts(&s.orelse, on_stmt, on_expr);
            }
            ast::Stmt::If(s) => {
                walk_expr(&s.test, on_expr);
                walk_stmts(&s.body, on_stmt, on_expr);
                walk_stmts(&s.orelse, on_stmt, on_expr);
            }
            ast::Stmt::With(s) => {
                for item in &s.items {
                    walk_expr(&item.context_expr, on_expr);
                    if let Some(vars) = &item.optional_vars {
                        walk_expr(vars, on_expr);
                    }
                }
                walk_stmts(&s.body, on_stmt, on_expr);
            }
            ast::Stmt::AsyncWith(s) => {
                for item in &s.items {
                    walk_expr(&item.context_expr, on_expr);
                    if let Some(vars) = &item.optional_vars {
                        walk_expr(vars, on_expr);
                    }
                }
                walk_stmts(&s.body, on_stmt, on_expr);
            }
            ast::Stmt::Match(s) => {
                walk_expr(&s.subject, on_expr);
                for case in &s.cases {
                    if let Some(guard) = &case.guard {
                        walk_expr(guard, on_expr);
                    }
                    walk_stmts(&case.body, on_stmt, on_expr);
                }
            }
            ast::Stmt::Raise(s) => {
                if let Some(exc) = &s.exc {
                    walk_expr(exc, on_expr);
                }
                if let Some(cause) = &s.cause {
                    walk_expr(cause, on_expr);
                }
            }
            ast::Stmt::Try(s) => {
                walk_stmts(&s.body, on_stmt, on_expr);
                for handler in &s.handlers {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    if let Some(type_) = &handler.type_ {
                        walk_expr(type_, on_expr);
                    }
                    walk_stmts(&handler.body, on_stmt, on_expr);
                }
                walk_stmts(&s.orelse, on_stmt, on_expr);
                walk_stmts(&s.finalbody, on_stmt, on_expr);
            }
            ast::Stmt::TryStar(s) => {
                walk_stmts(&s.body, on_stmt, on_expr);
                for handler in &s.handlers {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    if let Some(type_) = &handler.type_ {
                        walk_expr(type_, on_expr);
                    }
                    walk_stmts(&handler.body, on_stmt, on_expr);
                }
                walk_stmts(&s.orelse, on_stmt, on_expr);
                walk_stmts(&s.finalbody, on_stmt, on_expr);
            }
            ast::Stmt::Assert(s) => {
                walk_expr(&s.test, on_expr);
                if let Some(msg) = &s.msg {
                    walk_expr(msg, on_expr);
                }
            }
            ast::Stmt::Expr(s) => walk_expr(&s.value, on_expr),
            ast::Stmt::TypeAlias(s) => walk_expr(&s.value, on_expr),
            ast::Stmt::Import(_)
            | ast::Stmt::ImportFrom(_)
            | ast::Stmt::Global(_)
            | ast::Stmt::Nonlocal(_)
            | ast::Stmt::Pass(_)
            | ast::Stmt::Break(_)
            | ast::Stmt::Continue(_) => {}
        }
    }
}

fn walk_exprs<E: FnMut(&ast::Expr)>(exprs: &[ast::Expr], on_expr: &mut E) {
    for expr in exprs {
        walk_expr(expr, on_expr);
    }
}

pub(crate) fn walk_expr<E: FnMut(&ast::Expr)>(expr: &ast::Expr, on_expr: &mut E) {
    on_expr(expr);
    match expr {
        ast::Expr::BoolOp(e) => walk_exprs(&e.values, on_expr),
        ast::Expr::NamedExpr(e) => {
            walk_expr(&e.target, on_expr);
            walk_expr(&e.value, on_expr);
        }
        ast::Expr::BinOp(e) => {
            walk_expr(&e.left, on_expr);
            walk_expr(&e.right, on_expr);
        }
        ast::Expr::UnaryOp(e) => walk_expr(&e.operand, on_expr),
        ast::Expr::Lambda(e) => walk_expr(&e.body, on_expr),
        ast::Expr::IfExp(e) => {
            walk_expr(&e.test, on_expr);
            walk_expr(&e.body, on_expr);
            walk_expr(&e.orelse, on_expr);
        }
        ast::Expr::Dict(e) => {
            for key in e.keys.iter().flatten() {
                walk_expr(key, on_expr);
            }
            walk_exprs(&e.values, on_expr);
        }
        ast::Expr::Set(e) => walk_exprs(&e.elts, on_expr),
        ast::Expr::ListComp(e) => {
            walk_expr(&e.elt, on_expr);
            walk_comprehensions(&e.generators, on_expr);
        }
        ast::Expr::SetComp(e) => {
            walk_expr(&e.elt, on_expr);
            walk_comprehensions(&e.generators, on_expr);
        }
        ast::Expr::DictComp(e) => {
            walk_expr(&e.key, on_expr);
            walk_expr(&e.value, on_expr);
            walk_comprehensions(&e.generators, on_expr);
        }
        ast::Expr::GeneratorExp(e) => {
            walk_expr(&e.elt, on_expr);
            walk_comprehensions(&e.generators, on_expr);
        }
        ast::Expr::Await(e) => walk_expr(&e.value, on_expr),
        ast::Expr::Yield(e) => {
            if let Some(value) = &e.value {
                walk_expr(value, on_expr);
            }
        }
        ast::Expr::YieldFrom(e) => walk_expr(&e.value, on_expr),
        ast::Expr::Compare(e) => {
            walk_expr(&e.left, on_expr);
            walk_exprs(&e.comparators, on_expr);
        }
        ast::Expr::Call(e) => {
            walk_expr(&e.func, on_expr);
            walk_exprs(&e.args, on_expr);
            for keyword in &e.keywords {
                walk_expr(&keyword.value, on_expr);
            }
        }
        ast::Expr::FormattedValue(e) => {
            walk_expr(&e.value, on_expr);
            if let Some(spec) = &e.format_spec {
                walk_expr(spec, on_expr);
            }
        }
        ast::Expr::JoinedStr(e) => walk_exprs(&e.values, on_expr),
        ast::Expr::Attribute(e) => walk_expr(&e.value, on_expr),
        ast::Expr::Subscript(e) => {
            walk_expr(&e.value, on_expr);
            walk_expr(&e.slice, on_expr);
        }
        ast::Expr::Starred(e) => walk_expr(&e.value, on_expr),
        ast::Expr::List(e) => walk_exprs(&e.elts, on_expr),
        ast::Expr::Tuple(e) => walk_exprs(&e.elts, on_expr),
        ast::Expr::Slice(e) => {
            if let Some(lower) = &e.lower {
                walk_expr(lower, on_expr);
            }
            if let Some(upper) = &e.upper {
                walk_expr(upper, on_expr);
            }
            if let Some(step) = &e.step {
                walk_expr(step, on_expr);
            }
        }
        ast::Expr::Constant(_) | ast::Expr::Name(_) => {}
    }
}

fn walk_comprehensions<E: FnMut(&ast::Expr)>(generators: &[ast::Comprehension], on_expr: &mut E) {
    for comp in generators {
        walk_expr(&comp.target, on_expr);
        walk_expr(&comp.iter, on_expr);
        walk_exprs(&comp.ifs, on_expr);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> ast::Suite {
        parse_python(source, &PathBuf::from("test.py")).expect("test source parses")
    }

    #[test]
    fn parse_error_yields_none() {
        assert!(parse_python("def broken(:\n", &PathBuf::from("bad.py")).is_none());
    }

    #[test]
    fn line_numbers_are_one_based() {
        let source = "a = 1\nb = 2\nc = 3\n";
        assert_eq!(line_number(source, 0), 1);
        assert_eq!(line_number(source, 6), 2);
        assert_eq!(line_number(source, source.len()), 4);
    }

    #[test]
    fn snippet_expands_to_whole_lines() {
        let source = "x = 1\ndef f():\n    return 2\ny = 3\n";
        let suite = parse(source);
        let def = FuncDef::from_stmt(&suite[1]).unwrap();
        let snippet = line_snippet(source, def.range());
        assert_eq!(snippet, "def f():\n    return 2");
    }

    #[test]
    fn full_range_includes_decorators() {
        let source = "@wrap\n@other\ndef f():\n    pass\n";
        let suite = parse(source);
        let def = FuncDef::from_stmt(&suite[0]).unwrap();
        let snippet = line_snippet(source, def.full_range());
        assert!(snippet.starts_with("@wrap"));
        assert!(snippet.contains("@other"));
        assert!(snippet.contains("def f():"));
    }

    #[test]
    fn walker_reaches_calls_in_nested_positions() {
        let source = r#"
def f(x):
    if x:
        y = [g(i) for i in items()]
    try:
        with open("p") as fh:
            h(fh)
    except ValueError:
        recover()
    return {k(): v for v in gen()}
"#;
        let suite = parse(source);
        let mut calls = Vec::new();
        walk_stmts(&suite, &mut |_| {}, &mut |expr| {
            if let ast::Expr::Call(call) = expr {
                if let ast::Expr::Name(name) = &*call.func {
                    calls.push(name.id.as_str().to_string());
                }
            }
        });
        for expected in ["g", "items", "open", "h", "recover", "k", "gen"] {
            assert!(calls.iter().any(|c| c == expected), "missing call {expected}");
        }
    }

    #[test]
    fn type_alias_values_are_walked() {
        let source = "type Rows = list[make_row()]\n";
        let suite = parse(source);
        let mut calls = Vec::new();
        walk_stmts(&suite, &mut |_| {}, &mut |expr| {
            if let ast::Expr::Call(call) = expr {
                if let ast::Expr::Name(name) = &*call.func {
                    calls.push(name.id.as_str().to_string());
                }
            }
        });
        assert_eq!(calls, ["make_row"]);
    }

    #[test]
    fn async_defs_are_recognized() {
        let source = "async def g():\n    pass\n";
        let suite = parse(source);
        let def = FuncDef::from_stmt(&suite[0]).unwrap();
        assert_eq!(def.name(), "g");
    }
}
