//! Call-site collection inside a single function definition.

use std::cell::RefCell;
use std::collections::HashMap;

use rustpython_parser::ast;

use crate::syntax::{walk_expr, walk_stmts, FuncDef};
use crate::types::CallTarget;

/// Collect the calls made by `def`, in first-occurrence order.
///
/// Plain calls (`helper()`) yield a bare target. Method calls on a simple
/// receiver (`obj.method()`) yield the method name with the receiver as the
/// owner hint, upgraded to the receiver's class when a prior `obj = Cls()`
/// assignment in the same body names it. Decorator expressions are walked
/// too, so `@checked` registers a call on `checked`. Duplicate targets are
/// reported once.
pub fn collect_calls(def: &FuncDef<'_>) -> Vec<CallTarget> {
    // Both walker callbacks touch this state and the traversal interleaves
    // them, hence the RefCell. Variable -> class tracks the latest
    // `var = Cls()` seen in pre-order, so straight-line code resolves
    // receivers accurately and the later binding wins across branches.
    struct State {
        targets: Vec<CallTarget>,
        constructed: HashMap<String, String>,
    }
    let state = RefCell::new(State {
        targets: Vec::new(),
        constructed: HashMap::new(),
    });

    let mut on_expr = |expr: &ast::Expr| {
        if let ast::Expr::Call(call) = expr {
            let mut state = state.borrow_mut();
            if let Some(target) = call_target(call, &state.constructed) {
                if !state.targets.contains(&target) {
                    state.targets.push(target);
                }
            }
        }
    };

    for decorator in def.decorator_list() {
        // `@name` applies `name` without parentheses; it still counts as a
        // call on it. Parenthesized decorators walk as ordinary expressions.
        if let ast::Expr::Name(name) = decorator {
            let mut state = state.borrow_mut();
            let target = CallTarget::new(name.id.as_str(), None);
            if !state.targets.contains(&target) {
                state.targets.push(target);
            }
        } else {
            walk_expr(decorator, &mut on_expr);
        }
    }

    let mut on_stmt = |stmt: &ast::Stmt| {
        if let ast::Stmt::Assign(assign) = stmt {
            record_construction(assign, &mut state.borrow_mut().constructed);
        }
    };
    walk_stmts(def.body(), &mut on_stmt, &mut on_expr);

    state.into_inner().targets
}

fn call_target(
    call: &ast::ExprCall,
    constructed: &HashMap<String, String>,
) -> Option<CallTarget> {
    match &*call.func {
        ast::Expr::Name(name) => Some(CallTarget::new(name.id.as_str(), None)),
        ast::Expr::Attribute(attr) => {
            let ast::Expr::Name(receiver) = &*attr.value else {
                // Chained receivers (`a.b.c()`) are not resolvable locally.
                return None;
            };
            let receiver_name = receiver.id.as_str();
            let owner = constructed
                .get(receiver_name)
                .cloned()
                .unwrap_or_else(|| receiver_name.to_string());
            Some(CallTarget::new(attr.attr.as_str(), Some(owner)))
        }
        _ => None,
    }
}

/// Track `var = Cls()` so later `var.method()` calls resolve to `Cls`.
fn record_construction(assign: &ast::StmtAssign, constructed: &mut HashMap<String, String>) {
    let [ast::Expr::Name(target)] = assign.targets.as_slice() else {
        return;
    };
    let ast::Expr::Call(call) = &*assign.value else {
        return;
    };
    let ast::Expr::Name(callee) = &*call.func else {
        return;
    };
    constructed.insert(
        target.id.as_str().to_string(),
        callee.id.as_str().to_string(),
    );
}

// ============================================================================
// Tests
// ============================================================================
