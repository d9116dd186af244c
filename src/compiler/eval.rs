//! Tree-walking reference evaluator.
//!
//! Computes the same value the JIT code computes, operation for operation,
//! and is used to cross-check compiled routines.

use crate::compiler::ast::{Expr, ExprArena, ExprId, Var};
use crate::error::{JitError, JitResult};
use crate::jit::function_table::FunctionTable;

/// Evaluate the tree rooted at `root`.
///
/// Values are computed in arena order (post-order) into a side table, so
/// tree height never touches the call stack.
pub fn evaluate(
    arena: &ExprArena,
    root: ExprId,
    table: &FunctionTable,
    x: f64,
    y: f64,
) -> JitResult<f64> {
    let live = arena.reachable(root);
    let mut values = vec![0.0; live.len()];

    for (id, expr) in arena.iter().take(live.len()) {
        if !live[id.index()] {
            continue;
        }
        values[id.index()] = match expr {
            Expr::Constant(value) => *value,
            Expr::Variable(Var::X) => x,
            Expr::Variable(Var::Y) => y,
            Expr::Binary { op, lhs, rhs } => op.apply(values[lhs.index()], values[rhs.index()]),
            Expr::Call { func, arg } => {
                let f = table
                    .get(func)
                    .ok_or_else(|| JitError::unknown_function(func.as_str()))?;
                f(values[arg.index()])
            }
        };
    }

    Ok(values[root.index()])
}
