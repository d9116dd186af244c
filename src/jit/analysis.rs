//! Call analysis.
//!
//! Two post-order passes that annotate every node with whether its subtree
//! contains a call and how deeply calls nest below it. Results live in side
//! tables indexed by `ExprId`. They only steer evaluation order; wrong
//! values make slower code, not wrong code.

use crate::compiler::ast::{Expr, ExprArena, ExprId};

pub struct CallAnalysis {
    has_call: Vec<bool>,
    depth: Vec<u32>,
}

impl CallAnalysis {
    /// Annotate every node of `arena`. With `use_call_depth` off, every
    /// depth is 0 and the scheduler falls back to right-then-left order.
    pub fn run(arena: &ExprArena, use_call_depth: bool) -> Self {
        let has_call = record_calls(arena);
        let depth = if use_call_depth {
            record_depth(arena, &has_call)
        } else {
            vec![0; arena.len()]
        };
        Self { has_call, depth }
    }

    pub fn contains_call(&self, id: ExprId) -> bool {
        self.has_call[id.index()]
    }

    pub fn call_depth(&self, id: ExprId) -> u32 {
        self.depth[id.index()]
    }
}

// Arena order is post-order, so children are always filled in before parents.

fn record_calls(arena: &ExprArena) -> Vec<bool> {
    let mut has_call = vec![false; arena.len()];
    for (id, expr) in arena.iter() {
        has_call[id.index()] = match expr {
            Expr::Constant(_) | Expr::Variable(_) => false,
            Expr::Call { .. } => true,
            Expr::Binary { lhs, rhs, .. } => has_call[lhs.index()] || has_call[rhs.index()],
        };
    }
    has_call
}

fn record_depth(arena: &ExprArena, has_call: &[bool]) -> Vec<u32> {
    let mut depth = vec![0u32; arena.len()];
    for (id, expr) in arena.iter() {
        if !has_call[id.index()] {
            continue;
        }
        depth[id.index()] = match expr {
            Expr::Constant(_) | Expr::Variable(_) => 0,
            Expr::Call { arg, .. } => 1 + depth[arg.index()],
            Expr::Binary { lhs, rhs, .. } => depth[lhs.index()].max(depth[rhs.index()]),
        };
    }
    depth
}
