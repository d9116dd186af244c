//! Constant folding.
//!
//! Rebuilds the tree into a fresh arena, collapsing every subtree whose
//! value does not depend on `x` or `y` into a single constant. Calls are
//! folded by invoking the registered native function, so the folded value
//! is bit-identical to what the generated code would have computed.

use crate::compiler::ast::{Expr, ExprArena, ExprId};
use crate::jit::function_table::FunctionTable;

/// Fold `root` and return the new arena and root.
///
/// Nodes are visited in arena order, which is post-order, so every child is
/// folded before its parent without recursing. Nodes unreachable from
/// `root` are dropped.
pub fn fold_constants(arena: &ExprArena, root: ExprId, table: &FunctionTable) -> (ExprArena, ExprId) {
    let live = arena.reachable(root);
    let mut folder = Folder {
        table,
        out: ExprArena::new(),
        remap: vec![None; live.len()],
    };

    for (id, expr) in arena.iter().take(live.len()) {
        if live[id.index()] {
            let folded = folder.fold(expr);
            folder.remap[id.index()] = Some(folded);
        }
    }

    let root = folder.lookup(root);
    let root = folder.materialize(root);
    (folder.out, root)
}

/// A folded node. Constants stay out of the new arena until a node that
/// survives folding needs them as an operand.
#[derive(Debug, Clone, Copy)]
enum Folded {
    Constant(f64),
    Node(ExprId),
}

struct Folder<'a> {
    table: &'a FunctionTable,
    out: ExprArena,
    /// Indexed by old id.
    remap: Vec<Option<Folded>>,
}

impl Folder<'_> {
    fn fold(&mut self, expr: &Expr) -> Folded {
        match expr {
            Expr::Constant(value) => Folded::Constant(*value),
            Expr::Variable(var) => Folded::Node(self.out.variable(*var)),
            Expr::Binary { op, lhs, rhs } => match (self.lookup(*lhs), self.lookup(*rhs)) {
                (Folded::Constant(l), Folded::Constant(r)) => Folded::Constant(op.apply(l, r)),
                (lhs, rhs) => {
                    let lhs = self.materialize(lhs);
                    let rhs = self.materialize(rhs);
                    Folded::Node(self.out.binary(*op, lhs, rhs))
                }
            },
            Expr::Call { func, arg } => {
                let arg = self.lookup(*arg);
                // Unknown functions stay in the tree for the emitter to reject.
                match (arg, self.table.get(func)) {
                    (Folded::Constant(value), Some(f)) => Folded::Constant(f(value)),
                    (arg, _) => {
                        let arg = self.materialize(arg);
                        Folded::Node(self.out.call(func.clone(), arg))
                    }
                }
            }
        }
    }

    fn lookup(&self, old: ExprId) -> Folded {
        match self.remap[old.index()] {
            Some(folded) => folded,
            None => unreachable!("{:?} used before it was folded", old),
        }
    }

    fn materialize(&mut self, folded: Folded) -> ExprId {
        match folded {
            Folded::Constant(value) => self.out.constant(value),
            Folded::Node(id) => id,
        }
    }
}
