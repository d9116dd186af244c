//! Expression trees stored in an index-addressed arena.
//!
//! Nodes refer to their children by `ExprId`. Two structurally equal
//! subexpressions at different positions are different nodes, which is
//! what the per-node analysis tables rely on.

use std::fmt;

/// Handle to a node inside an [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(usize);

impl ExprId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The two input variables. Anything else is rejected when the tree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    X,
    Y,
}

impl Var {
    pub fn from_name(name: &str) -> Option<Var> {
        match name {
            "x" => Some(Var::X),
            "y" => Some(Var::Y),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Var::X => "x",
            Var::Y => "y",
        }
    }

    /// Frame-pointer relative slot the prologue stores this argument in.
    pub fn slot_offset(self) -> i32 {
        match self {
            Var::X => -8,
            Var::Y => -16,
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }

    /// IEEE-754 semantics, identical to what the generated SSE2 code computes.
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinOp::Add => lhs + rhs,
            BinOp::Sub => lhs - rhs,
            BinOp::Mul => lhs * rhs,
            BinOp::Div => lhs / rhs,
        }
    }
}

/// A single expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(f64),
    Variable(Var),
    Binary { op: BinOp, lhs: ExprId, rhs: ExprId },
    Call { func: String, arg: ExprId },
}

/// Owns every node of one expression tree.
///
/// Children are always pushed before their parents, so iterating the arena
/// in index order visits the tree in post-order.
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    nodes: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn push(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.nodes.len());
        match &expr {
            Expr::Binary { lhs, rhs, .. } => {
                debug_assert!(*lhs < id && *rhs < id, "children must precede parents");
            }
            Expr::Call { arg, .. } => {
                debug_assert!(*arg < id, "children must precede parents");
            }
            Expr::Constant(_) | Expr::Variable(_) => {}
        }
        self.nodes.push(expr);
        id
    }

    pub fn constant(&mut self, value: f64) -> ExprId {
        self.push(Expr::Constant(value))
    }

    pub fn variable(&mut self, var: Var) -> ExprId {
        self.push(Expr::Variable(var))
    }

    pub fn binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.push(Expr::Binary { op, lhs, rhs })
    }

    pub fn call(&mut self, func: impl Into<String>, arg: ExprId) -> ExprId {
        self.push(Expr::Call {
            func: func.into(),
            arg,
        })
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in post-order.
    pub fn iter(&self) -> impl Iterator<Item = (ExprId, &Expr)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, e)| (ExprId(i), e))
    }

    /// Mark every node reachable from `root`, indexed by `ExprId`.
    ///
    /// Walks the arena backwards from `root`; since children precede their
    /// parents, one pass settles every node. Nodes after `root` are never
    /// reachable and are not included.
    pub fn reachable(&self, root: ExprId) -> Vec<bool> {
        let mut live = vec![false; root.index() + 1];
        live[root.index()] = true;
        for i in (0..=root.index()).rev() {
            if !live[i] {
                continue;
            }
            match &self.nodes[i] {
                Expr::Binary { lhs, rhs, .. } => {
                    live[lhs.index()] = true;
                    live[rhs.index()] = true;
                }
                Expr::Call { arg, .. } => live[arg.index()] = true,
                Expr::Constant(_) | Expr::Variable(_) => {}
            }
        }
        live
    }

    /// Render the tree rooted at `root`, fully parenthesized.
    pub fn display(&self, root: ExprId) -> DisplayExpr<'_> {
        DisplayExpr { arena: self, root }
    }
}

pub struct DisplayExpr<'a> {
    arena: &'a ExprArena,
    root: ExprId,
}

enum Piece {
    Node(ExprId),
    Op(BinOp),
    Close,
}

// Explicit stack: a flat chain of thousands of terms is a valid tree.
impl fmt::Display for DisplayExpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![Piece::Node(self.root)];
        while let Some(piece) = pending.pop() {
            match piece {
                Piece::Op(op) => write!(f, " {} ", op.symbol())?,
                Piece::Close => f.write_str(")")?,
                Piece::Node(id) => match self.arena.get(id) {
                    Expr::Constant(value) => write!(f, "{}", value)?,
                    Expr::Variable(var) => f.write_str(var.name())?,
                    Expr::Binary { op, lhs, rhs } => {
                        f.write_str("(")?;
                        pending.push(Piece::Close);
                        pending.push(Piece::Node(*rhs));
                        pending.push(Piece::Op(*op));
                        pending.push(Piece::Node(*lhs));
                    }
                    Expr::Call { func, arg } => {
                        write!(f, "{}(", func)?;
                        pending.push(Piece::Close);
                        pending.push(Piece::Node(*arg));
                    }
                },
            }
        }
        Ok(())
    }
}
