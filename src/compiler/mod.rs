//! Expression front end: source text to an expression arena.

pub mod ast;
pub mod eval;
pub mod fold;
pub mod lexer;
pub mod parser;

use crate::error::JitResult;
use ast::{ExprArena, ExprId};
use lexer::Lexer;
use parser::Parser;

pub use eval::evaluate;
pub use fold::fold_constants;

/// Parse `source` into an arena and the id of its root node.
pub fn parse(source: &str) -> JitResult<(ExprArena, ExprId)> {
    let tokens = Lexer::new(source).scan_tokens()?;
    Parser::new(tokens).parse()
}
