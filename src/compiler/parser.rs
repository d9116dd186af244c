use crate::compiler::ast::{BinOp, ExprArena, ExprId, Var};
use crate::compiler::lexer::{Token, TokenKind};
use crate::error::{JitError, JitResult};

/// Deepest nesting of parentheses, call arguments and unary minus the parser
/// accepts. Chains of binary operators are parsed iteratively and are not
/// limited.
pub const MAX_NESTING: usize = 256;

/// A recursive descent parser for arithmetic expressions.
///
/// Grammar, lowest precedence first:
///
/// ```text
/// expr    := term (('+' | '-') term)*
/// term    := unary (('*' | '/') unary)*
/// unary   := '-' unary | primary
/// primary := number | ident '(' expr ')' | ident | '(' expr ')'
/// ```
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    nesting: usize,
    arena: ExprArena,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            nesting: 0,
            arena: ExprArena::new(),
        }
    }

    /// Parse the whole token stream as a single expression.
    pub fn parse(mut self) -> JitResult<(ExprArena, ExprId)> {
        if self.is_at_end() {
            return Err(self.error("empty expression"));
        }

        let root = self.expression()?;
        if !self.is_at_end() {
            return Err(self.error("unexpected trailing input"));
        }

        Ok((self.arena, root))
    }

    fn expression(&mut self) -> JitResult<ExprId> {
        let mut left = self.term()?;

        loop {
            let op = if self.match_token(&TokenKind::Plus) {
                BinOp::Add
            } else if self.match_token(&TokenKind::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.term()?;
            left = self.arena.binary(op, left, right);
        }

        Ok(left)
    }

    fn term(&mut self) -> JitResult<ExprId> {
        let mut left = self.unary()?;

        loop {
            let op = if self.match_token(&TokenKind::Star) {
                BinOp::Mul
            } else if self.match_token(&TokenKind::Slash) {
                BinOp::Div
            } else {
                break;
            };
            let right = self.unary()?;
            left = self.arena.binary(op, left, right);
        }

        Ok(left)
    }

    fn unary(&mut self) -> JitResult<ExprId> {
        if !self.match_token(&TokenKind::Minus) {
            return self.primary();
        }

        // A negated literal is just a negative constant.
        if let Some(TokenKind::Number(value)) = self.peek_kind() {
            let value = *value;
            self.advance();
            return Ok(self.arena.constant(-value));
        }

        // Multiplying by -1 keeps the sign of zero, unlike 0 - operand.
        let operand = self.nested(Self::unary)?;
        let minus_one = self.arena.constant(-1.0);
        Ok(self.arena.binary(BinOp::Mul, minus_one, operand))
    }

    fn primary(&mut self) -> JitResult<ExprId> {
        if let Some(TokenKind::Number(value)) = self.peek_kind() {
            let value = *value;
            self.advance();
            return Ok(self.arena.constant(value));
        }

        if let Some(TokenKind::Ident(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();

            if self.match_token(&TokenKind::LParen) {
                let arg = self.nested(Self::expression)?;
                self.expect(&TokenKind::RParen)?;
                return Ok(self.arena.call(name, arg));
            }

            return match Var::from_name(&name) {
                Some(var) => Ok(self.arena.variable(var)),
                None => Err(JitError::unknown_variable(name)),
            };
        }

        if self.match_token(&TokenKind::LParen) {
            let expr = self.nested(Self::expression)?;
            self.expect(&TokenKind::RParen)?;
            return Ok(expr);
        }

        Err(self.error("expected expression"))
    }

    // ==================== Helpers ====================

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> JitResult<T>) -> JitResult<T> {
        if self.nesting >= MAX_NESTING {
            return Err(self.error(&format!(
                "expression nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.current).map(|t| &t.kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> JitResult<()> {
        if self.match_token(kind) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", kind)))
        }
    }

    fn current_column(&self) -> usize {
        self.tokens
            .get(self.current)
            .or_else(|| self.tokens.last())
            .map(|t| t.column)
            .unwrap_or(1)
    }

    fn error(&self, message: &str) -> JitError {
        JitError::syntax(self.current_column(), message)
    }
}
