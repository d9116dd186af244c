use crate::error::{JitError, JitResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Ident(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,

    // Delimiters
    LParen,
    RParen,

    // Special
    Eof,
}

/// A token with its kind and 1-based column.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, column: usize) -> Self {
        Self { kind, column }
    }
}

/// The lexer for single-line arithmetic expressions.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            column: 1,
        }
    }

    pub fn scan_tokens(&mut self) -> JitResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            let column = self.column;

            let Some((start, ch)) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, column));
                break;
            };

            let kind = match ch {
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                '+' => {
                    self.advance();
                    TokenKind::Plus
                }
                '-' => {
                    self.advance();
                    TokenKind::Minus
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '/' => {
                    self.advance();
                    TokenKind::Slash
                }
                c if c.is_ascii_digit() || c == '.' => self.number(start)?,
                c if c.is_alphabetic() || c == '_' => self.identifier(start),
                c => return Err(JitError::syntax(column, format!("unexpected character '{}'", c))),
            };

            tokens.push(Token::new(kind, column));
        }

        Ok(tokens)
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if result.is_some() {
            self.column += 1;
        }
        result
    }

    fn skip_whitespace(&mut self) {
        while let Some((_, ch)) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn end_offset(&mut self) -> usize {
        self.peek().map(|(i, _)| i).unwrap_or(self.source.len())
    }

    fn number(&mut self, start: usize) -> JitResult<TokenKind> {
        let column = self.column;

        self.digits();
        if self.peek().map(|(_, c)| c) == Some('.') {
            self.advance();
            self.digits();
        }

        if matches!(self.peek(), Some((_, 'e' | 'E'))) {
            self.advance();
            if matches!(self.peek(), Some((_, '+' | '-'))) {
                self.advance();
            }
            self.digits();
        }

        let end = self.end_offset();
        let text = &self.source[start..end];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| JitError::syntax(column, format!("invalid number '{}'", text)))
    }

    fn digits(&mut self) {
        while let Some((_, ch)) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.advance();
        }
    }

    fn identifier(&mut self, start: usize) -> TokenKind {
        while let Some((_, ch)) = self.peek() {
            if !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            self.advance();
        }

        let end = self.end_offset();
        TokenKind::Ident(self.source[start..end].to_string())
    }
}
