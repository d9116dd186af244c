//! Error types for expression compilation.

use crate::jit::memory::MemoryError;
use std::fmt;
use thiserror::Error;

/// Which namespace an unresolved name was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Variable => write!(f, "variable"),
            SymbolKind::Function => write!(f, "function"),
        }
    }
}

/// Every way a compilation can fail. None of these leave partial code behind.
///
/// Allocator misuse is deliberately absent: it is a bug in the emitter and
/// panics instead.
#[derive(Error, Debug)]
pub enum JitError {
    #[error("syntax error at column {column}: {message}")]
    Syntax { column: usize, message: String },

    #[error("undefined {kind}: {name}")]
    UnknownSymbol { kind: SymbolKind, name: String },

    #[error("executable memory: {0}")]
    Memory(#[from] MemoryError),

    #[error("generated code is x86-64 and cannot run on {0}")]
    UnsupportedArch(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl JitError {
    pub fn syntax(column: usize, message: impl Into<String>) -> Self {
        JitError::Syntax {
            column,
            message: message.into(),
        }
    }

    pub fn unknown_variable(name: impl Into<String>) -> Self {
        JitError::UnknownSymbol {
            kind: SymbolKind::Variable,
            name: name.into(),
        }
    }

    pub fn unknown_function(name: impl Into<String>) -> Self {
        JitError::UnknownSymbol {
            kind: SymbolKind::Function,
            name: name.into(),
        }
    }
}

/// Result type alias for compile operations.
pub type JitResult<T> = Result<T, JitError>;
