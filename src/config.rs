//! Compiler configuration.

use crate::error::{JitError, JitResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Optimization switches for one compilation.
///
/// Passed explicitly to every compile entry point, so concurrent
/// compilations with different settings never interfere. Every switch only
/// affects code quality, never the computed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JitConfig {
    /// Park intermediates in XMM2..XMM7; when off everything spills.
    pub use_registers: bool,
    /// Schedule deeper call chains first.
    pub use_call_depth: bool,
    /// Fold constant subtrees before emission.
    pub use_const_folding: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            use_registers: true,
            use_call_depth: true,
            use_const_folding: true,
        }
    }
}

impl JitConfig {
    /// Everything off: pure stack evaluation, right-then-left order.
    pub fn unoptimized() -> Self {
        Self {
            use_registers: false,
            use_call_depth: false,
            use_const_folding: false,
        }
    }

    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> JitResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> JitResult<Self> {
        toml::from_str(content)
            .map_err(|e| JitError::Config(format!("failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> JitResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| JitError::Config(format!("failed to serialize config: {}", e)))
    }
}
