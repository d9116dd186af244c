//! Registry of native functions callable from JIT code.
//!
//! Generated code calls these through an absolute address with the System V
//! convention: one double in XMM0, result in XMM0. The table is populated
//! up front and only read while compiling.

use std::collections::BTreeMap;

/// Signature every callable function must have.
pub type NativeFn = extern "C" fn(f64) -> f64;

/// Name -> native entry point.
#[derive(Clone, Default)]
pub struct FunctionTable {
    funcs: BTreeMap<String, NativeFn>,
}

impl FunctionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            funcs: BTreeMap::new(),
        }
    }

    /// Create a table holding the standard math functions.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (name, f) in builtins::ALL {
            table.register(name, *f);
        }
        table
    }

    /// Add or replace a function.
    pub fn register(&mut self, name: &str, f: NativeFn) {
        self.funcs.insert(name.to_string(), f);
    }

    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.funcs.get(name).copied()
    }

    /// Absolute address to embed in a `mov rax, imm64; call rax` sequence.
    pub fn address(&self, name: &str) -> Option<u64> {
        self.get(name).map(|f| f as usize as u64)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

impl std::fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

mod builtins {
    use super::NativeFn;

    extern "C" fn sin(x: f64) -> f64 {
        x.sin()
    }
    extern "C" fn cos(x: f64) -> f64 {
        x.cos()
    }
    extern "C" fn tan(x: f64) -> f64 {
        x.tan()
    }
    extern "C" fn asin(x: f64) -> f64 {
        x.asin()
    }
    extern "C" fn acos(x: f64) -> f64 {
        x.acos()
    }
    extern "C" fn atan(x: f64) -> f64 {
        x.atan()
    }
    extern "C" fn sinh(x: f64) -> f64 {
        x.sinh()
    }
    extern "C" fn cosh(x: f64) -> f64 {
        x.cosh()
    }
    extern "C" fn tanh(x: f64) -> f64 {
        x.tanh()
    }
    extern "C" fn sqrt(x: f64) -> f64 {
        x.sqrt()
    }
    extern "C" fn exp(x: f64) -> f64 {
        x.exp()
    }
    extern "C" fn ln(x: f64) -> f64 {
        x.ln()
    }
    extern "C" fn log2(x: f64) -> f64 {
        x.log2()
    }
    extern "C" fn log10(x: f64) -> f64 {
        x.log10()
    }
    extern "C" fn abs(x: f64) -> f64 {
        x.abs()
    }
    extern "C" fn floor(x: f64) -> f64 {
        x.floor()
    }
    extern "C" fn ceil(x: f64) -> f64 {
        x.ceil()
    }
    extern "C" fn round(x: f64) -> f64 {
        x.round()
    }

    pub(super) const ALL: &[(&str, NativeFn)] = &[
        ("sin", sin),
        ("cos", cos),
        ("tan", tan),
        ("asin", asin),
        ("acos", acos),
        ("atan", atan),
        ("sinh", sinh),
        ("cosh", cosh),
        ("tanh", tanh),
        ("sqrt", sqrt),
        ("exp", exp),
        ("ln", ln),
        ("log2", log2),
        ("log10", log10),
        ("abs", abs),
        ("floor", floor),
        ("ceil", ceil),
        ("round", round),
    ];
}
