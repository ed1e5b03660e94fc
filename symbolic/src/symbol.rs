use std::fmt;
use std::sync::Arc;

/// A named scalar unknown. Two symbols are the same symbol when their
/// names match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: impl AsRef<str>) -> Self {
        Symbol(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Create several symbols from a whitespace separated list of names.
///
/// ```
/// let s = symbolic::symbols("C_A C_L");
/// assert_eq!(s[1].name(), "C_L");
/// ```
pub fn symbols(names: &str) -> Vec<Symbol> {
    names.split_whitespace().map(Symbol::new).collect()
}
