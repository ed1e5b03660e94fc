//! Common-subexpression elimination

use crate::expr::{Expr, ExprKind};
use crate::symbol::Symbol;
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Shared subexpressions pulled out as `x0, x1, ...`, in dependency order,
/// and the inputs rewritten in terms of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cse {
    pub replacements: Vec<(Symbol, Expr)>,
    pub reduced: Vec<Expr>,
}

impl Cse {
    /// Substitute the replacements back in, innermost last.
    pub fn expand(&self) -> Vec<Expr> {
        let mut out = self.reduced.clone();
        for (symbol, value) in self.replacements.iter().rev() {
            let map = HashMap::from([(symbol.clone(), value.clone())]);
            out = out.iter().map(|e| e.subs(&map)).collect();
        }
        out
    }
}

impl fmt::Display for Cse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (symbol, value) in &self.replacements {
            writeln!(f, "{} = {}", symbol, value)?;
        }
        for (i, expr) in self.reduced.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", expr)?;
        }
        Ok(())
    }
}

/// Symbols, numbers and negated symbols are never worth a name.
fn is_atomic(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::Num(_) | ExprKind::Pi | ExprKind::Sym(_) => true,
        ExprKind::Mul(factors) => {
            factors.len() == 2
                && factors[0].as_coeff().is_some()
                && matches!(factors[1].kind(), ExprKind::Sym(_) | ExprKind::Pi)
        }
        _ => false,
    }
}

fn find_repeated(e: &Expr, seen: &mut HashSet<Expr>, repeated: &mut HashSet<Expr>) {
    if is_atomic(e) {
        return;
    }
    if !seen.insert(e.clone()) {
        repeated.insert(e.clone());
        return;
    }
    for arg in e.args() {
        find_repeated(arg, seen, repeated);
    }
}

struct Eliminator {
    repeated: HashSet<Expr>,
    assigned: HashMap<Expr, Expr>,
    replacements: Vec<(Symbol, Expr)>,
    taken: BTreeSet<Symbol>,
    next: usize,
}

impl Eliminator {
    fn fresh(&mut self) -> Symbol {
        loop {
            let candidate = Symbol::new(format!("x{}", self.next));
            self.next += 1;
            if !self.taken.contains(&candidate) {
                return candidate;
            }
        }
    }

    fn rebuild(&mut self, e: &Expr) -> Expr {
        if let Some(placeholder) = self.assigned.get(e) {
            return placeholder.clone();
        }
        if is_atomic(e) {
            return e.clone();
        }

        let rebuilt = e.map_children(|c| self.rebuild(c));
        if !self.repeated.contains(e) {
            return rebuilt;
        }

        let symbol = self.fresh();
        let placeholder = Expr::symbol(&symbol);
        self.replacements.push((symbol, rebuilt));
        self.assigned.insert(e.clone(), placeholder.clone());
        placeholder
    }
}

/// Eliminate subexpressions shared within and across `exprs`.
pub fn cse(exprs: &[Expr]) -> Cse {
    let mut seen = HashSet::new();
    let mut repeated = HashSet::new();
    for e in exprs {
        find_repeated(e, &mut seen, &mut repeated);
    }

    let taken = exprs.iter().flat_map(Expr::free_symbols).collect();
    let mut eliminator = Eliminator {
        repeated,
        assigned: HashMap::new(),
        replacements: Vec::new(),
        taken,
        next: 0,
    };
    let reduced = exprs.iter().map(|e| eliminator.rebuild(e)).collect();

    debug!(
        "cse: {} expressions, {} shared subexpressions",
        exprs.len(),
        eliminator.replacements.len()
    );

    Cse {
        replacements: eliminator.replacements,
        reduced,
    }
}
