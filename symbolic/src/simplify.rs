//! Staged simplification pipeline
//!
//! The constructors already keep expressions canonical; the passes here do
//! the rewrites that change shape: distributing products over sums and
//! folding Pythagorean identities. The pipeline is repeated until nothing
//! changes or the round limit is hit.

use crate::expr::{Expr, ExprKind, Func};
use log::trace;
use std::collections::HashMap;

/// Largest integer power of a sum that `Expand` multiplies out
const MAX_EXPAND_POWER: i64 = 8;

/// A simplification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Distribute products over sums, expand small powers of sums
    Expand,
    /// Rewrite `k*sin(x)^2 + k*cos(x)^2` to `k`
    TrigIdentities,
}

#[derive(Debug, Clone)]
pub struct Simplifier {
    passes: Vec<Pass>,
    max_rounds: usize,
}

impl Simplifier {
    pub fn new(passes: Vec<Pass>) -> Self {
        Simplifier {
            passes,
            max_rounds: 4,
        }
    }

    pub fn default_pipeline() -> Self {
        Self::new(vec![Pass::Expand, Pass::TrigIdentities])
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    pub fn simplify(&self, expr: &Expr) -> Expr {
        let mut current = expr.clone();
        for round in 0..self.max_rounds {
            let start = current.clone();
            for pass in &self.passes {
                let before = current.node_count();
                current = apply_pass(&current, *pass);
                trace!(
                    "round {} {:?}: {} -> {} nodes",
                    round,
                    pass,
                    before,
                    current.node_count()
                );
            }
            if current == start {
                break;
            }
        }
        current
    }
}

impl Default for Simplifier {
    fn default() -> Self {
        Self::default_pipeline()
    }
}

/// Simplify with the default pipeline
pub fn simplify(expr: &Expr) -> Expr {
    Simplifier::default().simplify(expr)
}

fn apply_pass(expr: &Expr, pass: Pass) -> Expr {
    match pass {
        Pass::Expand => expand(expr),
        Pass::TrigIdentities => trig_identities(expr),
    }
}

/// Multiply two expressions term by term.
fn multiply_out(lhs: &Expr, rhs: &Expr) -> Expr {
    let rhs_terms = rhs.addends();
    Expr::sum(lhs.addends().iter().flat_map(|l| {
        rhs_terms
            .iter()
            .map(move |r| Expr::product([l.clone(), r.clone()]))
    }))
}

/// Expand products of sums: (a + b) * c = a*c + b*c
pub fn expand(expr: &Expr) -> Expr {
    match expr.kind() {
        ExprKind::Mul(factors) => factors
            .iter()
            .map(expand)
            .fold(Expr::int(1), |acc, f| multiply_out(&acc, &f)),
        ExprKind::Pow(base, exp) => {
            let base = expand(base);
            let exp = expand(exp);
            let power = exp.as_coeff().and_then(|c| c.as_integer());
            match (base.kind(), power) {
                (ExprKind::Add(_), Some(n)) if (2..=MAX_EXPAND_POWER).contains(&n) => {
                    let mut acc = base.clone();
                    for _ in 1..n {
                        acc = multiply_out(&acc, &base);
                    }
                    acc
                }
                _ => Expr::pow(base, exp),
            }
        }
        ExprKind::Add(_) | ExprKind::Func(..) => expr.map_children(expand),
        _ => expr.clone(),
    }
}

/// The argument of `sin(x)^2`
fn squared_sin(e: &Expr) -> Option<&Expr> {
    match e.kind() {
        ExprKind::Pow(base, exp) if exp.as_coeff().and_then(|c| c.as_integer()) == Some(2) => {
            match base.kind() {
                ExprKind::Func(Func::Sin, args) if args.len() == 1 => Some(&args[0]),
                _ => None,
            }
        }
        _ => None,
    }
}

/// A pair of terms `k*M*sin(x)^2`, `k*M*cos(x)^2` and their merged `k*M`
fn pythagorean_pair(terms: &[Expr]) -> Option<(usize, usize, Expr)> {
    let index: HashMap<&Expr, usize> = terms.iter().enumerate().map(|(i, t)| (t, i)).collect();
    for (i, term) in terms.iter().enumerate() {
        let factors = term.factors();
        for (k, factor) in factors.iter().enumerate() {
            let Some(arg) = squared_sin(factor) else {
                continue;
            };
            let mut partner = factors.clone();
            partner[k] = Expr::pow(Expr::cos(arg.clone()), Expr::int(2));
            let partner = Expr::product(partner);

            if let Some(&j) = index.get(&partner).filter(|&&j| j != i) {
                let mut merged = factors.clone();
                merged.remove(k);
                return Some((i, j, Expr::product(merged)));
            }
        }
    }
    None
}

/// Fold `k*M*sin(x)^2 + k*M*cos(x)^2` into `k*M`, bottom-up.
pub fn trig_identities(expr: &Expr) -> Expr {
    let expr = expr.map_children(trig_identities);
    let ExprKind::Add(terms) = expr.kind() else {
        return expr;
    };

    let mut terms = terms.clone();
    while let Some((i, j, merged)) = pythagorean_pair(&terms) {
        terms.remove(i.max(j));
        terms.remove(i.min(j));
        terms.push(merged);
        terms = Expr::sum(terms).addends();
    }

    Expr::sum(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbol;
    use proptest::prelude::*;

    fn var(name: &str) -> Expr {
        Expr::symbol(&Symbol::new(name))
    }

    #[test]
    fn test_expand_product_of_sums() {
        let (a, b, c, d) = (var("a"), var("b"), var("c"), var("d"));
        let expr = (&a + &b) * (&c + &d);
        let expected = &a * &c + &a * &d + &b * &c + &b * &d;
        assert_eq!(expand(&expr), expected);
    }

    #[test]
    fn test_expand_square() {
        let x = var("x");
        let expr = Expr::pow(&x + Expr::int(1), Expr::int(2));
        let expected = Expr::pow(x.clone(), Expr::int(2)) + Expr::int(2) * &x + Expr::int(1);
        assert_eq!(expand(&expr), expected);
    }

    #[test]
    fn test_expand_cancels() {
        let (a, b) = (var("a"), var("b"));
        let expr = (&a + &b) * (&a - &b) - Expr::pow(a.clone(), Expr::int(2));
        assert_eq!(simplify(&expr), -Expr::pow(b, Expr::int(2)));
    }

    #[test]
    fn test_pythagorean_identity() {
        let a = var("a");
        let expr = Expr::pow(Expr::sin(a.clone()), Expr::int(2))
            + Expr::pow(Expr::cos(a.clone()), Expr::int(2));
        assert_eq!(simplify(&expr), Expr::int(1));
    }

    #[test]
    fn test_pythagorean_identity_with_common_factor() {
        let (a, r) = (var("a"), var("r"));
        let expr = Expr::int(3) * &r * Expr::pow(Expr::sin(a.clone()), Expr::int(2))
            + Expr::int(3) * &r * Expr::pow(Expr::cos(a.clone()), Expr::int(2))
            + &r;
        assert_eq!(simplify(&expr), Expr::int(4) * &r);
    }

    #[test]
    fn test_rotation_entries_collapse() {
        // cos(a)^2 + sin(a)^2 after expanding (cos(a)*r)^2 + (sin(a)*r)^2
        let (a, r) = (var("a"), var("r"));
        let x = Expr::cos(a.clone()) * &r;
        let y = Expr::sin(a.clone()) * &r;
        let expr = &x * &x + &y * &y;
        assert_eq!(simplify(&expr), Expr::pow(r, Expr::int(2)));
    }

    #[test]
    fn test_nested_identities_fold_in_sequence() {
        let (a, b) = (var("a"), var("b"));
        let s2 = |e: &Expr| Expr::pow(Expr::sin(e.clone()), Expr::int(2));
        let c2 = |e: &Expr| Expr::pow(Expr::cos(e.clone()), Expr::int(2));
        let expr = c2(&a) * c2(&b) + c2(&a) * s2(&b) + s2(&a);
        assert_eq!(simplify(&expr), Expr::int(1));
    }

    #[test]
    fn test_round_limit() {
        let (a, x, y) = (var("a"), var("x"), var("y"));
        let s2 = Expr::pow(Expr::sin(a.clone()), Expr::int(2));
        let c2 = Expr::pow(Expr::cos(a.clone()), Expr::int(2));
        // The identity only shows up after expanding, one round too late
        // for a pipeline that folds first.
        let expr = &x * &s2 + &x * (&c2 + &y);
        let pipeline = || Simplifier::new(vec![Pass::TrigIdentities, Pass::Expand]);

        let one_round = pipeline().with_max_rounds(1).simplify(&expr);
        assert_eq!(one_round, &x * &s2 + &x * &c2 + &x * &y);
        assert_eq!(one_round, pipeline().with_max_rounds(0).simplify(&expr));
        assert_eq!(pipeline().with_max_rounds(2).simplify(&expr), &x + &x * &y);
    }

    proptest! {
        #[test]
        fn prop_simplify_preserves_value(
            a in -3.0..3.0f64,
            b in -3.0..3.0f64,
            r in 0.1..2.0f64,
        ) {
            let (sa, sb, sr) = (Symbol::new("a"), Symbol::new("b"), Symbol::new("r"));
            let (ea, eb, er) = (Expr::symbol(&sa), Expr::symbol(&sb), Expr::symbol(&sr));
            let rotated = &er * Expr::cos(ea.clone()) * Expr::sin(eb.clone())
                + Expr::pow(&er * Expr::sin(ea.clone()) + &eb, Expr::int(2))
                - Expr::pow(Expr::cos(ea.clone()), Expr::int(2)) * (&ea - &eb);
            let env = HashMap::from([(sa, a), (sb, b), (sr, r)]);

            let before = rotated.eval(&env).unwrap();
            let after = simplify(&rotated).eval(&env).unwrap();
            prop_assert!((before - after).abs() < 1e-9 * (1.0 + before.abs()));
        }
    }
}
