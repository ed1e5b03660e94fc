//! Closed-form solving for a single unknown
//!
//! Only the shapes that come out of rigid transform chains are handled:
//! residuals linear in the unknown, or linear in its cosine and sine.
//! Every other outcome is reported explicitly instead of being guessed at.

use crate::equation::Equation;
use crate::expr::{Expr, ExprKind, Func};
use crate::simplify::simplify;
use crate::symbol::Symbol;
use crate::{Result, SymbolicError};
use log::debug;
use std::fmt;

/// Roots for the unknown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Roots {
    Unique(Expr),
    /// Several branches, each a valid root where the conditions hold
    Branches(Vec<Expr>),
}

impl Roots {
    pub fn as_slice(&self) -> &[Expr] {
        match self {
            Roots::Unique(root) => std::slice::from_ref(root),
            Roots::Branches(roots) => roots,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub unknown: Symbol,
    pub roots: Roots,
    /// Residuals that must also vanish for the roots to be valid
    pub conditions: Vec<Expr>,
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.roots {
            Roots::Unique(root) => write!(f, "{} = {}", self.unknown, root)?,
            Roots::Branches(roots) => {
                for (i, root) in roots.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{} = {}", self.unknown, root)?;
                }
            }
        }
        for condition in &self.conditions {
            write!(f, "\n  where {} = 0", condition)?;
        }
        Ok(())
    }
}

/// `cos * cos(u) + sin * sin(u) + rest = 0`
#[derive(Debug, Clone)]
struct TrigForm {
    cos: Expr,
    sin: Expr,
    rest: Expr,
}

#[derive(Debug, Clone)]
enum Form {
    /// `slope * u + rest = 0`
    Linear { slope: Expr, rest: Expr },
    Trig(TrigForm),
}

fn not_algebraic(unknown: &Symbol, residual: &Expr) -> SymbolicError {
    SymbolicError::NotAlgebraic {
        unknown: unknown.name().to_string(),
        residual: residual.to_string(),
    }
}

fn decompose(residual: &Expr, unknown: &Symbol) -> Result<Form> {
    let theta = Expr::symbol(unknown);
    let cos_theta = Expr::cos(theta.clone());
    let sin_theta = Expr::sin(theta.clone());

    let (mut slope, mut cos, mut sin, mut rest) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for term in residual.addends() {
        let mut factors = term.factors();
        let Some(k) = factors.iter().position(|f| f.contains(unknown)) else {
            rest.push(term);
            continue;
        };
        let hit = factors.remove(k);
        let coefficient = Expr::product(factors);
        if coefficient.contains(unknown) {
            return Err(not_algebraic(unknown, residual));
        }

        if hit == theta {
            slope.push(coefficient);
        } else if hit == cos_theta {
            cos.push(coefficient);
        } else if hit == sin_theta {
            sin.push(coefficient);
        } else {
            return Err(not_algebraic(unknown, residual));
        }
    }

    match (slope.is_empty(), cos.is_empty() && sin.is_empty()) {
        (false, true) => Ok(Form::Linear {
            slope: Expr::sum(slope),
            rest: Expr::sum(rest),
        }),
        (false, false) => Err(not_algebraic(unknown, residual)),
        (true, _) => Ok(Form::Trig(TrigForm {
            cos: Expr::sum(cos),
            sin: Expr::sum(sin),
            rest: Expr::sum(rest),
        })),
    }
}

/// Cramer's rule on two trig residuals: `det * cos(u) = cos` and
/// `det * sin(u) = sin`.
#[derive(Debug, Clone)]
struct Cramer {
    det: Expr,
    cos: Expr,
    sin: Expr,
}

impl Cramer {
    fn new(a: &TrigForm, b: &TrigForm) -> Option<Self> {
        let det = simplify(&(&a.cos * &b.sin - &b.cos * &a.sin));
        if det.is_zero() {
            return None;
        }
        Some(Self {
            cos: &b.rest * &a.sin - &a.rest * &b.sin,
            sin: &a.rest * &b.cos - &b.rest * &a.cos,
            det,
        })
    }

    fn root(&self) -> Expr {
        let inv = self.det.recip();
        Expr::atan2(&self.sin * &inv, &self.cos * &inv)
    }
}

/// `atan2` of every pair's numerators weighted by its determinant. Each
/// weighted numerator is `det^2` times `cos(u)` or `sin(u)`, so the root
/// is defined wherever at least one determinant is nonzero.
fn weighted_root(pairs: &[((usize, usize), Cramer)]) -> Expr {
    let sin = Expr::sum(pairs.iter().map(|(_, p)| &p.det * &p.sin));
    let cos = Expr::sum(pairs.iter().map(|(_, p)| &p.det * &p.cos));
    Expr::atan2(sin, cos)
}

/// Whether `e` has a sine or cosine anywhere in it
fn has_trig(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::Func(Func::Sin | Func::Cos, _) => true,
        _ => e.args().into_iter().any(has_trig),
    }
}

/// Both branches of `a*cos(u) + b*sin(u) = target`.
fn solve_single(form: &TrigForm) -> Vec<Expr> {
    let target = -&form.rest;
    if form.sin.is_zero() {
        let root = Expr::acos(target / &form.cos);
        vec![root.clone(), -root]
    } else if form.cos.is_zero() {
        let root = Expr::asin(target / &form.sin);
        vec![root.clone(), Expr::pi() - root]
    } else {
        let phase = Expr::atan2(form.sin.clone(), form.cos.clone());
        let radius = Expr::sqrt(
            Expr::pow(form.cos.clone(), Expr::int(2)) + Expr::pow(form.sin.clone(), Expr::int(2)),
        );
        let spread = Expr::acos(target / radius);
        vec![&phase + &spread, phase - spread]
    }
}

/// Solve a system of equations for one unknown.
pub fn solve(equations: &[Equation], unknown: &Symbol) -> Result<Solution> {
    let mut conditions = Vec::new();
    let mut forms: Vec<(Expr, Form)> = Vec::new();

    for equation in equations {
        let residual = simplify(&equation.residual());
        if !residual.contains(unknown) {
            if residual.is_zero() {
                continue;
            }
            if residual.is_number() {
                return Err(SymbolicError::NoSolution {
                    unknown: unknown.name().to_string(),
                    residual: residual.to_string(),
                });
            }
            conditions.push(residual);
            continue;
        }
        let form = decompose(&residual, unknown)?;
        forms.push((residual, form));
    }

    debug!(
        "solving for {}: {} constraining residuals, {} conditions",
        unknown,
        forms.len(),
        conditions.len()
    );

    let leftovers = |used: &[usize], conditions: &mut Vec<Expr>| {
        for (i, (residual, _)) in forms.iter().enumerate() {
            if !used.contains(&i) {
                conditions.push(residual.clone());
            }
        }
    };

    if let Some(i) = forms.iter().position(|(_, f)| matches!(f, Form::Linear { .. })) {
        if let Form::Linear { slope, rest } = &forms[i].1 {
            let root = -(rest / slope);
            leftovers(&[i], &mut conditions);
            return Ok(Solution {
                unknown: unknown.clone(),
                roots: Roots::Unique(root),
                conditions,
            });
        }
    }

    let trig: Vec<(usize, &TrigForm)> = forms
        .iter()
        .enumerate()
        .filter_map(|(i, (_, f))| match f {
            Form::Trig(t) => Some((i, t)),
            Form::Linear { .. } => None,
        })
        .collect();

    let mut pairs = Vec::new();
    for (n, (i, a)) in trig.iter().enumerate() {
        for (j, b) in &trig[n + 1..] {
            if let Some(pair) = Cramer::new(a, b) {
                pairs.push(((*i, *j), pair));
            }
        }
    }

    // Prefer a determinant free of other angles, else weight every pair in.
    let clean = pairs.iter().find(|(_, p)| !has_trig(&p.det));
    if let Some(((i, j), pair)) = clean.or(pairs.first()) {
        let root = match clean {
            Some(_) => {
                debug!("{} fixed by residuals {} and {}", unknown, i, j);
                pair.root()
            }
            None => {
                debug!("{} fixed by {} weighted residual pairs", unknown, pairs.len());
                weighted_root(&pairs)
            }
        };
        leftovers(&[*i, *j], &mut conditions);
        return Ok(Solution {
            unknown: unknown.clone(),
            roots: Roots::Unique(root),
            conditions,
        });
    }

    if let Some((i, form)) = trig.first() {
        leftovers(&[*i], &mut conditions);
        return Ok(Solution {
            unknown: unknown.clone(),
            roots: Roots::Branches(solve_single(form)),
            conditions,
        });
    }

    Err(SymbolicError::Unconstrained(unknown.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn var(s: &Symbol) -> Expr {
        Expr::symbol(s)
    }

    #[test]
    fn test_linear() {
        let x = Symbol::new("x");
        let a = Symbol::new("a");
        // a*x + 3 = 1
        let eq = Equation::new(var(&a) * var(&x) + Expr::int(3), Expr::int(1));
        let solution = solve(&[eq], &x).unwrap();
        assert_eq!(solution.roots, Roots::Unique(Expr::int(-2) / var(&a)));
        assert!(solution.conditions.is_empty());
    }

    #[test]
    fn test_pair_gives_atan2() {
        let t = Symbol::new("t");
        let (px, pz) = (Symbol::new("px"), Symbol::new("pz"));
        let r = Expr::int(2);
        let eqs = [
            Equation::new(&r * Expr::cos(var(&t)), var(&px)),
            Equation::new(-(&r * Expr::sin(var(&t))), var(&pz)),
        ];
        let solution = solve(&eqs, &t).unwrap();
        let Roots::Unique(root) = &solution.roots else {
            panic!("expected a unique root, got {:?}", solution.roots);
        };

        let angle = 0.7f64;
        let env = HashMap::from([
            (px.clone(), 2.0 * angle.cos()),
            (pz.clone(), -2.0 * angle.sin()),
        ]);
        assert_relative_eq!(root.eval(&env).unwrap(), angle, epsilon = 1e-12);
    }

    #[test]
    fn test_pair_determinants_with_other_angles_are_weighted() {
        let (t, f) = (Symbol::new("t"), Symbol::new("f"));
        let (c, s) = (Symbol::new("c"), Symbol::new("s"));
        let (sin_f, cos_f) = (Expr::sin(var(&f)), Expr::cos(var(&f)));
        // Pairing the first residual with either of the others leaves a
        // determinant of sin(f) or cos(f).
        let eqs = [
            Equation::new(Expr::cos(var(&t)), var(&c)),
            Equation::new(&sin_f * Expr::sin(var(&t)), &sin_f * var(&s)),
            Equation::new(&cos_f * Expr::sin(var(&t)), &cos_f * var(&s)),
        ];
        let solution = solve(&eqs, &t).unwrap();
        let Roots::Unique(root) = &solution.roots else {
            panic!("expected a unique root, got {:?}", solution.roots);
        };
        assert_eq!(solution.conditions.len(), 1);

        let angle = 0.9f64;
        for other in [0.0, std::f64::consts::FRAC_PI_2, 0.3] {
            let mut env = HashMap::from([
                (f.clone(), other),
                (c.clone(), angle.cos()),
                (s.clone(), angle.sin()),
            ]);
            assert_relative_eq!(root.eval(&env).unwrap(), angle, epsilon = 1e-12);
            env.insert(t.clone(), angle);
            assert_relative_eq!(solution.conditions[0].eval(&env).unwrap(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_single_equation_has_two_branches() {
        let t = Symbol::new("t");
        let c = Symbol::new("c");
        let eq = Equation::new(Expr::cos(var(&t)), var(&c));
        let solution = solve(&[eq], &t).unwrap();
        let Roots::Branches(roots) = &solution.roots else {
            panic!("expected branches");
        };
        assert_eq!(roots.len(), 2);
        let env = HashMap::from([(c, 0.5)]);
        let values: Vec<f64> = roots.iter().map(|r| r.eval(&env).unwrap()).collect();
        assert_relative_eq!(values[0], std::f64::consts::FRAC_PI_3, epsilon = 1e-12);
        assert_relative_eq!(values[1], -std::f64::consts::FRAC_PI_3, epsilon = 1e-12);
    }

    #[test]
    fn test_mixed_sin_and_cos_branches_satisfy_equation() {
        let t = Symbol::new("t");
        let eq = Equation::new(
            Expr::int(3) * Expr::cos(var(&t)) + Expr::int(4) * Expr::sin(var(&t)),
            Expr::int(2),
        );
        let solution = solve(&[eq], &t).unwrap();
        let env = HashMap::new();
        for root in solution.roots.as_slice() {
            let v = root.eval(&env).unwrap();
            assert_relative_eq!(3.0 * v.cos() + 4.0 * v.sin(), 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_independent_residual_becomes_condition() {
        let t = Symbol::new("t");
        let y = Symbol::new("y");
        let eqs = [
            Equation::new(Expr::cos(var(&t)), Expr::int(0)),
            Equation::new(var(&y), Expr::int(1)),
            Equation::new(Expr::int(1), Expr::int(1)),
        ];
        let solution = solve(&eqs, &t).unwrap();
        assert_eq!(solution.conditions, vec![var(&y) - Expr::int(1)]);
    }

    #[test]
    fn test_contradiction_has_no_solution() {
        let t = Symbol::new("t");
        let eqs = [
            Equation::new(Expr::cos(var(&t)), Expr::int(0)),
            Equation::new(Expr::int(1), Expr::int(0)),
        ];
        assert!(matches!(solve(&eqs, &t), Err(SymbolicError::NoSolution { .. })));
    }

    #[test]
    fn test_non_algebraic() {
        let t = Symbol::new("t");
        let eq = Equation::new(var(&t) * Expr::cos(var(&t)), Expr::int(1));
        assert!(matches!(solve(&[eq], &t), Err(SymbolicError::NotAlgebraic { .. })));

        let eq = Equation::new(Expr::pow(Expr::cos(var(&t)), Expr::int(2)), Expr::int(1));
        assert!(matches!(solve(&[eq], &t), Err(SymbolicError::NotAlgebraic { .. })));
    }

    #[test]
    fn test_unconstrained() {
        let t = Symbol::new("t");
        let y = Symbol::new("y");
        let eq = Equation::new(var(&y), Expr::int(1));
        assert!(matches!(solve(&[eq], &t), Err(SymbolicError::Unconstrained(name)) if name == "t"));
    }
}
