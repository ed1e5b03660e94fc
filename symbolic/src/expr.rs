//! Expression trees
//!
//! Every constructor returns an expression in canonical form: sums and
//! products are flat, numeric parts are folded, like terms and like bases
//! are merged and children are kept in a total order. Structurally equal
//! expressions therefore compare equal, which the simplifier, the solver
//! and CSE all rely on.

use crate::coeff::Coefficient;
use crate::symbol::Symbol;
use crate::{Result, SymbolicError};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Elementary functions understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Func {
    Sin,
    Cos,
    Asin,
    Acos,
    Atan2,
}

impl Func {
    pub fn name(&self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan2 => "atan2",
        }
    }

    fn eval(&self, args: &[f64]) -> f64 {
        match (self, args) {
            (Func::Sin, [a]) => a.sin(),
            (Func::Cos, [a]) => a.cos(),
            (Func::Asin, [a]) => a.asin(),
            (Func::Acos, [a]) => a.acos(),
            (Func::Atan2, [y, x]) => y.atan2(*x),
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Num(Coefficient),
    Pi,
    Sym(Symbol),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Expr, Expr),
    Func(Func, Vec<Expr>),
}

/// An immutable symbolic expression. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    kind: Arc<ExprKind>,
}

impl Expr {
    fn raw(kind: ExprKind) -> Expr {
        Expr {
            kind: Arc::new(kind),
        }
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn num(c: Coefficient) -> Expr {
        Expr::raw(ExprKind::Num(c))
    }

    pub fn int(n: i64) -> Expr {
        Expr::num(Coefficient::int(n))
    }

    pub fn rational(num: i64, den: i64) -> Expr {
        Expr::num(Coefficient::rational(num, den))
    }

    pub fn float(f: f64) -> Expr {
        Expr::num(Coefficient::float(f))
    }

    pub fn pi() -> Expr {
        Expr::raw(ExprKind::Pi)
    }

    pub fn symbol(s: &Symbol) -> Expr {
        Expr::raw(ExprKind::Sym(s.clone()))
    }

    pub fn as_coeff(&self) -> Option<&Coefficient> {
        match self.kind() {
            ExprKind::Num(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.kind() {
            ExprKind::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_coeff().is_some_and(Coefficient::is_zero)
    }

    pub fn is_one(&self) -> bool {
        self.as_coeff().is_some_and(Coefficient::is_one)
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind(), ExprKind::Num(_) | ExprKind::Pi)
    }

    /// Build a sum: flattens nested sums, folds constants and collects like
    /// terms.
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Expr {
        let mut constant = Coefficient::int(0);
        let mut collected: BTreeMap<Expr, Coefficient> = BTreeMap::new();
        let mut pending: Vec<Expr> = terms.into_iter().collect();

        while let Some(term) = pending.pop() {
            match term.kind() {
                ExprKind::Add(inner) => pending.extend(inner.iter().cloned()),
                ExprKind::Num(c) => constant = constant + *c,
                _ => {
                    let (c, rest) = term.split_coefficient();
                    let entry = collected.entry(rest).or_insert(Coefficient::int(0));
                    *entry = *entry + c;
                }
            }
        }

        let mut out: Vec<Expr> = collected
            .into_iter()
            .filter(|(_, c)| !c.is_zero())
            .map(|(rest, c)| {
                if c.is_one() {
                    rest
                } else {
                    Expr::product([Expr::num(c), rest])
                }
            })
            .collect();

        if !constant.is_zero() {
            out.push(Expr::num(constant));
        }

        match out.len() {
            0 => Expr::int(0),
            1 => out.swap_remove(0),
            _ => Expr::raw(ExprKind::Add(out)),
        }
    }

    /// Build a product: flattens nested products, folds numeric factors and
    /// merges powers of equal bases. A numeric coefficient times a single
    /// sum is distributed.
    pub fn product<I: IntoIterator<Item = Expr>>(factors: I) -> Expr {
        let mut coeff = Coefficient::int(1);
        let mut powers: BTreeMap<Expr, Vec<Expr>> = BTreeMap::new();
        let mut pending: Vec<Expr> = factors.into_iter().collect();

        while let Some(factor) = pending.pop() {
            match factor.kind() {
                ExprKind::Mul(inner) => pending.extend(inner.iter().cloned()),
                ExprKind::Num(c) => coeff = coeff * *c,
                ExprKind::Pow(base, exp) => {
                    powers.entry(base.clone()).or_default().push(exp.clone())
                }
                _ => powers.entry(factor.clone()).or_default().push(Expr::int(1)),
            }
        }

        if coeff.is_zero() {
            return Expr::int(0);
        }

        let mut out = Vec::with_capacity(powers.len());
        let mut regroup = false;
        for (base, exps) in powers {
            let factor = Expr::pow(base, Expr::sum(exps));
            match factor.kind() {
                ExprKind::Num(c) => coeff = coeff * *c,
                ExprKind::Mul(_) => {
                    regroup = true;
                    out.push(factor);
                }
                _ => out.push(factor),
            }
        }

        if regroup {
            out.push(Expr::num(coeff));
            return Expr::product(out);
        }
        if coeff.is_zero() {
            return Expr::int(0);
        }

        match out.len() {
            0 => return Expr::num(coeff),
            1 if coeff.is_one() => return out.swap_remove(0),
            1 => {
                if let ExprKind::Add(terms) = out[0].kind() {
                    return Expr::sum(
                        terms
                            .iter()
                            .map(|t| Expr::product([Expr::num(coeff), t.clone()])),
                    );
                }
            }
            _ => {}
        }

        out.sort();
        if !coeff.is_one() {
            out.insert(0, Expr::num(coeff));
        }
        Expr::raw(ExprKind::Mul(out))
    }

    pub fn pow(base: Expr, exp: Expr) -> Expr {
        if exp.is_zero() || base.is_one() {
            return Expr::int(1);
        }
        if exp.is_one() {
            return base;
        }

        if let Some(e) = exp.as_coeff() {
            if let Some(b) = base.as_coeff() {
                if b.is_zero() {
                    if !e.is_negative() {
                        return Expr::int(0);
                    }
                } else if let Some(n) = e.as_integer() {
                    return Expr::num(b.pow_int(n));
                } else if (b.is_float() || e.is_float()) && !b.is_negative() {
                    return Expr::num(b.powf(e));
                } else if *e == Coefficient::rational(1, 2) {
                    if let Some(root) = b.sqrt_exact() {
                        return Expr::num(root);
                    }
                }
            }

            if e.as_integer().is_some() {
                match base.kind() {
                    ExprKind::Pow(inner, inner_exp) => {
                        return Expr::pow(
                            inner.clone(),
                            Expr::product([inner_exp.clone(), exp.clone()]),
                        );
                    }
                    ExprKind::Mul(factors) => {
                        return Expr::product(
                            factors.iter().map(|f| Expr::pow(f.clone(), exp.clone())),
                        );
                    }
                    _ => {}
                }
            }
        }

        Expr::raw(ExprKind::Pow(base, exp))
    }

    pub fn sqrt(arg: Expr) -> Expr {
        Expr::pow(arg, Expr::rational(1, 2))
    }

    pub fn recip(&self) -> Expr {
        Expr::pow(self.clone(), Expr::int(-1))
    }

    pub fn neg(&self) -> Expr {
        Expr::product([Expr::int(-1), self.clone()])
    }

    pub fn sin(arg: Expr) -> Expr {
        if arg.is_zero() || matches!(arg.kind(), ExprKind::Pi) {
            return Expr::int(0);
        }
        if let Some(Coefficient::Float(v)) = arg.as_coeff() {
            return Expr::float(v.sin());
        }
        if arg.is_negated() {
            return Expr::sin(arg.neg()).neg();
        }
        Expr::raw(ExprKind::Func(Func::Sin, vec![arg]))
    }

    pub fn cos(arg: Expr) -> Expr {
        if arg.is_zero() {
            return Expr::int(1);
        }
        if matches!(arg.kind(), ExprKind::Pi) {
            return Expr::int(-1);
        }
        if let Some(Coefficient::Float(v)) = arg.as_coeff() {
            return Expr::float(v.cos());
        }
        if arg.is_negated() {
            return Expr::cos(arg.neg());
        }
        Expr::raw(ExprKind::Func(Func::Cos, vec![arg]))
    }

    pub fn asin(arg: Expr) -> Expr {
        if arg.is_zero() {
            return Expr::int(0);
        }
        if let Some(Coefficient::Float(v)) = arg.as_coeff() {
            return Expr::float(v.asin());
        }
        if arg.is_negated() {
            return Expr::asin(arg.neg()).neg();
        }
        Expr::raw(ExprKind::Func(Func::Asin, vec![arg]))
    }

    pub fn acos(arg: Expr) -> Expr {
        if arg.is_one() {
            return Expr::int(0);
        }
        if let Some(Coefficient::Float(v)) = arg.as_coeff() {
            return Expr::float(v.acos());
        }
        Expr::raw(ExprKind::Func(Func::Acos, vec![arg]))
    }

    pub fn atan2(y: Expr, x: Expr) -> Expr {
        if let (Some(cy), Some(cx)) = (y.as_coeff(), x.as_coeff()) {
            if cy.is_float() || cx.is_float() {
                return Expr::float(cy.to_f64().atan2(cx.to_f64()));
            }
            if cy.is_zero() && !cx.is_negative() && !cx.is_zero() {
                return Expr::int(0);
            }
        }
        Expr::raw(ExprKind::Func(Func::Atan2, vec![y, x]))
    }

    /// Rebuild a function application through its constructor
    pub fn apply(func: Func, args: &[Expr]) -> Expr {
        match (func, args) {
            (Func::Sin, [a]) => Expr::sin(a.clone()),
            (Func::Cos, [a]) => Expr::cos(a.clone()),
            (Func::Asin, [a]) => Expr::asin(a.clone()),
            (Func::Acos, [a]) => Expr::acos(a.clone()),
            (Func::Atan2, [y, x]) => Expr::atan2(y.clone(), x.clone()),
            _ => Expr::raw(ExprKind::Func(func, args.to_vec())),
        }
    }

    /// Split into numeric coefficient and the remaining term.
    pub fn split_coefficient(&self) -> (Coefficient, Expr) {
        match self.kind() {
            ExprKind::Num(c) => (*c, Expr::int(1)),
            ExprKind::Mul(factors) => match factors.first().and_then(Expr::as_coeff) {
                Some(c) => (*c, Expr::product(factors[1..].iter().cloned())),
                None => (Coefficient::int(1), self.clone()),
            },
            _ => (Coefficient::int(1), self.clone()),
        }
    }

    /// Whether the expression reads as a negation, so that odd and even
    /// functions can pull the sign out of their argument.
    pub fn is_negated(&self) -> bool {
        match self.kind() {
            ExprKind::Num(c) => c.is_negative(),
            ExprKind::Mul(_) => self.split_coefficient().0.is_negative(),
            ExprKind::Add(terms) => {
                let negated = terms.iter().filter(|t| t.is_negated()).count();
                2 * negated > terms.len()
                    || (2 * negated == terms.len() && terms[0].is_negated())
            }
            _ => false,
        }
    }

    /// The terms of a sum, or the expression itself
    pub fn addends(&self) -> Vec<Expr> {
        match self.kind() {
            ExprKind::Add(terms) => terms.clone(),
            _ => vec![self.clone()],
        }
    }

    /// The factors of a product, or the expression itself
    pub fn factors(&self) -> Vec<Expr> {
        match self.kind() {
            ExprKind::Mul(factors) => factors.clone(),
            _ => vec![self.clone()],
        }
    }

    /// Direct children
    pub fn args(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Add(xs) | ExprKind::Mul(xs) | ExprKind::Func(_, xs) => xs.iter().collect(),
            ExprKind::Pow(base, exp) => vec![base, exp],
            _ => Vec::new(),
        }
    }

    /// Rebuild with every child replaced by `f(child)`
    pub fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
        match self.kind() {
            ExprKind::Add(terms) => Expr::sum(terms.iter().map(&mut f)),
            ExprKind::Mul(factors) => Expr::product(factors.iter().map(&mut f)),
            ExprKind::Pow(base, exp) => {
                let base = f(base);
                let exp = f(exp);
                Expr::pow(base, exp)
            }
            ExprKind::Func(func, args) => {
                let args: Vec<Expr> = args.iter().map(&mut f).collect();
                Expr::apply(*func, &args)
            }
            _ => self.clone(),
        }
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        match self.kind() {
            ExprKind::Sym(s) => s == symbol,
            _ => self.args().into_iter().any(|a| a.contains(symbol)),
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self.kind() {
            ExprKind::Sym(s) => {
                out.insert(s.clone());
            }
            _ => {
                for arg in self.args() {
                    arg.collect_symbols(out);
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.args().into_iter().map(Expr::node_count).sum::<usize>()
    }

    /// Replace symbols; the result is rebuilt through the constructors so
    /// numeric substitutions fold.
    pub fn subs(&self, map: &HashMap<Symbol, Expr>) -> Expr {
        match self.kind() {
            ExprKind::Sym(s) => map.get(s).cloned().unwrap_or_else(|| self.clone()),
            _ => self.map_children(|c| c.subs(map)),
        }
    }

    /// Evaluate numerically
    pub fn eval(&self, env: &HashMap<Symbol, f64>) -> Result<f64> {
        Ok(match self.kind() {
            ExprKind::Num(c) => c.to_f64(),
            ExprKind::Pi => PI,
            ExprKind::Sym(s) => *env
                .get(s)
                .ok_or_else(|| SymbolicError::UndefinedSymbol(s.name().to_string()))?,
            ExprKind::Add(terms) => {
                let mut acc = 0.0;
                for t in terms {
                    acc += t.eval(env)?;
                }
                acc
            }
            ExprKind::Mul(factors) => {
                let mut acc = 1.0;
                for f in factors {
                    acc *= f.eval(env)?;
                }
                acc
            }
            ExprKind::Pow(base, exp) => {
                let b = base.eval(env)?;
                let e = exp.eval(env)?;
                if b == 0.0 && e < 0.0 {
                    return Err(SymbolicError::DivisionByZero);
                }
                b.powf(e)
            }
            ExprKind::Func(func, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(env))
                    .collect::<Result<Vec<f64>>>()?;
                func.eval(&values)
            }
        })
    }

    fn rank(&self) -> u8 {
        match self.kind() {
            ExprKind::Num(_) => 0,
            ExprKind::Pi => 1,
            ExprKind::Sym(_) => 2,
            ExprKind::Func(..) => 3,
            ExprKind::Pow(..) => 4,
            ExprKind::Mul(_) => 5,
            ExprKind::Add(_) => 6,
        }
    }

    fn precedence(&self) -> u8 {
        match self.kind() {
            ExprKind::Num(c) if c.is_negative() => PREC_ADD,
            ExprKind::Num(c) if c.as_integer().is_none() && !c.is_float() => PREC_MUL,
            ExprKind::Add(_) => PREC_ADD,
            ExprKind::Mul(_) if self.split_coefficient().0.is_negative() => PREC_ADD,
            ExprKind::Mul(_) => PREC_MUL,
            ExprKind::Pow(_, exp) => match exp.as_coeff() {
                Some(e) if *e == Coefficient::rational(1, 2) => PREC_ATOM,
                Some(e) if e.is_negative() => PREC_MUL,
                _ => PREC_POW,
            },
            _ => PREC_ATOM,
        }
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.kind, &other.kind) {
            return Ordering::Equal;
        }
        match (self.kind(), other.kind()) {
            (ExprKind::Num(a), ExprKind::Num(b)) => a.cmp(b),
            (ExprKind::Pi, ExprKind::Pi) => Ordering::Equal,
            (ExprKind::Sym(a), ExprKind::Sym(b)) => a.cmp(b),
            (ExprKind::Add(a), ExprKind::Add(b)) | (ExprKind::Mul(a), ExprKind::Mul(b)) => a.cmp(b),
            (ExprKind::Pow(b1, e1), ExprKind::Pow(b2, e2)) => b1.cmp(b2).then_with(|| e1.cmp(e2)),
            (ExprKind::Func(f1, a1), ExprKind::Func(f2, a2)) => f1.cmp(f2).then_with(|| a1.cmp(a2)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 3;
const PREC_ATOM: u8 = 4;

fn wrap(e: &Expr, min_prec: u8) -> String {
    if e.precedence() < min_prec {
        format!("({})", e)
    } else {
        e.to_string()
    }
}

fn fmt_product(f: &mut fmt::Formatter<'_>, factors: &[Expr]) -> fmt::Result {
    let (mut coeff, rest) = match factors.first().and_then(Expr::as_coeff) {
        Some(c) => (*c, &factors[1..]),
        None => (Coefficient::int(1), factors),
    };
    if coeff.is_negative() {
        f.write_str("-")?;
        coeff = -coeff;
    }

    let mut numer = Vec::new();
    let mut denom = Vec::new();
    match coeff {
        Coefficient::Rational(n, d) => {
            if n != 1 {
                numer.push(n.to_string());
            }
            if d != 1 {
                denom.push(Expr::int(d));
            }
        }
        Coefficient::Float(v) => {
            if v != 1.0 {
                numer.push(v.to_string());
            }
        }
    }

    for factor in rest {
        match factor.kind() {
            ExprKind::Pow(base, exp) if exp.as_coeff().is_some_and(Coefficient::is_negative) => {
                denom.push(Expr::pow(base.clone(), exp.neg()));
            }
            _ => numer.push(wrap(factor, PREC_MUL)),
        }
    }

    let numer = if numer.is_empty() {
        "1".to_string()
    } else {
        numer.join("*")
    };

    match denom.as_slice() {
        [] => f.write_str(&numer),
        [d] if d.precedence() >= PREC_POW => write!(f, "{}/{}", numer, d),
        [d] => write!(f, "{}/({})", numer, d),
        _ => {
            let joined: Vec<String> = denom.iter().map(|d| wrap(d, PREC_MUL)).collect();
            write!(f, "{}/({})", numer, joined.join("*"))
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Num(c) => write!(f, "{}", c),
            ExprKind::Pi => f.write_str("pi"),
            ExprKind::Sym(s) => write!(f, "{}", s),
            ExprKind::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    let (c, rest) = term.split_coefficient();
                    let shown = if c.is_negative() {
                        Expr::product([Expr::num(-c), rest])
                    } else {
                        term.clone()
                    };
                    match (i, c.is_negative()) {
                        (0, true) => write!(f, "-{}", wrap(&shown, PREC_MUL))?,
                        (0, false) => write!(f, "{}", shown)?,
                        (_, true) => write!(f, " - {}", wrap(&shown, PREC_MUL))?,
                        (_, false) => write!(f, " + {}", shown)?,
                    }
                }
                Ok(())
            }
            ExprKind::Mul(factors) => fmt_product(f, factors),
            ExprKind::Pow(base, exp) => match exp.as_coeff() {
                Some(e) if *e == Coefficient::rational(1, 2) => write!(f, "sqrt({})", base),
                Some(e) if e.is_negative() => fmt_product(f, std::slice::from_ref(self)),
                _ => write!(f, "{}^{}", wrap(base, PREC_ATOM), wrap(exp, PREC_ATOM)),
            },
            ExprKind::Func(func, args) => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::int(n as i64)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::int(n)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::float(v)
    }
}

impl From<Coefficient> for Expr {
    fn from(c: Coefficient) -> Self {
        Expr::num(c)
    }
}

impl From<Symbol> for Expr {
    fn from(s: Symbol) -> Self {
        Expr::raw(ExprKind::Sym(s))
    }
}

impl From<&Symbol> for Expr {
    fn from(s: &Symbol) -> Self {
        Expr::symbol(s)
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

fn add2(a: Expr, b: Expr) -> Expr {
    Expr::sum([a, b])
}

fn sub2(a: Expr, b: Expr) -> Expr {
    Expr::sum([a, b.neg()])
}

fn mul2(a: Expr, b: Expr) -> Expr {
    Expr::product([a, b])
}

fn div2(a: Expr, b: Expr) -> Expr {
    Expr::product([a, b.recip()])
}

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $build:path) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                $build(self, rhs)
            }
        }

        impl std::ops::$trait<&Expr> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: &Expr) -> Expr {
                $build(self.clone(), rhs.clone())
            }
        }

        impl std::ops::$trait<&Expr> for Expr {
            type Output = Expr;

            fn $method(self, rhs: &Expr) -> Expr {
                $build(self, rhs.clone())
            }
        }

        impl std::ops::$trait<Expr> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                $build(self.clone(), rhs)
            }
        }
    };
}

impl_binop!(Add, add, add2);
impl_binop!(Sub, sub, sub2);
impl_binop!(Mul, mul, mul2);
impl_binop!(Div, div, div2);

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::neg(&self)
    }
}

impl std::ops::Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::neg(self)
    }
}
