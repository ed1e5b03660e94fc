//! Symbolic algebra for kinematic derivations
//!
//! A small computer-algebra engine covering what transform-chain
//! derivations need:
//! - canonical expression trees with exact rational coefficients
//! - a staged simplifier (expansion, Pythagorean identities)
//! - dense symbolic matrices with numeric evaluation through nalgebra
//! - equations, a closed-form solver for one unknown and
//!   common-subexpression elimination

mod coeff;
mod cse;
mod equation;
mod expr;
mod matrix;
mod simplify;
mod solve;
mod symbol;

pub use coeff::Coefficient;
pub use cse::{Cse, cse};
pub use equation::Equation;
pub use expr::{Expr, ExprKind, Func};
pub use matrix::Matrix;
pub use simplify::{Pass, Simplifier, expand, simplify, trig_identities};
pub use solve::{Roots, Solution, solve};
pub use symbol::{Symbol, symbols};

/// Error type for symbolic operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SymbolicError {
    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expected {expected} entries, got {found}")]
    DataLength { expected: usize, found: usize },

    #[error("shape mismatch: {lhs:?} against {rhs:?}")]
    ShapeMismatch {
        lhs: (usize, usize),
        rhs: (usize, usize),
    },

    #[error("index ({row}, {col}) out of bounds for shape {shape:?}")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        shape: (usize, usize),
    },

    #[error("no solution for {unknown}: {residual} = 0 cannot hold")]
    NoSolution { unknown: String, residual: String },

    #[error("{unknown} appears non-algebraically in {residual} = 0")]
    NotAlgebraic { unknown: String, residual: String },

    #[error("no equation constrains {0}")]
    Unconstrained(String),
}

pub type Result<T> = std::result::Result<T, SymbolicError>;
