use crate::expr::Expr;
use crate::matrix::Matrix;
use crate::{Result, SymbolicError};
use std::fmt;

/// `lhs = rhs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equation {
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Equation {
    pub fn new(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Equation {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    /// Elementwise equations between two matrices of the same shape
    pub fn from_matrices(lhs: &Matrix, rhs: &Matrix) -> Result<Vec<Equation>> {
        if lhs.shape() != rhs.shape() {
            return Err(SymbolicError::ShapeMismatch {
                lhs: lhs.shape(),
                rhs: rhs.shape(),
            });
        }
        Ok(lhs
            .entries()
            .iter()
            .zip(rhs.entries())
            .map(|(l, r)| Equation::new(l, r))
            .collect())
    }

    /// `lhs - rhs`; the equation holds where this is zero
    pub fn residual(&self) -> Expr {
        &self.lhs - &self.rhs
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbol;

    #[test]
    fn test_from_matrices() {
        let x = Expr::symbol(&Symbol::new("x"));
        let lhs = Matrix::column([x.clone(), Expr::int(1)]);
        let rhs = Matrix::column([Expr::int(2), Expr::int(1)]);
        let eqs = Equation::from_matrices(&lhs, &rhs).unwrap();
        assert_eq!(eqs.len(), 2);
        assert_eq!(eqs[0].residual(), &x - Expr::int(2));
        assert_eq!(eqs[1].residual(), Expr::int(0));
        assert_eq!(eqs[0].to_string(), "x = 2");
    }

    #[test]
    fn test_from_matrices_shape_mismatch() {
        let lhs = Matrix::zeros(4, 1);
        let rhs = Matrix::zeros(3, 1);
        assert!(Equation::from_matrices(&lhs, &rhs).is_err());
    }
}
