//! Dense symbolic matrices

use crate::expr::Expr;
use crate::simplify::simplify;
use crate::symbol::Symbol;
use crate::{Result, SymbolicError};
use nalgebra::DMatrix;
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

/// A row-major matrix of expressions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Expr>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<Expr>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(SymbolicError::DataLength {
                expected: rows * cols,
                found: data.len(),
            });
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn from_rows<const R: usize, const C: usize>(rows: [[Expr; C]; R]) -> Self {
        Matrix {
            rows: R,
            cols: C,
            data: rows.into_iter().flatten().collect(),
        }
    }

    /// A single column
    pub fn column<I: IntoIterator<Item = Expr>>(entries: I) -> Self {
        let data: Vec<Expr> = entries.into_iter().collect();
        Matrix {
            rows: data.len(),
            cols: 1,
            data,
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![Expr::int(0); rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = Expr::int(1);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Entries in row-major order
    pub fn entries(&self) -> &[Expr] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Expr> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: Expr) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(SymbolicError::IndexOutOfBounds {
                row,
                col,
                shape: self.shape(),
            });
        }
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    /// Matrix product `self * rhs`
    pub fn matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(SymbolicError::ShapeMismatch {
                lhs: self.shape(),
                rhs: rhs.shape(),
            });
        }

        let mut data = Vec::with_capacity(self.rows * rhs.cols);
        for i in 0..self.rows {
            for j in 0..rhs.cols {
                data.push(Expr::sum((0..self.cols).map(|k| {
                    Expr::product([
                        self.data[i * self.cols + k].clone(),
                        rhs.data[k * rhs.cols + j].clone(),
                    ])
                })));
            }
        }

        Ok(Matrix {
            rows: self.rows,
            cols: rhs.cols,
            data,
        })
    }

    /// Elementwise negation
    pub fn negated(&self) -> Matrix {
        self.map(|e| -e)
    }

    pub fn map(&self, f: impl FnMut(&Expr) -> Expr) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn simplify(&self) -> Matrix {
        self.map(simplify)
    }

    pub fn subs(&self, map: &HashMap<Symbol, Expr>) -> Matrix {
        self.map(|e| e.subs(map))
    }

    /// Evaluate every entry numerically
    pub fn eval(&self, env: &HashMap<Symbol, f64>) -> Result<DMatrix<f64>> {
        let values = self
            .data
            .iter()
            .map(|e| e.eval(env))
            .collect::<Result<Vec<f64>>>()?;
        Ok(DMatrix::from_row_slice(self.rows, self.cols, &values))
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Expr;

    fn index(&self, (row, col): (usize, usize)) -> &Expr {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.data.iter().map(|e| e.to_string()).collect();
        let widths: Vec<usize> = (0..self.cols)
            .map(|j| {
                (0..self.rows)
                    .map(|i| cells[i * self.cols + j].chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for i in 0..self.rows {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str("[")?;
            for j in 0..self.cols {
                if j > 0 {
                    f.write_str("  ")?;
                }
                write!(f, "{:<width$}", cells[i * self.cols + j], width = widths[j])?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}
