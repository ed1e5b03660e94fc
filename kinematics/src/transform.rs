//! Homogeneous transform builders and vector helpers
//!
//! All transforms are 4x4 symbolic matrices with a `[0, 0, 0, 1]` bottom
//! row; vectors are 4x1 columns whose last entry is the affine `1`.

use crate::{KinematicsError, Position, Result};
use log::trace;
use nalgebra::Vector3;
use std::collections::HashMap;
use symbolic::{Expr, Matrix, Symbol, SymbolicError};

fn one() -> Expr {
    Expr::int(1)
}

fn zero() -> Expr {
    Expr::int(0)
}

pub fn identity() -> Matrix {
    Matrix::identity(4)
}

pub fn translate(x: impl Into<Expr>, y: impl Into<Expr>, z: impl Into<Expr>) -> Matrix {
    Matrix::from_rows([
        [one(), zero(), zero(), x.into()],
        [zero(), one(), zero(), y.into()],
        [zero(), zero(), one(), z.into()],
        [zero(), zero(), zero(), one()],
    ])
}

/// Translation by a homogeneous vector, normalised by its last component
pub fn translate_v(v: &Matrix) -> Result<Matrix> {
    check_vector(v)?;
    let w = &v[(3, 0)];
    Ok(translate(&v[(0, 0)] / w, &v[(1, 0)] / w, &v[(2, 0)] / w))
}

pub fn rotate_x(angle: impl Into<Expr>) -> Matrix {
    let angle = angle.into();
    let (cs, sn) = (Expr::cos(angle.clone()), Expr::sin(angle));
    Matrix::from_rows([
        [one(), zero(), zero(), zero()],
        [zero(), cs.clone(), -&sn, zero()],
        [zero(), sn, cs, zero()],
        [zero(), zero(), zero(), one()],
    ])
}

pub fn rotate_y(angle: impl Into<Expr>) -> Matrix {
    let angle = angle.into();
    let (cs, sn) = (Expr::cos(angle.clone()), Expr::sin(angle));
    Matrix::from_rows([
        [cs.clone(), zero(), sn.clone(), zero()],
        [zero(), one(), zero(), zero()],
        [-sn, zero(), cs, zero()],
        [zero(), zero(), zero(), one()],
    ])
}

pub fn rotate_z(angle: impl Into<Expr>) -> Matrix {
    let angle = angle.into();
    let (cs, sn) = (Expr::cos(angle.clone()), Expr::sin(angle));
    Matrix::from_rows([
        [cs.clone(), -&sn, zero(), zero()],
        [sn, cs, zero(), zero()],
        [zero(), zero(), one(), zero()],
        [zero(), zero(), zero(), one()],
    ])
}

/// `[name_x, name_y, name_z, 1]`
pub fn vector(name: &str) -> Matrix {
    let [x, y, z] =
        ["x", "y", "z"].map(|axis| Expr::symbol(&Symbol::new(format!("{name}_{axis}"))));
    Matrix::column([x, y, z, one()])
}

/// The homogeneous origin `[0, 0, 0, 1]`
pub fn origin() -> Matrix {
    Matrix::column([zero(), zero(), zero(), one()])
}

/// Negate a point, keeping the affine component at `1`
pub fn negate_v(v: &Matrix) -> Result<Matrix> {
    check_vector(v)?;
    let mut negated = v.negated();
    negated.set(3, 0, one())?;
    Ok(negated)
}

/// Multiply transforms left to right
pub fn compose(transforms: &[Matrix]) -> Result<Matrix> {
    let mut acc = identity();
    for t in transforms {
        acc = acc.matmul(t)?;
    }
    Ok(acc)
}

/// Apply `transforms` to `v` right to left, simplifying after every step.
/// Keeps intermediate expressions flat where composing first would nest
/// them.
pub fn apply(transforms: &[Matrix], v: &Matrix) -> Result<Matrix> {
    check_vector(v)?;
    let mut acc = v.clone();
    for t in transforms.iter().rev() {
        acc = t.matmul(&acc)?.simplify();
        trace!(
            "applied transform, {} nodes",
            acc.entries().iter().map(Expr::node_count).sum::<usize>()
        );
    }
    Ok(acc)
}

fn check_vector(v: &Matrix) -> Result<()> {
    match v.shape() {
        (4, 1) => Ok(()),
        (rows, cols) => Err(KinematicsError::NotAVector { rows, cols }),
    }
}

/// Bind the coordinate symbols of `v` to the components of `p`.
/// Entries that are not plain symbols are skipped.
pub fn bind_vector(v: &Matrix, p: &Position, env: &mut HashMap<Symbol, f64>) -> Result<()> {
    check_vector(v)?;
    for i in 0..3 {
        if let Some(symbol) = v[(i, 0)].as_symbol() {
            env.insert(symbol.clone(), p[i]);
        }
    }
    Ok(())
}

/// Evaluate a homogeneous vector into a 3-D position
pub fn evaluate_point(v: &Matrix, env: &HashMap<Symbol, f64>) -> Result<Position> {
    check_vector(v)?;
    let values = v.eval(env)?;
    let w = values[(3, 0)];
    if w == 0.0 {
        return Err(SymbolicError::DivisionByZero.into());
    }
    Ok(Vector3::new(values[(0, 0)], values[(1, 0)], values[(2, 0)]) / w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector4};
    use proptest::prelude::*;
    use std::f64::consts::PI;
    use symbolic::symbols;

    fn var(name: &str) -> Expr {
        Expr::symbol(&Symbol::new(name))
    }

    fn numeric(m: &Matrix) -> Matrix4<f64> {
        let values = m.eval(&HashMap::new()).unwrap();
        Matrix4::from_fn(|i, j| values[(i, j)])
    }

    #[test]
    fn test_rotations_invert_symbolically() {
        let a = var("a");
        let rotations: [fn(Expr) -> Matrix; 3] = [|a| rotate_x(a), |a| rotate_y(a), |a| rotate_z(a)];
        for rotate in rotations {
            let product = rotate(a.clone()).matmul(&rotate(-&a)).unwrap();
            assert_eq!(product.simplify(), identity());
        }
    }

    #[test]
    fn test_translation_inverts_symbolically() {
        let (x, y, z) = (var("x"), var("y"), var("z"));
        let product = translate(&x, &y, &z)
            .matmul(&translate(-&x, -&y, -&z))
            .unwrap();
        assert_eq!(product.simplify(), identity());
    }

    #[test]
    fn test_identity_is_neutral_for_builders() {
        let a = var("a");
        let builders = [
            rotate_x(&a),
            rotate_y(&a),
            rotate_z(&a),
            translate(&a, 2, var("b")),
            identity(),
        ];
        for m in &builders {
            assert_eq!(identity().matmul(m).unwrap(), *m);
            assert_eq!(m.matmul(&identity()).unwrap(), *m);
        }
    }

    #[test]
    fn test_translate_v_normalises() {
        let k = var("k");
        let v = Matrix::column([var("vx"), var("vy"), var("vz"), k.clone()]);
        let expected = translate(var("vx") / &k, var("vy") / &k, var("vz") / &k);
        assert_eq!(translate_v(&v).unwrap(), expected);
    }

    #[test]
    fn test_translate_v_of_point_is_translate() {
        let v = vector("B");
        assert_eq!(
            translate_v(&v).unwrap(),
            translate(var("B_x"), var("B_y"), var("B_z"))
        );
    }

    #[test]
    fn test_vector_names() {
        let v = vector("T");
        let names: Vec<String> = (0..3).map(|i| v[(i, 0)].to_string()).collect();
        assert_eq!(names, ["T_x", "T_y", "T_z"]);
        assert_eq!(v[(3, 0)], Expr::int(1));
    }

    #[test]
    fn test_negate_v_keeps_affine_one() {
        let s = symbols("x y z");
        let v = Matrix::column(s.iter().map(Expr::symbol).chain([Expr::int(1)]));
        let n = negate_v(&v).unwrap();
        let expected = Matrix::column(
            s.iter()
                .map(|sym| -Expr::symbol(sym))
                .chain([Expr::int(1)]),
        );
        assert_eq!(n, expected);
    }

    #[test]
    fn test_non_vectors_are_rejected() {
        assert!(matches!(
            translate_v(&identity()),
            Err(KinematicsError::NotAVector { rows: 4, cols: 4 })
        ));
        assert!(negate_v(&Matrix::zeros(3, 1)).is_err());
    }

    #[test]
    fn test_rotation_conventions() {
        // Quarter turns move the unit axes the right-handed way.
        let quarter = Expr::float(PI / 2.0);
        let x = Vector4::new(1.0, 0.0, 0.0, 1.0);
        let y = Vector4::new(0.0, 1.0, 0.0, 1.0);
        let z = Vector4::new(0.0, 0.0, 1.0, 1.0);

        let rz = numeric(&rotate_z(quarter.clone())) * x;
        assert_relative_eq!(rz, Vector4::new(0.0, 1.0, 0.0, 1.0), epsilon = 1e-12);

        let rx = numeric(&rotate_x(quarter.clone())) * y;
        assert_relative_eq!(rx, Vector4::new(0.0, 0.0, 1.0, 1.0), epsilon = 1e-12);

        let ry = numeric(&rotate_y(quarter)) * z;
        assert_relative_eq!(ry, Vector4::new(1.0, 0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_compose_and_evaluate_point() {
        let chain = compose(&[
            translate(1, 0, 0),
            rotate_z(Expr::float(PI / 2.0)),
            translate(2, 0, 0),
        ])
        .unwrap();
        let foot = chain.matmul(&origin()).unwrap();
        let p = evaluate_point(&foot, &HashMap::new()).unwrap();
        assert_relative_eq!(p, Vector3::new(1.0, 2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_evaluate_point_rejects_direction() {
        let direction = Matrix::column([1, 2, 3, 0].map(Expr::int));
        assert!(matches!(
            evaluate_point(&direction, &HashMap::new()),
            Err(KinematicsError::Symbolic(SymbolicError::DivisionByZero))
        ));
    }

    #[test]
    fn test_apply_matches_compose() {
        let (a, x) = (var("a"), var("x"));
        let chain = [rotate_z(&a), translate(&x, 0, 0), rotate_x(&a)];
        let v = vector("P");
        let applied = apply(&chain, &v).unwrap();
        let composed = compose(&chain).unwrap().matmul(&v).unwrap().simplify();
        assert_eq!(applied, composed);
        assert!(apply(&chain, &identity()).is_err());
    }

    #[test]
    fn test_bind_vector() {
        let mut env = HashMap::new();
        bind_vector(&vector("L"), &Vector3::new(1.0, 2.0, 3.0), &mut env).unwrap();
        assert_eq!(env.get(&Symbol::new("L_y")), Some(&2.0));
        assert_eq!(env.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_rotations_are_orthonormal(a in -10.0..10.0f64) {
            for m in [rotate_x(a), rotate_y(a), rotate_z(a)] {
                let r = numeric(&m);
                prop_assert!((r * r.transpose() - Matrix4::identity()).abs().sum() < 1e-9);
            }
        }

        #[test]
        fn prop_rotation_by_negated_angle_inverts(a in -10.0..10.0f64) {
            let pairs = [
                (rotate_x(a), rotate_x(-a)),
                (rotate_y(a), rotate_y(-a)),
                (rotate_z(a), rotate_z(-a)),
            ];
            for (m, inv) in pairs {
                let w = numeric(&m) * numeric(&inv);
                prop_assert!((w - Matrix4::identity()).abs().sum() < 1e-9);
            }
        }

        #[test]
        fn prop_translate_v_matches_translate(
            x in -5.0..5.0f64,
            y in -5.0..5.0f64,
            z in -5.0..5.0f64,
            k in 0.5..4.0f64,
        ) {
            let v = Matrix::column([x, y, z, k].map(Expr::float));
            let lhs = numeric(&translate_v(&v).unwrap());
            let rhs = numeric(&translate(x / k, y / k, z / k));
            prop_assert!((lhs - rhs).abs().sum() < 1e-12);
        }
    }
}
