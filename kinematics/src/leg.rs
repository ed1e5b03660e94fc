//! Symbolic coxa-femur-tibia leg
//!
//! The leg hangs off a body at `B`, is mounted at offset `L`, and chains
//! three hinges: the coxa turns about `y`, femur and tibia about `x`, each
//! followed by its link along `x`.

use crate::transform::{
    apply, bind_vector, compose, evaluate_point, negate_v, origin, rotate_x, rotate_y,
    rotate_z, translate, translate_v, vector,
};
use crate::{ForwardKinematics, JointAngles, Position, Result};
use log::trace;
use std::collections::HashMap;
use symbolic::{Expr, Matrix, Symbol};

/// A revolute joint and the link that follows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hinge {
    pub angle: Symbol,
    pub length: Symbol,
}

impl Hinge {
    /// `<prefix>_A` and `<prefix>_L`
    pub fn named(prefix: &str) -> Self {
        Self {
            angle: Symbol::new(format!("{prefix}_A")),
            length: Symbol::new(format!("{prefix}_L")),
        }
    }

    fn angle(&self) -> Expr {
        Expr::symbol(&self.angle)
    }

    fn length(&self) -> Expr {
        Expr::symbol(&self.length)
    }
}

/// Body attitude, applied as yaw about `y`, then pitch about `x`, then
/// roll about `z`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orientation {
    pub yaw: Symbol,
    pub pitch: Symbol,
    pub roll: Symbol,
}

impl Orientation {
    pub fn symbolic() -> Self {
        Self {
            yaw: Symbol::new("yaw"),
            pitch: Symbol::new("pitch"),
            roll: Symbol::new("roll"),
        }
    }

    pub fn matrix(&self) -> Result<Matrix> {
        compose(&[
            rotate_y(&self.yaw),
            rotate_x(&self.pitch),
            rotate_z(&self.roll),
        ])
    }

    pub fn inverse_matrix(&self) -> Result<Matrix> {
        compose(&[
            rotate_z(-Expr::symbol(&self.roll)),
            rotate_x(-Expr::symbol(&self.pitch)),
            rotate_y(-Expr::symbol(&self.yaw)),
        ])
    }

    pub fn bind(&self, yaw: f64, pitch: f64, roll: f64, env: &mut HashMap<Symbol, f64>) {
        env.insert(self.yaw.clone(), yaw);
        env.insert(self.pitch.clone(), pitch);
        env.insert(self.roll.clone(), roll);
    }
}

/// Numeric instantiation of a [`Leg`]
#[derive(Debug, Clone, PartialEq)]
pub struct LegDimensions {
    pub body: Position,
    pub mount: Position,
    pub coxa: f64,
    pub femur: f64,
    pub tibia: f64,
}

impl Default for LegDimensions {
    fn default() -> Self {
        Self {
            body: Position::zeros(),
            mount: Position::new(1.0, 0.0, 0.0),
            coxa: 1.0,
            femur: 1.0,
            tibia: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub body: Matrix,
    pub mount: Matrix,
    pub coxa: Hinge,
    pub femur: Hinge,
    pub tibia: Hinge,
}

impl Leg {
    /// Fully symbolic leg: `B_*`, `L_*`, `C_A`, `C_L`, `F_A`, `F_L`,
    /// `T_A`, `T_L`
    pub fn symbolic() -> Self {
        Self {
            body: vector("B"),
            mount: vector("L"),
            coxa: Hinge::named("C"),
            femur: Hinge::named("F"),
            tibia: Hinge::named("T"),
        }
    }

    fn joints(&self) -> Vec<Matrix> {
        vec![
            rotate_y(self.coxa.angle()),
            translate(self.coxa.length(), 0, 0),
            rotate_x(self.femur.angle()),
            translate(self.femur.length(), 0, 0),
            rotate_x(self.tibia.angle()),
            translate(self.tibia.length(), 0, 0),
        ]
    }

    /// Factors of the body-to-foot transform with the body held level
    pub fn forward_transforms(&self) -> Result<Vec<Matrix>> {
        let mut chain = vec![translate_v(&self.body)?, translate_v(&self.mount)?];
        chain.extend(self.joints());
        Ok(chain)
    }

    /// Factors of the body-to-foot transform with the body turned by
    /// `orientation`
    pub fn oriented_transforms(&self, orientation: &Orientation) -> Result<Vec<Matrix>> {
        let mut chain = vec![
            translate_v(&self.body)?,
            orientation.matrix()?,
            translate_v(&self.mount)?,
        ];
        chain.extend(self.joints());
        Ok(chain)
    }

    /// Factors of the foot-to-body transform, the algebraic inverse of
    /// [`Leg::oriented_transforms`]
    pub fn inverse_transforms(&self, orientation: &Orientation) -> Result<Vec<Matrix>> {
        Ok(vec![
            translate(-self.tibia.length(), 0, 0),
            rotate_x(-self.tibia.angle()),
            translate(-self.femur.length(), 0, 0),
            rotate_x(-self.femur.angle()),
            translate(-self.coxa.length(), 0, 0),
            rotate_y(-self.coxa.angle()),
            translate_v(&negate_v(&self.mount)?)?,
            orientation.inverse_matrix()?,
            translate_v(&negate_v(&self.body)?)?,
        ])
    }

    pub fn forward_chain(&self) -> Result<Matrix> {
        compose(&self.forward_transforms()?)
    }

    pub fn oriented_chain(&self, orientation: &Orientation) -> Result<Matrix> {
        compose(&self.oriented_transforms(orientation)?)
    }

    pub fn inverse_chain(&self, orientation: &Orientation) -> Result<Matrix> {
        compose(&self.inverse_transforms(orientation)?)
    }

    /// Homogeneous foot position, simplified
    pub fn foot(&self) -> Result<Matrix> {
        apply(&self.forward_transforms()?, &origin())
    }

    /// Symbol values for a numeric leg pose
    pub fn bindings(
        &self,
        dims: &LegDimensions,
        angles: &JointAngles,
    ) -> Result<HashMap<Symbol, f64>> {
        let mut env = HashMap::new();
        bind_vector(&self.body, &dims.body, &mut env)?;
        bind_vector(&self.mount, &dims.mount, &mut env)?;
        for (hinge, angle, length) in [
            (&self.coxa, angles.coxa, dims.coxa),
            (&self.femur, angles.femur, dims.femur),
            (&self.tibia, angles.tibia, dims.tibia),
        ] {
            env.insert(hinge.angle.clone(), angle);
            env.insert(hinge.length.clone(), length);
        }
        Ok(env)
    }

    /// Numeric foot position for a pose
    pub fn foot_position(&self, dims: &LegDimensions, angles: &JointAngles) -> Result<Position> {
        let p = evaluate_point(&self.foot()?, &self.bindings(dims, angles)?)?;
        trace!("foot at {:?} for {:?}", p, angles);
        Ok(p)
    }
}

impl ForwardKinematics for Leg {
    fn forward_kinematics(&self) -> Result<Matrix> {
        self.forward_chain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use proptest::prelude::*;

    fn var(name: &str) -> Expr {
        Expr::symbol(&Symbol::new(name))
    }

    fn numeric(chain: &[Matrix], env: &HashMap<Symbol, f64>) -> DMatrix<f64> {
        chain
            .iter()
            .map(|m| m.eval(env).unwrap())
            .fold(DMatrix::identity(4, 4), |acc, m| acc * m)
    }

    #[test]
    fn test_hinge_names() {
        let h = Hinge::named("F");
        assert_eq!(h.angle.name(), "F_A");
        assert_eq!(h.length.name(), "F_L");
    }

    #[test]
    fn test_foot_is_planar_in_coxa() {
        let foot = Leg::symbolic().foot().unwrap();
        let reach = var("C_L") + var("F_L") + var("T_L");
        let coxa = var("C_A");

        let x = var("B_x") + var("L_x") + &reach * Expr::cos(coxa.clone());
        let y = var("B_y") + var("L_y");
        let z = var("B_z") + var("L_z") - &reach * Expr::sin(coxa);

        assert_eq!(foot[(0, 0)], symbolic::expand(&x));
        assert_eq!(foot[(1, 0)], y);
        assert_eq!(foot[(2, 0)], symbolic::expand(&z));
        assert_eq!(foot[(3, 0)], Expr::int(1));
    }

    #[test]
    fn test_foot_position_default_leg() {
        let leg = Leg::symbolic();
        let p = leg
            .foot_position(&LegDimensions::default(), &JointAngles::default())
            .unwrap();
        assert_relative_eq!(p, Position::new(4.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_bindings_cover_every_symbol() {
        let leg = Leg::symbolic();
        let env = leg
            .bindings(&LegDimensions::default(), &JointAngles::default())
            .unwrap();
        let chain = leg.forward_chain().unwrap();
        for entry in chain.entries() {
            for symbol in entry.free_symbols() {
                assert!(env.contains_key(&symbol), "{} unbound", symbol);
            }
        }
    }

    #[test]
    fn test_orientation_inverse_is_symbolic_identity_at_zero() {
        let o = Orientation::symbolic();
        let zero = HashMap::from([
            (o.yaw.clone(), Expr::int(0)),
            (o.pitch.clone(), Expr::int(0)),
            (o.roll.clone(), Expr::int(0)),
        ]);
        assert_eq!(o.matrix().unwrap().subs(&zero), Matrix::identity(4));
        assert_eq!(o.inverse_matrix().unwrap().subs(&zero), Matrix::identity(4));
    }

    #[test]
    fn test_composed_chains_invert() {
        let leg = Leg::symbolic();
        let o = Orientation::symbolic();
        let dims = LegDimensions {
            body: Position::new(0.2, -0.1, 0.3),
            mount: Position::new(1.0, 0.0, 0.5),
            ..Default::default()
        };
        let pose = JointAngles {
            coxa: 0.4,
            femur: 0.3,
            tibia: 0.5,
        };
        let mut env = leg.bindings(&dims, &pose).unwrap();
        o.bind(0.1, -0.2, 0.15, &mut env);

        let forward = leg.oriented_chain(&o).unwrap().eval(&env).unwrap();
        let inverse = leg.inverse_chain(&o).unwrap().eval(&env).unwrap();
        assert_relative_eq!(inverse * forward, DMatrix::identity(4, 4), epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn prop_orientation_inverse(
            yaw in -3.0..3.0f64,
            pitch in -3.0..3.0f64,
            roll in -3.0..3.0f64,
        ) {
            let o = Orientation::symbolic();
            let mut env = HashMap::new();
            o.bind(yaw, pitch, roll, &mut env);
            let m = o.matrix().unwrap().eval(&env).unwrap();
            let inv = o.inverse_matrix().unwrap().eval(&env).unwrap();
            prop_assert!((m * inv - DMatrix::identity(4, 4)).amax() < 1e-9);
        }

        #[test]
        fn prop_inverse_chain_undoes_oriented_chain(
            angles in prop::array::uniform3(-3.0..3.0f64),
            attitude in prop::array::uniform3(-1.0..1.0f64),
            body in prop::array::uniform3(-2.0..2.0f64),
            mount in prop::array::uniform3(-2.0..2.0f64),
        ) {
            let leg = Leg::symbolic();
            let o = Orientation::symbolic();
            let dims = LegDimensions {
                body: Position::from(body),
                mount: Position::from(mount),
                coxa: 0.5,
                femur: 1.5,
                tibia: 2.0,
            };
            let pose = JointAngles { coxa: angles[0], femur: angles[1], tibia: angles[2] };
            let mut env = leg.bindings(&dims, &pose).unwrap();
            o.bind(attitude[0], attitude[1], attitude[2], &mut env);

            let forward = numeric(&leg.oriented_transforms(&o).unwrap(), &env);
            let inverse = numeric(&leg.inverse_transforms(&o).unwrap(), &env);
            prop_assert!((inverse * forward - DMatrix::identity(4, 4)).amax() < 1e-9);
        }
    }
}
