//! Closed-form inverse kinematics for a side-view leg
//!
//! The coxa turns about `y`; femur and tibia both hinge about the coxa
//! frame's `z` axis, so the foot lies in the plane picked by the coxa
//! angle. Targets are given relative to the coxa root.

use crate::leg::{Hinge, LegDimensions};
use crate::transform::{
    bind_vector, compose, evaluate_point, origin, rotate_y, rotate_z, translate, vector,
};
use crate::{JointAngles, KinematicsError, Position, Result};
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt;
use symbolic::{Expr, Matrix, Symbol};

/// Accepted distance between the target and the foot a solution reaches
pub const VERIFY_TOLERANCE: f64 = 1e-4;

/// One solution branch as expressions in the target and link lengths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointExprs {
    pub coxa: Expr,
    pub femur: Expr,
    pub tibia: Expr,
}

impl JointExprs {
    fn eval(&self, env: &HashMap<Symbol, f64>) -> Result<JointAngles> {
        Ok(JointAngles {
            coxa: self.coxa.eval(env)?,
            femur: self.femur.eval(env)?,
            tibia: self.tibia.eval(env)?,
        })
    }
}

impl fmt::Display for JointExprs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "coxa = {}", self.coxa)?;
        writeln!(f, "femur = {}", self.femur)?;
        write!(f, "tibia = {}", self.tibia)
    }
}

#[derive(Debug, Clone)]
pub struct ClosedFormIk {
    pub coxa: Hinge,
    pub femur: Hinge,
    pub tibia: Hinge,
    /// `[P_x, P_y, P_z, 1]`
    pub target: Matrix,
    branches: [JointExprs; 2],
    /// Tibia straight, femur pointing at the target
    straightened: JointExprs,
    /// Distance from the femur joint to the target
    reach: Expr,
}

impl ClosedFormIk {
    pub fn derive() -> Self {
        let coxa = Hinge::named("C");
        let femur = Hinge::named("F");
        let tibia = Hinge::named("T");
        let target = vector("P");

        let (x, y, z) = (
            target[(0, 0)].clone(),
            target[(1, 0)].clone(),
            target[(2, 0)].clone(),
        );
        let coxa_len = Expr::symbol(&coxa.length);
        let femur_len = Expr::symbol(&femur.length);
        let tibia_len = Expr::symbol(&tibia.length);
        let square = |e: &Expr| Expr::pow(e.clone(), Expr::int(2));

        let coxa_angle = Expr::atan2(-&z, x.clone());

        // In the leg plane: u outward from the femur joint, v up.
        let u = Expr::sqrt(square(&x) + square(&z)) - &coxa_len;
        let v = y;
        let cos_tibia = (square(&u) + square(&v) - square(&femur_len) - square(&tibia_len))
            / (Expr::int(2) * &femur_len * &tibia_len);

        let reach = Expr::sqrt(square(&u) + square(&v));
        let elbow = Expr::acos(cos_tibia);
        let branch = |tibia_angle: Expr| {
            let femur_angle = Expr::atan2(v.clone(), u.clone())
                - Expr::atan2(
                    &tibia_len * Expr::sin(tibia_angle.clone()),
                    &femur_len + &tibia_len * Expr::cos(tibia_angle.clone()),
                );
            JointExprs {
                coxa: coxa_angle.clone(),
                femur: femur_angle,
                tibia: tibia_angle,
            }
        };
        let branches = [branch(elbow.clone()), branch(-elbow)];
        let straightened = JointExprs {
            coxa: coxa_angle.clone(),
            femur: Expr::atan2(v.clone(), u.clone()),
            tibia: Expr::int(0),
        };

        debug!(
            "closed-form leg solution derived, {} nodes per branch",
            branches[0].femur.node_count() + branches[0].tibia.node_count()
        );

        Self {
            coxa,
            femur,
            tibia,
            target,
            branches,
            straightened,
            reach,
        }
    }

    pub fn branches(&self) -> &[JointExprs] {
        &self.branches
    }

    pub fn straightened(&self) -> &JointExprs {
        &self.straightened
    }

    /// Coxa root to foot
    pub fn chain(&self) -> Result<Matrix> {
        compose(&[
            rotate_y(&self.coxa.angle),
            translate(&self.coxa.length, 0, 0),
            rotate_z(&self.femur.angle),
            translate(&self.femur.length, 0, 0),
            rotate_z(&self.tibia.angle),
            translate(&self.tibia.length, 0, 0),
        ])
    }

    fn lengths(&self, dims: &LegDimensions) -> HashMap<Symbol, f64> {
        HashMap::from([
            (self.coxa.length.clone(), dims.coxa),
            (self.femur.length.clone(), dims.femur),
            (self.tibia.length.clone(), dims.tibia),
        ])
    }

    /// Foot position relative to the coxa root
    pub fn forward(&self, dims: &LegDimensions, angles: &JointAngles) -> Result<Position> {
        let mut env = self.lengths(dims);
        env.insert(self.coxa.angle.clone(), angles.coxa);
        env.insert(self.femur.angle.clone(), angles.femur);
        env.insert(self.tibia.angle.clone(), angles.tibia);
        let foot = self.chain()?.matmul(&origin())?;
        evaluate_point(&foot, &env)
    }

    /// Every branch that reaches `target`. A target beyond the femur and
    /// tibia's combined length gets the straightened leg instead.
    pub fn evaluate(&self, dims: &LegDimensions, target: &Position) -> Result<Vec<JointAngles>> {
        let mut env = self.lengths(dims);
        bind_vector(&self.target, target, &mut env)?;

        let mut solutions = Vec::new();
        for branch in &self.branches {
            let angles = branch.eval(&env)?;
            if [angles.coxa, angles.femur, angles.tibia]
                .iter()
                .all(|a| a.is_finite())
            {
                solutions.push(angles);
            } else {
                trace!("branch unreachable for {:?}", target);
            }
        }

        if !solutions.is_empty() {
            return Ok(solutions);
        }

        if self.reach.eval(&env)? > dims.femur + dims.tibia {
            let angles = self.straightened.eval(&env)?;
            if [angles.coxa, angles.femur].iter().all(|a| a.is_finite()) {
                debug!("{:?} out of reach, straightening the leg", target);
                return Ok(vec![angles]);
            }
        }
        Err(KinematicsError::Unreachable(*target))
    }

    /// Check that `solution` puts the foot on `target`
    pub fn verify_solution(
        &self,
        dims: &LegDimensions,
        target: &Position,
        solution: &JointAngles,
    ) -> Result<bool> {
        let reached = self.forward(dims, solution)?;
        Ok((reached - target).norm() < VERIFY_TOLERANCE)
    }
}
