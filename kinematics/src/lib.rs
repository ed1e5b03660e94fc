use nalgebra::Vector3;
use symbolic::{Matrix, SymbolicError};

pub mod closed_form;
pub mod leg;
pub mod transform;

pub use closed_form::{ClosedFormIk, JointExprs};
pub use leg::{Hinge, Leg, LegDimensions, Orientation};

#[derive(Debug, Clone, thiserror::Error)]
pub enum KinematicsError {
    #[error(transparent)]
    Symbolic(#[from] SymbolicError),

    #[error("expected a 4x1 homogeneous vector, got {rows}x{cols}")]
    NotAVector { rows: usize, cols: usize },

    #[error("target {0:?} is out of reach")]
    Unreachable(Position),
}

pub type Result<T> = std::result::Result<T, KinematicsError>;

/// Coxa, femur and tibia angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointAngles {
    pub coxa: f64,
    pub femur: f64,
    pub tibia: f64,
}

impl Default for JointAngles {
    fn default() -> Self {
        Self {
            coxa: 0.0,
            femur: 0.0,
            tibia: 0.0,
        }
    }
}

pub type Position = Vector3<f64>;

pub trait ForwardKinematics {
    /// The composed homogeneous transform from the world frame to the foot
    fn forward_kinematics(&self) -> Result<Matrix>;
}
