//! Symbolic inverse-kinematics derivations for one leg
//!
//! Each pipeline builds a transform chain, equates the resulting point
//! with a target, solves for the coxa angle and tidies the result with
//! common-subexpression elimination.

use kinematics::transform::{apply, origin, vector};
use kinematics::{KinematicsError, Leg, Orientation};
use log::{debug, info};
use std::fmt;
use symbolic::{Cse, Equation, Matrix, Roots, Solution, Symbol, SymbolicError, cse, solve};

#[derive(Debug, thiserror::Error)]
pub enum DerivationError {
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),

    #[error(transparent)]
    Symbolic(#[from] SymbolicError),

    #[error("cannot solve for {unknown}")]
    Unsolved {
        unknown: Symbol,
        #[source]
        source: SymbolicError,
    },
}

pub type Result<T> = std::result::Result<T, DerivationError>;

/// Everything a pipeline produced, in the order it was produced
#[derive(Debug, Clone)]
pub struct Derivation {
    pub name: &'static str,
    /// The simplified chain applied to its input point
    pub target: Matrix,
    /// Shared subexpressions of `target`, when the pipeline reports them
    pub target_cse: Option<Cse>,
    pub equations: Vec<Equation>,
    pub solution: Solution,
    /// The roots of `solution` after elimination
    pub roots: Cse,
}

impl Derivation {
    fn new(
        name: &'static str,
        target: Matrix,
        target_cse: Option<Cse>,
        equations: Vec<Equation>,
        unknown: &Symbol,
    ) -> Result<Self> {
        let solution = solve(&equations, unknown).map_err(|source| DerivationError::Unsolved {
            unknown: unknown.clone(),
            source,
        })?;
        let roots = cse(solution.roots.as_slice());
        info!(
            "{}: solved {} for {} ({} roots, {} conditions)",
            name,
            equations.len(),
            unknown,
            solution.roots.as_slice().len(),
            solution.conditions.len()
        );
        Ok(Self {
            name,
            target,
            target_cse,
            equations,
            solution,
            roots,
        })
    }
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.name)?;
        writeln!(f, "target:")?;
        match &self.target_cse {
            Some(reduced) => {
                for (symbol, value) in &reduced.replacements {
                    writeln!(f, "  {} = {}", symbol, value)?;
                }
                for entry in &reduced.reduced {
                    writeln!(f, "  [{}]", entry)?;
                }
            }
            None => {
                for entry in self.target.entries() {
                    writeln!(f, "  [{}]", entry)?;
                }
            }
        }

        let unknown = &self.solution.unknown;
        match &self.solution.roots {
            Roots::Unique(_) => writeln!(f, "{}:", unknown)?,
            Roots::Branches(roots) => writeln!(f, "{} ({} branches):", unknown, roots.len())?,
        }
        for (symbol, value) in &self.roots.replacements {
            writeln!(f, "  {} = {}", symbol, value)?;
        }
        for root in &self.roots.reduced {
            writeln!(f, "  {} = {}", unknown, root)?;
        }
        for condition in &self.solution.conditions {
            writeln!(f, "  where {} = 0", condition)?;
        }
        Ok(())
    }
}

/// Level body: the foot from the forward chain, solved for the coxa angle
pub fn basic() -> Result<Derivation> {
    let leg = Leg::symbolic();
    let target = leg.foot()?;
    debug!("basic: foot\n{}", target);

    let equations = Equation::from_matrices(&target, &vector("T"))?;
    Derivation::new("basic", target, None, equations, &leg.coxa.angle)
}

/// Oriented body: the target pulled back through the inverse chain must
/// land on the foot-tip origin
pub fn alternate() -> Result<Derivation> {
    let leg = Leg::symbolic();
    let orientation = Orientation::symbolic();
    info!("alternate: start");

    let target = apply(&leg.inverse_transforms(&orientation)?, &vector("T"))?;
    let target_cse = cse(target.entries());
    debug!(
        "alternate: target has {} shared subexpressions",
        target_cse.replacements.len()
    );

    let equations = Equation::from_matrices(&target, &origin())?;
    Derivation::new(
        "alternate",
        target,
        Some(target_cse),
        equations,
        &leg.coxa.angle,
    )
}
