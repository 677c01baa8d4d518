use serde::{Deserialize, Serialize};

use crate::{
    EvaluationError, IterationRecord, SolveError, SolveResult, ValidationError, trace::TraceSink,
};

mod coordinate;
mod newton;

pub use coordinate::{CoordinateSample, CoordinateSolver};
pub use newton::{NewtonSample, NewtonSolver, Target};

/// A partial derivative smaller than this (in absolute value) counts as zero.
pub const DEGENERATE_GRADIENT: f64 = 1e-12;

/// A matrix whose smallest singular value is at most this fraction of its
/// largest singular value counts as singular.
pub const SINGULAR_RCOND: f64 = 1e-12;

/// Default for [`Config::tolerance`].
pub const DEFAULT_TOLERANCE: f64 = 1e-7;

/// Default for [`Config::max_iterations`].
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Settings for one solve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How close is close enough to stop.
    /// Compared against the step size, or the gradient norm, depending on the solver.
    pub tolerance: f64,
    /// Give up after this many iterations.
    pub max_iterations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Config {
    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Check the tolerance is positive and finite and the cap allows at least one iteration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ValidationError::InvalidTolerance {
                tolerance: self.tolerance,
            });
        }
        if self.max_iterations == 0 {
            return Err(ValidationError::ZeroIterations);
        }
        Ok(())
    }
}

/// The two moments a solver checks for convergence.
#[derive(Debug)]
pub enum Checkpoint<'a, S> {
    /// Derivatives were just evaluated at the current point, before stepping.
    Evaluated(&'a S),
    /// A step was just taken and recorded.
    Stepped(&'a IterationRecord),
}

/// An iterative root or stationary-point finder.
///
/// Each implementation owns its loop in [`Solver::solve`]; the other methods are the
/// pieces that loop is built from, exposed so they can be tested on their own.
pub trait Solver {
    /// What gets evaluated at each point.
    type Sample;

    /// Evaluate everything the next step needs at `x`.
    fn sample(&self, x: &[f64]) -> Result<Self::Sample, EvaluationError>;

    /// True if no step can be computed from this sample.
    fn is_degenerate(&self, sample: &Self::Sample) -> bool;

    /// True if the solve should stop here with a solution.
    fn is_converged(&self, checkpoint: Checkpoint<'_, Self::Sample>) -> bool;

    /// Compute the next point and record how it was reached.
    fn step(
        &self,
        iteration: usize,
        x: &[f64],
        sample: Self::Sample,
    ) -> Result<IterationRecord, SolveError>;

    /// Iterate from `initial_guess` until converged, stuck, failed or out of iterations.
    fn solve(&self, initial_guess: &[f64], sink: &mut dyn TraceSink) -> SolveResult;
}

/// Euclidean norm.
pub(crate) fn norm(v: &[f64]) -> f64 {
    libm::sqrt(v.iter().map(|x| x * x).sum())
}
