//! Newton-Raphson solving for small nonlinear problems, with a full per-iteration trace.
//!
//! Give it one expression (or one per equation), 1 to 3 variables and a starting point.
//! Two algorithms are available:
//!
//! - [`Method::Coordinate`] steps every variable separately with its own partial derivative.
//! - [`Method::Newton`] takes joint Newton steps, using the Jacobian of a square system
//!   or the Hessian of a single objective.
//!
//! ```
//! use nrsolve::{Config, ExpressionSpec, solve_newton};
//!
//! let spec = ExpressionSpec::scalar("x^2 - 4", &["x"]);
//! let result = solve_newton(&spec, &[3.0], Config::default());
//! let x = result.solution().unwrap()[0];
//! assert!((x - 2.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

pub use crate::error::{
    CompileError, EvaluationError, MatrixKind, Quantity, SolveError, ValidationError,
};
pub use crate::evaluator::{CompiledEvaluator, Evaluator, compile};
pub use crate::expression_spec::ExpressionSpec;
pub use crate::outcome::SolveResult;
pub use crate::record::IterationRecord;
pub use crate::solver::{
    Checkpoint, Config, CoordinateSample, CoordinateSolver, DEFAULT_MAX_ITERATIONS,
    DEFAULT_TOLERANCE, DEGENERATE_GRADIENT, NewtonSample, NewtonSolver, SINGULAR_RCOND, Solver,
    Target,
};
pub use crate::trace::{Event, NoTrace, TraceSink, TracingSink};
use crate::outcome::{Terminal, assemble};

/// Errors for every stage of a solve.
mod error;
/// Numeric interface the solvers use, and its implementation over parsed expressions.
mod evaluator;
/// Symbolic expressions: parsing, differentiation and printing.
pub mod expr;
/// The problem definition and its validation.
mod expression_spec;
/// Result assembly.
mod outcome;
/// One snapshot per iteration.
mod record;
/// The two Newton-Raphson variants.
mod solver;
/// Unit tests
#[cfg(test)]
mod tests;
/// Diagnostics.
pub mod trace;

/// Largest number of variables a problem can have.
pub const MAX_VARIABLES: usize = 3;

/// Which algorithm to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Update each variable independently using its own partial derivative.
    /// Needs a single scalar expression.
    Coordinate,
    /// Full Newton steps. Finds roots of a square system, or a stationary point
    /// of a single expression in 2 or 3 variables.
    #[default]
    Newton,
    /// Full Newton steps towards a stationary point (zero gradient) of a single
    /// expression, in any number of variables.
    Stationary,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Coordinate => write!(f, "coordinate-wise Newton-Raphson"),
            Method::Newton => write!(f, "Newton-Raphson"),
            Method::Stationary => write!(f, "Newton-Raphson (stationary point)"),
        }
    }
}

/// Validate, compile and solve, reporting progress to `sink`.
/// Never panics and never fails outright: every problem ends up in [`SolveResult::Error`].
pub fn solve(
    method: Method,
    spec: &ExpressionSpec,
    initial_guess: &[f64],
    config: Config,
    sink: &mut dyn TraceSink,
) -> SolveResult {
    sink.record(&Event::Started {
        method,
        expressions: &spec.expressions,
        variables: &spec.variables,
        initial_guess,
        config: &config,
    });
    if let Err(e) = spec.validate(method, initial_guess, &config) {
        return rejected(e.into(), sink);
    }
    match spec.compile() {
        Ok(evaluator) => solve_compiled(method, &evaluator, initial_guess, config, sink),
        Err(e) => rejected(e.into(), sink),
    }
}

/// Solve with an evaluator that's already been built.
/// The guess, the config and the evaluator's shape are checked before anything is evaluated.
pub fn solve_compiled<E: Evaluator + ?Sized>(
    method: Method,
    evaluator: &E,
    initial_guess: &[f64],
    config: Config,
    sink: &mut dyn TraceSink,
) -> SolveResult {
    if let Err(e) = check_guess(evaluator.num_variables(), initial_guess) {
        return rejected(e.into(), sink);
    }
    match method {
        Method::Coordinate => run(CoordinateSolver::new(evaluator, config), initial_guess, sink),
        Method::Newton => run(
            NewtonSolver::new(evaluator, config, Target::Auto),
            initial_guess,
            sink,
        ),
        Method::Stationary => run(
            NewtonSolver::new(evaluator, config, Target::Stationary),
            initial_guess,
            sink,
        ),
    }
}

/// One finite guess per variable. Evaluators don't know variable names,
/// so a bad guess is named by its 1-based position.
fn check_guess(variables: usize, initial_guess: &[f64]) -> Result<(), ValidationError> {
    if initial_guess.len() != variables {
        return Err(ValidationError::WrongNumberGuesses {
            variables,
            guesses: initial_guess.len(),
        });
    }
    match initial_guess.iter().position(|guess| !guess.is_finite()) {
        Some(i) => Err(ValidationError::NonFiniteGuess {
            variable: format!("variable {}", i + 1),
            value: initial_guess[i],
        }),
        None => Ok(()),
    }
}

fn run<S: Solver>(
    solver: Result<S, ValidationError>,
    initial_guess: &[f64],
    sink: &mut dyn TraceSink,
) -> SolveResult {
    match solver {
        Ok(solver) => solver.solve(initial_guess, sink),
        Err(e) => rejected(e.into(), sink),
    }
}

fn rejected(error: SolveError, sink: &mut dyn TraceSink) -> SolveResult {
    assemble(Terminal::Stopped(error), Vec::new(), sink)
}

/// Coordinate-wise Newton-Raphson on a single expression.
pub fn solve_coordinate(
    spec: &ExpressionSpec,
    initial_guess: &[f64],
    config: Config,
) -> SolveResult {
    solve(Method::Coordinate, spec, initial_guess, config, &mut NoTrace)
}

/// Full Newton-Raphson. Roots for a square system, otherwise a stationary point.
pub fn solve_newton(spec: &ExpressionSpec, initial_guess: &[f64], config: Config) -> SolveResult {
    solve(Method::Newton, spec, initial_guess, config, &mut NoTrace)
}

/// Full Newton-Raphson towards a point where the gradient vanishes.
pub fn solve_stationary(
    spec: &ExpressionSpec,
    initial_guess: &[f64],
    config: Config,
) -> SolveResult {
    solve(Method::Stationary, spec, initial_guess, config, &mut NoTrace)
}
