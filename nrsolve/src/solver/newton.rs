use faer::{Mat, prelude::Solve};
use serde::{Deserialize, Serialize};

use crate::{
    Config, EvaluationError, Evaluator, IterationRecord, MatrixKind, SolveError, SolveResult,
    ValidationError,
    outcome::{Terminal, assemble},
    trace::{Event, TraceSink},
};

use super::{Checkpoint, SINGULAR_RCOND, Solver, norm};

/// What the full Newton solver drives to zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// [`Target::Roots`] if there are as many expressions as variables,
    /// otherwise [`Target::Stationary`].
    #[default]
    Auto,
    /// Solve `F(x) = 0` for a square system, stepping with the Jacobian.
    Roots,
    /// Solve `∇f(x) = 0` for a single objective, stepping with the Hessian.
    Stationary,
}

/// A target with `Auto` resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Roots,
    Stationary,
}

/// Joint Newton-Raphson: solves `M(x) Δx = -g(x)` at each point.
///
/// For roots, `g` is the function values and `M` the Jacobian.
/// For stationary points, `g` is the gradient and `M` the Hessian.
///
/// There are two ways to converge: `‖g(x)‖ < tolerance` before stepping
/// (the current point is returned without a new record), or `‖Δx‖ < tolerance`
/// after stepping (`x_new` is returned). A singular `M` always stops the solve,
/// even where `g` vanishes.
pub struct NewtonSolver<'e, E: Evaluator + ?Sized> {
    evaluator: &'e E,
    config: Config,
    mode: Mode,
    matrix: MatrixKind,
}

/// Everything the full Newton step needs at one point.
#[derive(Clone, Debug, PartialEq)]
pub struct NewtonSample {
    /// Value of every expression.
    pub fx: Vec<f64>,
    /// The vector being driven to zero: `fx` itself, or the gradient.
    pub residual: Vec<f64>,
    /// Derivative of `residual`: the Jacobian or the Hessian.
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug)]
enum State {
    Iterating(Vec<f64>),
    Converged(Vec<f64>),
    Singular,
    Exhausted,
    Failed(SolveError),
}

impl<'e, E: Evaluator + ?Sized> NewtonSolver<'e, E> {
    /// Resolves the target against the evaluator's shape.
    /// Roots need one expression per variable; stationary points need exactly one expression.
    pub fn new(evaluator: &'e E, config: Config, target: Target) -> Result<Self, ValidationError> {
        config.validate()?;
        let expressions = evaluator.num_expressions();
        let variables = evaluator.num_variables();
        let mode = match target {
            Target::Auto | Target::Roots if expressions == variables => Mode::Roots,
            Target::Auto | Target::Stationary if expressions == 1 => Mode::Stationary,
            Target::Stationary => return Err(ValidationError::NotScalar { expressions }),
            Target::Auto | Target::Roots => {
                return Err(ValidationError::NotSquare {
                    expressions,
                    variables,
                });
            }
        };
        // A lone expression's derivative matrix is always reported as its Hessian,
        // including the 1x1 root-finding case.
        let matrix = match mode {
            Mode::Roots if expressions > 1 => MatrixKind::Jacobian,
            _ => MatrixKind::Hessian,
        };
        Ok(Self {
            evaluator,
            config,
            mode,
            matrix,
        })
    }

    /// Which target this solver ended up with. Never [`Target::Auto`].
    pub fn target(&self) -> Target {
        match self.mode {
            Mode::Roots => Target::Roots,
            Mode::Stationary => Target::Stationary,
        }
    }

    /// How a singular step matrix is reported: the Jacobian of a system,
    /// or the Hessian of a single expression.
    pub fn matrix_kind(&self) -> MatrixKind {
        self.matrix
    }

    fn check_shape(&self, sample: &NewtonSample) -> Result<(), EvaluationError> {
        let n = self.evaluator.num_variables();
        let expected_fx = self.evaluator.num_expressions();
        let wrong = if sample.fx.len() != expected_fx {
            Some((expected_fx, sample.fx.len()))
        } else if sample.residual.len() != n {
            Some((n, sample.residual.len()))
        } else if sample.matrix.len() != n {
            Some((n, sample.matrix.len()))
        } else {
            sample
                .matrix
                .iter()
                .find(|row| row.len() != n)
                .map(|row| (n, row.len()))
        };
        match wrong {
            Some((expected, found)) => Err(EvaluationError::WrongDimension { expected, found }),
            None => Ok(()),
        }
    }

    fn advance(
        &self,
        x: Vec<f64>,
        trace: &mut Vec<IterationRecord>,
        sink: &mut dyn TraceSink,
    ) -> State {
        if trace.len() >= self.config.max_iterations {
            return State::Exhausted;
        }
        let iteration = trace.len() + 1;
        let sample = match self.sample(&x) {
            Ok(sample) => sample,
            Err(source) => return State::Failed(SolveError::Evaluation { iteration, source }),
        };
        // Checked before the gradient criterion, so a flat point with
        // no usable curvature is reported rather than accepted.
        if self.is_degenerate(&sample) {
            return State::Singular;
        }
        if self.is_converged(Checkpoint::Evaluated(&sample)) {
            return State::Converged(x);
        }
        let record = match self.step(iteration, &x, sample) {
            Ok(record) => record,
            Err(e) => return State::Failed(e),
        };
        sink.record(&Event::Iteration(&record));
        let converged = self.is_converged(Checkpoint::Stepped(&record));
        let next = record.x_new.clone();
        trace.push(record);
        if converged {
            State::Converged(next)
        } else {
            State::Iterating(next)
        }
    }
}

fn to_mat(matrix: &[Vec<f64>]) -> Mat<f64> {
    let n = matrix.len();
    Mat::from_fn(n, n, |i, j| matrix[i][j])
}

/// Singular if every singular value is zero, if the smallest is negligible
/// next to the largest, or if the SVD itself fails.
fn is_singular(matrix: &[Vec<f64>]) -> bool {
    if matrix.is_empty() {
        return true;
    }
    let Ok(svd) = to_mat(matrix).svd() else {
        return true;
    };
    let sigma = svd.S().column_vector();
    let largest = sigma.iter().copied().fold(0.0, libm::fmax);
    let smallest = sigma.iter().copied().fold(f64::INFINITY, libm::fmin);
    largest == 0.0 || smallest <= SINGULAR_RCOND * largest
}

impl<E: Evaluator + ?Sized> Solver for NewtonSolver<'_, E> {
    type Sample = NewtonSample;

    fn sample(&self, x: &[f64]) -> Result<NewtonSample, EvaluationError> {
        let fx = self.evaluator.value(x)?;
        let sample = match self.mode {
            Mode::Roots => NewtonSample {
                residual: fx.clone(),
                matrix: self.evaluator.jacobian(x)?,
                fx,
            },
            Mode::Stationary => NewtonSample {
                residual: self.evaluator.gradient(x)?,
                matrix: self.evaluator.hessian(x)?,
                fx,
            },
        };
        self.check_shape(&sample)?;
        Ok(sample)
    }

    /// True if the Jacobian or Hessian can't be inverted.
    fn is_degenerate(&self, sample: &NewtonSample) -> bool {
        is_singular(&sample.matrix)
    }

    fn is_converged(&self, checkpoint: Checkpoint<'_, NewtonSample>) -> bool {
        match checkpoint {
            Checkpoint::Evaluated(sample) => norm(&sample.residual) < self.config.tolerance,
            Checkpoint::Stepped(record) => record
                .delta_x()
                .is_some_and(|dx| norm(dx) < self.config.tolerance),
        }
    }

    fn step(
        &self,
        iteration: usize,
        x: &[f64],
        sample: NewtonSample,
    ) -> Result<IterationRecord, SolveError> {
        let NewtonSample {
            fx,
            residual,
            matrix,
        } = sample;
        let n = residual.len();
        let lu = to_mat(&matrix).full_piv_lu();
        let rhs = Mat::from_fn(n, 1, |i, _| -residual[i]);
        let solution = lu.solve(rhs.as_ref());
        let delta_x: Vec<f64> = (0..n).map(|i| solution[(i, 0)]).collect();
        if delta_x.iter().any(|d| !d.is_finite()) {
            return Err(SolveError::SingularMatrix {
                matrix: self.matrix,
            });
        }
        let x_new = x.iter().zip(&delta_x).map(|(xi, di)| xi + di).collect();
        let record = match self.mode {
            Mode::Roots => IterationRecord::roots(iteration, x.to_vec(), fx, matrix, delta_x, x_new),
            Mode::Stationary => IterationRecord::stationary(
                iteration,
                x.to_vec(),
                fx[0],
                residual,
                matrix,
                delta_x,
                x_new,
            ),
        };
        Ok(record)
    }

    fn solve(&self, initial_guess: &[f64], sink: &mut dyn TraceSink) -> SolveResult {
        let mut trace = Vec::new();
        let mut state = State::Iterating(initial_guess.to_vec());
        let terminal = loop {
            state = match state {
                State::Iterating(x) => self.advance(x, &mut trace, sink),
                State::Converged(solution) => break Terminal::Converged(solution),
                State::Singular => {
                    break Terminal::Stopped(SolveError::SingularMatrix {
                        matrix: self.matrix,
                    });
                }
                State::Exhausted => {
                    break Terminal::Stopped(SolveError::Exhausted {
                        max_iterations: self.config.max_iterations,
                    });
                }
                State::Failed(e) => break Terminal::Stopped(e),
            };
        };
        assemble(terminal, trace, sink)
    }
}
