use crate::{
    Config, EvaluationError, Evaluator, IterationRecord, SolveError, SolveResult, ValidationError,
    outcome::{Terminal, assemble},
    trace::{Event, TraceSink},
};

use super::{Checkpoint, DEGENERATE_GRADIENT, Solver};

/// Newton-Raphson applied to each coordinate separately.
///
/// Every coordinate takes its own scalar Newton step using the shared function
/// value and its own partial derivative:
/// `x_new[i] = x[i] - f(x) / df/dx_i(x)`.
/// This is not a joint Newton step. In more than one variable it converges to
/// some point where `f = 0`, not necessarily the nearest one, and it can cycle.
///
/// Because all coordinates share the one function value, only a single
/// scalar expression is accepted.
pub struct CoordinateSolver<'e, E: Evaluator + ?Sized> {
    evaluator: &'e E,
    config: Config,
}

/// Function value and gradient at one point.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateSample {
    /// f(x)
    pub fx: f64,
    /// One partial derivative per variable.
    pub gradient: Vec<f64>,
}

#[derive(Debug)]
enum State {
    Iterating(Vec<f64>),
    Converged(Vec<f64>),
    Degenerate,
    Exhausted,
    Failed(SolveError),
}

impl<'e, E: Evaluator + ?Sized> CoordinateSolver<'e, E> {
    /// Fails if the evaluator has more than one expression, or the config is invalid.
    pub fn new(evaluator: &'e E, config: Config) -> Result<Self, ValidationError> {
        config.validate()?;
        let expressions = evaluator.num_expressions();
        if expressions != 1 {
            return Err(ValidationError::NotScalar { expressions });
        }
        Ok(Self { evaluator, config })
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
        if self.is_degenerate(&sample) {
            return State::Degenerate;
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

impl<E: Evaluator + ?Sized> Solver for CoordinateSolver<'_, E> {
    type Sample = CoordinateSample;

    fn sample(&self, x: &[f64]) -> Result<CoordinateSample, EvaluationError> {
        let values = self.evaluator.value(x)?;
        let fx = values
            .first()
            .copied()
            .ok_or(EvaluationError::WrongDimension {
                expected: 1,
                found: 0,
            })?;
        let gradient = self.evaluator.gradient(x)?;
        if gradient.len() != x.len() {
            return Err(EvaluationError::WrongDimension {
                expected: x.len(),
                found: gradient.len(),
            });
        }
        Ok(CoordinateSample { fx, gradient })
    }

    fn is_degenerate(&self, sample: &CoordinateSample) -> bool {
        sample.gradient.iter().all(|d| d.abs() < DEGENERATE_GRADIENT)
    }

    /// Converged once no coordinate moved by `tolerance` or more.
    /// The gradient alone never signals convergence.
    fn is_converged(&self, checkpoint: Checkpoint<'_, CoordinateSample>) -> bool {
        match checkpoint {
            Checkpoint::Evaluated(_) => false,
            Checkpoint::Stepped(record) => record.max_change() < self.config.tolerance,
        }
    }

    fn step(
        &self,
        iteration: usize,
        x: &[f64],
        sample: CoordinateSample,
    ) -> Result<IterationRecord, SolveError> {
        let CoordinateSample { fx, gradient } = sample;
        let x_new = x
            .iter()
            .zip(&gradient)
            .map(|(&xi, &di)| {
                // Coordinates with a flat partial derivative stay put.
                if di.abs() > DEGENERATE_GRADIENT {
                    xi - fx / di
                } else {
                    xi
                }
            })
            .collect();
        Ok(IterationRecord::coordinate(
            iteration,
            x.to_vec(),
            fx,
            gradient,
            x_new,
        ))
    }

    fn solve(&self, initial_guess: &[f64], sink: &mut dyn TraceSink) -> SolveResult {
        let mut trace = Vec::new();
        let mut state = State::Iterating(initial_guess.to_vec());
        let terminal = loop {
            state = match state {
                State::Iterating(x) => self.advance(x, &mut trace, sink),
                State::Converged(solution) => break Terminal::Converged(solution),
                State::Degenerate => break Terminal::Stopped(SolveError::DegenerateGradient),
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
