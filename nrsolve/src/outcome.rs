use serde::Serialize;

use crate::{
    IterationRecord, SolveError,
    trace::{Event, TraceSink},
};

/// How a solve ended, plus every iteration it recorded on the way.
///
/// Serializes to
/// `{"status": "success", "solution": [...], "iterations": [...]}` or
/// `{"status": "error", "message": "...", "iterations": [...]}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SolveResult {
    /// A convergence criterion was met.
    Success {
        /// The converged point, one value per variable.
        solution: Vec<f64>,
        /// The full trace.
        iterations: Vec<IterationRecord>,
    },
    /// The solve stopped without a solution.
    Error {
        /// Human-readable description of what went wrong.
        message: String,
        /// Every iteration completed before stopping.
        iterations: Vec<IterationRecord>,
        /// The typed error behind `message`.
        #[serde(skip)]
        error: SolveError,
    },
}

impl SolveResult {
    /// Did the solve converge?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The converged point, if there was one.
    pub fn solution(&self) -> Option<&[f64]> {
        match self {
            Self::Success { solution, .. } => Some(solution),
            Self::Error { .. } => None,
        }
    }

    /// Why the solve failed, if it did.
    pub fn error(&self) -> Option<&SolveError> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error, .. } => Some(error),
        }
    }

    /// Human-readable failure message, if the solve failed.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { message, .. } => Some(message),
        }
    }

    /// Every recorded iteration, in order. Present for both outcomes.
    pub fn iterations(&self) -> &[IterationRecord] {
        match self {
            Self::Success { iterations, .. } | Self::Error { iterations, .. } => iterations,
        }
    }

    /// Drop the trace and keep just the outcome.
    pub fn into_result(self) -> Result<Vec<f64>, SolveError> {
        match self {
            Self::Success { solution, .. } => Ok(solution),
            Self::Error { error, .. } => Err(error),
        }
    }
}

/// Where a solver's loop ended up.
#[derive(Debug)]
pub(crate) enum Terminal {
    Converged(Vec<f64>),
    Stopped(SolveError),
}

/// Package a terminal state and its trace, and tell the sink how it ended.
pub(crate) fn assemble(
    terminal: Terminal,
    iterations: Vec<IterationRecord>,
    sink: &mut dyn TraceSink,
) -> SolveResult {
    match terminal {
        Terminal::Converged(solution) => {
            sink.record(&Event::Converged {
                iterations: iterations.len(),
                solution: &solution,
            });
            SolveResult::Success {
                solution,
                iterations,
            }
        }
        Terminal::Stopped(error) => {
            sink.record(&Event::Stopped {
                iterations: iterations.len(),
                error: &error,
            });
            SolveResult::Error {
                message: error.to_string(),
                iterations,
                error,
            }
        }
    }
}
