//! Diagnostics emitted while solving.
//!
//! Solvers never log directly. Instead they report [`Event`]s to whatever
//! [`TraceSink`] the caller passes in. Use [`NoTrace`] to ignore them, or
//! [`TracingSink`] to forward them to the `tracing` ecosystem.

use crate::{Config, IterationRecord, Method, SolveError};

/// Something that happened during a solve.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum Event<'a> {
    /// A solve was requested. Sent before the inputs are validated.
    Started {
        /// Which algorithm was asked for.
        method: Method,
        /// Expression text, as given.
        expressions: &'a [String],
        /// Variable names, as given.
        variables: &'a [String],
        /// Starting point.
        initial_guess: &'a [f64],
        /// Tolerance and iteration cap.
        config: &'a Config,
    },
    /// An iteration finished and was appended to the trace.
    Iteration(&'a IterationRecord),
    /// The solve converged.
    Converged {
        /// How many iterations were recorded.
        iterations: usize,
        /// The converged point.
        solution: &'a [f64],
    },
    /// The solve ended without a solution.
    Stopped {
        /// How many iterations were recorded.
        iterations: usize,
        /// Why it stopped.
        error: &'a SolveError,
    },
}

/// Receives diagnostics from a solve.
pub trait TraceSink {
    /// Called for each event, in order.
    fn record(&mut self, event: &Event<'_>);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn record(&mut self, _event: &Event<'_>) {}
}

/// Forwards events to `tracing`.
/// Iterations and convergence are logged at INFO, running out of iterations
/// at WARN and every other failure at ERROR.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    #[mutants::skip]
    fn record(&mut self, event: &Event<'_>) {
        match event {
            Event::Started {
                method,
                expressions,
                variables,
                initial_guess,
                config,
            } => tracing::info!(
                ?method,
                ?expressions,
                ?variables,
                ?initial_guess,
                tolerance = config.tolerance,
                max_iterations = config.max_iterations,
                "Starting solve"
            ),
            Event::Iteration(record) => tracing::info!(
                iteration = record.iteration(),
                x = ?record.x(),
                fx = ?record.fx(),
                x_new = ?record.x_new(),
                "Iteration finished"
            ),
            Event::Converged {
                iterations,
                solution,
            } => tracing::info!(iterations, ?solution, "Converged"),
            Event::Stopped {
                iterations,
                error: error @ SolveError::Exhausted { .. },
            } => tracing::warn!(iterations, %error, "Gave up"),
            Event::Stopped { iterations, error } => {
                tracing::error!(iterations, %error, "Solve failed");
            }
        }
    }
}

/// Events that don't borrow anything, so tests can keep them after the solve.
#[cfg(test)]
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Recorded {
    Started,
    Iteration(usize),
    Converged(usize),
    Stopped(usize, String),
}

/// Remembers every event.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub events: Vec<Recorded>,
}

#[cfg(test)]
impl TraceSink for Recorder {
    fn record(&mut self, event: &Event<'_>) {
        let recorded = match event {
            Event::Started { .. } => Recorded::Started,
            Event::Iteration(record) => Recorded::Iteration(record.iteration()),
            Event::Converged { iterations, .. } => Recorded::Converged(*iterations),
            Event::Stopped { iterations, error } => Recorded::Stopped(*iterations, error.to_string()),
        };
        self.events.push(recorded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_sink_handles_every_event() {
        // Nothing is installed to collect the output, this just makes sure nothing panics.
        let record = IterationRecord::coordinate(1, vec![0.0], 1.0, vec![1.0], vec![-1.0]);
        let names = vec!["x".to_owned()];
        let exhausted = SolveError::Exhausted { max_iterations: 1 };
        let degenerate = SolveError::DegenerateGradient;
        let mut sink = TracingSink;
        for event in [
            Event::Started {
                method: Method::Coordinate,
                expressions: &names,
                variables: &names,
                initial_guess: &[0.0],
                config: &Config::default(),
            },
            Event::Iteration(&record),
            Event::Converged {
                iterations: 1,
                solution: &[-1.0],
            },
            Event::Stopped {
                iterations: 1,
                error: &exhausted,
            },
            Event::Stopped {
                iterations: 0,
                error: &degenerate,
            },
        ] {
            sink.record(&event);
        }
    }
}
