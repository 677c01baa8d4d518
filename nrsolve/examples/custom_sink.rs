//! Watch a solve as it runs, by passing in your own trace sink.
//! Also shows how to compile a problem once and solve it from several starting points.
use nrsolve::{Config, Event, Method, TraceSink, compile, solve_compiled};

/// Prints how far each step moved.
#[derive(Default)]
struct StepPrinter {
    steps: usize,
}

impl TraceSink for StepPrinter {
    fn record(&mut self, event: &Event<'_>) {
        match event {
            Event::Iteration(record) => {
                self.steps += 1;
                println!("  step {}: moved {:.3e}", record.iteration(), record.max_change());
            }
            Event::Converged { solution, .. } => println!("  converged to {solution:?}"),
            Event::Stopped { error, .. } => println!("  stopped: {error}"),
            _ => {}
        }
    }
}

fn main() {
    // Rosenbrock's function has its only minimum at (1, 1).
    let evaluator = match compile(&["(1 - x)^2 + 100*(y - x^2)^2"], &["x", "y"]) {
        Ok(evaluator) => evaluator,
        Err(e) => {
            eprintln!("Could not compile: {e}");
            return;
        }
    };
    let names = evaluator.variables();
    for (name, partial) in names.iter().zip(&evaluator.partials()[0]) {
        println!("df/d{name} = {}", partial.display(names));
    }

    for guess in [[-1.2, 1.0], [0.0, 0.0], [2.0, 2.0]] {
        println!("Starting from {guess:?}");
        let mut sink = StepPrinter::default();
        let outcome = solve_compiled(
            Method::Stationary,
            &evaluator,
            &guess,
            Config::default(),
            &mut sink,
        );
        assert_eq!(sink.steps, outcome.iterations().len());
    }
}
