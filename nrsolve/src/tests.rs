use super::*;
use crate::trace::{Recorded, Recorder};

mod proptests;

const EPSILON: f64 = 1e-6;

#[track_caller]
pub(crate) fn assert_nearly_eq(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPSILON,
        "expected {expected}, got {actual}"
    );
}

fn config(tolerance: f64, max_iterations: usize) -> Config {
    Config::default()
        .with_tolerance(tolerance)
        .with_max_iterations(max_iterations)
}

#[test]
fn newton_one_variable() {
    let spec = ExpressionSpec::scalar("x^2 - 4", &["x"]);
    let result = solve_newton(&spec, &[3.0], config(1e-7, 50));
    assert!(result.is_success(), "{:?}", result.message());
    assert_nearly_eq(result.solution().unwrap()[0], 2.0);
    // Every record is consecutive and chains onto the next.
    for (i, pair) in result.iterations().windows(2).enumerate() {
        assert_eq!(pair[0].iteration(), i + 1);
        assert_eq!(pair[0].x_new(), pair[1].x());
    }
}

#[test]
fn newton_singular_at_the_start() {
    let spec = ExpressionSpec::scalar("x^3", &["x"]);
    let result = solve_newton(&spec, &[0.0], Config::default());
    assert!(!result.is_success());
    let message = result.message().unwrap();
    assert!(message.contains("Hessian is singular"), "{message}");
    assert!(result.iterations().is_empty());
}

#[test]
fn coordinate_constant_function() {
    let spec = ExpressionSpec::scalar("5", &["x", "y"]);
    let result = solve_coordinate(&spec, &[1.0, 1.0], Config::default());
    assert!(
        result
            .message()
            .unwrap()
            .contains("Gradient is zero or close to zero")
    );
    assert!(result.iterations().is_empty());
}

#[test]
fn both_solvers_exhaust_on_a_cycle() {
    let spec = ExpressionSpec::scalar("x^3 - 2*x + 2", &["x"]);
    for method in [Method::Coordinate, Method::Newton] {
        let result = solve(method, &spec, &[0.0], config(1e-7, 5), &mut NoTrace);
        assert_eq!(
            result.error(),
            Some(&SolveError::Exhausted { max_iterations: 5 }),
            "{method}"
        );
        assert!(result.message().unwrap().contains("Exceeded maximum iterations"));
        assert_eq!(result.iterations().len(), 5, "{method}");
    }
}

#[test]
fn four_variables_are_rejected_before_compiling() {
    // The expression doesn't even parse, so this proves compilation never ran.
    let spec = ExpressionSpec::scalar("((", &["w", "x", "y", "z"]);
    let mut sink = Recorder::default();
    let result = solve(
        Method::Newton,
        &spec,
        &[0.0; 4],
        Config::default(),
        &mut sink,
    );
    assert_eq!(
        result.error(),
        Some(&SolveError::Validation(ValidationError::TooManyVariables {
            count: 4
        }))
    );
    assert!(result.iterations().is_empty());
    assert!(matches!(
        sink.events.as_slice(),
        [Recorded::Started, Recorded::Stopped(0, _)]
    ));
}

#[test]
fn compile_errors_become_results() {
    let spec = ExpressionSpec::scalar("x + q", &["x"]);
    let result = solve_newton(&spec, &[0.0], Config::default());
    assert_eq!(
        result.message(),
        Some("Invalid function or variables: \"q\" is not one of the declared variables")
    );
    let spec = ExpressionSpec::scalar("x +", &["x"]);
    let result = solve_newton(&spec, &[0.0], Config::default());
    assert!(matches!(
        result.error(),
        Some(SolveError::Compile(CompileError::Parse { .. }))
    ));
}

#[test]
fn newton_stops_as_soon_as_the_step_is_small() {
    // A linear equation is solved exactly by the first step.
    let spec = ExpressionSpec::scalar("2*x - 4", &["x"]);
    let result = solve_newton(&spec, &[0.0], Config::default());
    assert_eq!(result.solution(), Some([2.0].as_slice()));
    assert_eq!(result.iterations().len(), 1);
}

#[test]
fn newton_stationary_points() {
    let spec = ExpressionSpec::scalar("(x - 1)^2 + (y - 2)^2", &["x", "y"]);
    let result = solve_newton(&spec, &[0.0, 0.0], Config::default());
    assert_eq!(result.solution(), Some([1.0, 2.0].as_slice()));
    assert_eq!(result.iterations().len(), 1);

    let spec = ExpressionSpec::scalar("(1 - x)^2 + 100*(y - x^2)^2", &["x", "y"]);
    let result = solve_newton(&spec, &[-1.2, 1.0], Config::default());
    let solution = result.solution().unwrap();
    assert_nearly_eq(solution[0], 1.0);
    assert_nearly_eq(solution[1], 1.0);

    let spec = ExpressionSpec::scalar("x^2 - 4", &["x"]);
    let result = solve_stationary(&spec, &[3.0], Config::default());
    assert_eq!(result.solution(), Some([0.0].as_slice()));
}

#[test]
fn newton_systems() {
    let spec = ExpressionSpec::system(&["x^2 + y^2 - 4", "x - y"], &["x", "y"]);
    let result = solve_newton(&spec, &[1.0, 2.0], Config::default());
    let solution = result.solution().unwrap();
    assert_nearly_eq(solution[0], std::f64::consts::SQRT_2);
    assert_nearly_eq(solution[1], std::f64::consts::SQRT_2);

    let spec = ExpressionSpec::system(&["x - 1", "y^2 - 4", "z^3 - 27"], &["x", "y", "z"]);
    let result = solve_newton(&spec, &[0.0, 1.0, 1.0], Config::default());
    let solution = result.solution().unwrap();
    assert_nearly_eq(solution[0], 1.0);
    assert_nearly_eq(solution[1], 2.0);
    assert_nearly_eq(solution[2], 3.0);
}

#[test]
fn coordinate_overshoots_when_every_variable_moves() {
    // Both coordinates take the full scalar step, so x + y - 3 bounces
    // between (0, 0) and (3, 3) instead of landing on the line.
    let spec = ExpressionSpec::scalar("x + y - 3", &["x", "y"]);
    let result = solve_coordinate(&spec, &[0.0, 0.0], config(1e-7, 10));
    assert_eq!(
        result.error(),
        Some(&SolveError::Exhausted { max_iterations: 10 })
    );
    let iterations = result.iterations();
    assert_eq!(iterations[0].x_new(), &[3.0, 3.0]);
    assert_eq!(iterations[1].x_new(), &[0.0, 0.0]);
}

#[test]
fn evaluation_error_before_the_first_step() {
    // The derivative of sqrt is infinite at 0.
    let spec = ExpressionSpec::scalar("sqrt(x) - 3", &["x"]);
    let result = solve_coordinate(&spec, &[0.0], Config::default());
    assert!(result.iterations().is_empty());
    assert_eq!(
        result.message(),
        Some("Error during iteration 1: the gradient is not finite (inf) at x = [0.0]")
    );
}

#[test]
fn evaluation_error_keeps_earlier_records() {
    // From 3, the step x - x*ln(x) lands below zero, where ln is undefined.
    let spec = ExpressionSpec::scalar("ln(x)", &["x"]);
    let result = solve_coordinate(&spec, &[3.0], Config::default());
    let [first] = result.iterations() else {
        panic!("expected one record, got {:?}", result.iterations());
    };
    assert!(first.x_new()[0] < 0.0);
    assert!(matches!(
        result.error(),
        Some(SolveError::Evaluation { iteration: 2, .. })
    ));
    assert!(
        result
            .message()
            .unwrap()
            .starts_with("Error during iteration 2: f(x) is not finite")
    );
}

#[test]
fn deterministic() {
    let spec = ExpressionSpec::system(&["x^2 + y^2 - 4", "x*y - 1"], &["x", "y"]);
    let a = solve_newton(&spec, &[2.0, 0.5], Config::default());
    let b = solve_newton(&spec, &[2.0, 0.5], Config::default());
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn events_arrive_in_order() {
    let spec = ExpressionSpec::scalar("x - 3", &["x"]);
    let mut sink = Recorder::default();
    let result = solve(
        Method::Coordinate,
        &spec,
        &[0.0],
        Config::default(),
        &mut sink,
    );
    assert!(result.is_success());
    assert_eq!(
        sink.events,
        vec![
            Recorded::Started,
            Recorded::Iteration(1),
            Recorded::Iteration(2),
            Recorded::Converged(2),
        ]
    );
}

#[test]
fn json_result() {
    let spec = ExpressionSpec::scalar("x^2 - 4", &["x"]);
    let result = solve_newton(&spec, &[3.0], Config::default());
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "success");
    let first = &json["iterations"][0];
    assert_eq!(first["iteration"], 1);
    assert_eq!(first["x"], serde_json::json!([3.0]));
    assert_eq!(first["f(x)"], 5.0);
    assert_eq!(first["jacobian"], serde_json::json!([[6.0]]));
    assert!(first["delta_x"].is_array());
    assert!(first["x_new"].is_array());
}

/// Counts every call into the wrapped evaluator.
struct Counting {
    inner: CompiledEvaluator,
    calls: std::cell::Cell<usize>,
}

impl Counting {
    fn new(expressions: &[&str], variables: &[&str]) -> Self {
        Self {
            inner: compile(expressions, variables).unwrap(),
            calls: std::cell::Cell::new(0),
        }
    }

    fn bump(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl Evaluator for Counting {
    fn num_variables(&self) -> usize {
        self.inner.num_variables()
    }

    fn num_expressions(&self) -> usize {
        self.inner.num_expressions()
    }

    fn value(&self, x: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.bump();
        self.inner.value(x)
    }

    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.bump();
        self.inner.gradient(x)
    }

    fn jacobian(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError> {
        self.bump();
        self.inner.jacobian(x)
    }

    fn hessian(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError> {
        self.bump();
        self.inner.hessian(x)
    }
}

#[test]
fn prebuilt_evaluators_check_the_guess_first() {
    let evaluator = Counting::new(&["x*y - 1"], &["x", "y"]);
    for method in [Method::Coordinate, Method::Newton, Method::Stationary] {
        let mut sink = Recorder::default();
        let result = solve_compiled(method, &evaluator, &[1.0], Config::default(), &mut sink);
        assert_eq!(
            result.error(),
            Some(&SolveError::Validation(ValidationError::WrongNumberGuesses {
                variables: 2,
                guesses: 1
            })),
            "{method}"
        );
        assert!(matches!(sink.events.as_slice(), [Recorded::Stopped(0, _)]));

        let result = solve_compiled(
            method,
            &evaluator,
            &[1.0, f64::INFINITY],
            Config::default(),
            &mut NoTrace,
        );
        assert_eq!(
            result.message(),
            Some("The initial guess for variable 2 must be finite, but it was inf")
        );
    }
    assert_eq!(evaluator.calls.get(), 0);

    // A good guess does reach the evaluator.
    let result = solve_compiled(
        Method::Newton,
        &evaluator,
        &[1.0, 2.0],
        Config::default(),
        &mut NoTrace,
    );
    assert!(result.is_success(), "{:?}", result.message());
    assert!(evaluator.calls.get() > 0);
}
