use proptest::prelude::*;

use crate::{
    Config, Evaluator, ExpressionSpec, Method, SolveResult, solve, solve_newton, trace::NoTrace,
    tests::assert_nearly_eq,
};

/// Norm of what the full Newton solver drives to zero at `x`:
/// the values of a square system, otherwise the gradient.
fn residual_norm(method: Method, spec: &ExpressionSpec, x: &[f64]) -> f64 {
    let evaluator = spec.compile().unwrap();
    let square = evaluator.num_expressions() == evaluator.num_variables();
    let residual = match method {
        Method::Newton if square => evaluator.value(x),
        _ => evaluator.gradient(x),
    }
    .unwrap();
    libm::sqrt(residual.iter().map(|r| r * r).sum())
}

fn converged_within_tolerance(
    result: &SolveResult,
    method: Method,
    spec: &ExpressionSpec,
    config: &Config,
) -> bool {
    let Some(solution) = result.solution() else {
        return true;
    };
    match (method, result.iterations().last()) {
        (Method::Coordinate, Some(last)) => {
            last.max_change() < config.tolerance && last.x_new() == solution
        }
        (Method::Coordinate, None) => false,
        (_, last) => {
            let stepped = last.is_some_and(|r| {
                r.x_new() == solution
                    && r.delta_x()
                        .is_some_and(|dx| libm::sqrt(dx.iter().map(|d| d * d).sum()) < config.tolerance)
            });
            // Otherwise the gradient criterion must have held at the returned point,
            // which is where the last record ended (or the guess, if nothing was recorded).
            let flat = last.is_none_or(|r| r.x_new() == solution)
                && residual_norm(method, spec, solution) < config.tolerance;
            stepped || flat
        }
    }
}

proptest! {
    #[test]
    fn quadratic_roots(root in -50.0f64..50.0, offset in 0.5f64..20.0) {
        // A guess right of the root converges to it monotonically.
        let guess = root + offset;
        let spec = ExpressionSpec::scalar(format!("(x - ({root}))*(x - ({root}) + 1)"), &["x"]);
        let result = solve_newton(&spec, &[guess], Config::default());
        prop_assert!(result.is_success(), "{:?}", result.message());
        assert_nearly_eq(result.solution().unwrap()[0], root);
    }

    #[test]
    fn trace_never_exceeds_the_cap(
        guess in -10.0f64..10.0,
        max_iterations in 1usize..20,
        method in prop_oneof![Just(Method::Coordinate), Just(Method::Newton)],
    ) {
        let config = Config::default().with_max_iterations(max_iterations);
        let spec = ExpressionSpec::scalar("x^3 - 2*x + 2", &["x"]);
        let result = solve(method, &spec, &[guess], config, &mut NoTrace);
        prop_assert!(result.iterations().len() <= max_iterations);
        for (i, record) in result.iterations().iter().enumerate() {
            prop_assert_eq!(record.iteration(), i + 1);
        }
    }

    #[test]
    fn success_means_a_criterion_held(
        x in -3.0f64..3.0,
        y in -3.0f64..3.0,
        tolerance in 1e-10f64..1e-3,
        method in prop_oneof![
            Just(Method::Coordinate),
            Just(Method::Newton),
            Just(Method::Stationary),
        ],
    ) {
        let config = Config::default().with_tolerance(tolerance);
        let spec = ExpressionSpec::scalar("x^2 + 2*y^2 - x*y - 4", &["x", "y"]);
        let result = solve(method, &spec, &[x, y], config, &mut NoTrace);
        prop_assert!(converged_within_tolerance(&result, method, &spec, &config));
    }

    #[test]
    fn system_success_means_a_criterion_held(
        x in -3.0f64..3.0,
        y in -3.0f64..3.0,
        tolerance in 1e-10f64..1e-3,
    ) {
        let config = Config::default().with_tolerance(tolerance);
        let spec = ExpressionSpec::system(&["x^2 + y^2 - 4", "x*y - 1"], &["x", "y"]);
        let result = solve(Method::Newton, &spec, &[x, y], config, &mut NoTrace);
        prop_assert!(converged_within_tolerance(&result, Method::Newton, &spec, &config));
    }

    #[test]
    fn deterministic(x in -2.0f64..2.0, y in -2.0f64..2.0) {
        let spec = ExpressionSpec::system(&["x^2 - y - 1", "x - y^2 + 1"], &["x", "y"]);
        let first = solve_newton(&spec, &[x, y], Config::default());
        let second = solve_newton(&spec, &[x, y], Config::default());
        prop_assert_eq!(first, second);
    }
}
