//! A basic example for how to use the solver.
use nrsolve::{Config, ExpressionSpec, solve_coordinate, solve_newton};

fn main() {
    // Where does the circle of radius 2 cross the line y = x?
    let spec = ExpressionSpec::system(&["x^2 + y^2 - 4", "x - y"], &["x", "y"]);

    // Start somewhere near the answer in the first quadrant.
    let outcome = solve_newton(&spec, &[1.0, 2.0], Config::default());

    // Check the outcome.
    match outcome.into_result() {
        Ok(solution) => {
            let [x, y] = solution[..] else {
                unreachable!("two variables give a two-element solution")
            };
            println!("x = {x}, y = {y}");
            assert!((x - y).abs() < 1e-9);
        }
        Err(e) => {
            eprintln!("nrsolve could not solve this system: {e}");
        }
    }

    // The coordinate-wise method works on a single expression.
    // Each iteration is recorded, so we can see how it got there.
    let spec = ExpressionSpec::scalar("x^3 - 2*x - 5", &["x"]);
    let outcome = solve_coordinate(&spec, &[2.0], Config::default().with_tolerance(1e-10));
    for record in outcome.iterations() {
        println!(
            "iteration {}: x = {:?}, f(x) = {:?}",
            record.iteration(),
            record.x(),
            record.fx()
        );
    }
    match outcome.message() {
        None => println!("converged to {:?}", outcome.solution()),
        Some(message) => eprintln!("{message}"),
    }
}
