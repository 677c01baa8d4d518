use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use nrsolve::{Config, ExpressionSpec, IterationRecord, Method, SolveResult, TracingSink, solve};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nrsolve", version, about, long_about = None)]
struct Cli {
    /// Path to a JSON request file.
    /// Use '-' for stdin.
    #[arg(
        short = 'f',
        long,
        conflicts_with_all = ["expressions", "variables", "guesses"]
    )]
    request: Option<PathBuf>,

    /// Expression to solve. Repeat it to give a system of equations.
    #[arg(short = 'e', long = "expression")]
    expressions: Vec<String>,

    /// Variable name. Repeat it for up to 3 variables.
    #[arg(short = 'v', long = "variable")]
    variables: Vec<String>,

    /// Initial guess for each variable, in the same order.
    #[arg(short = 'g', long = "guess", allow_negative_numbers = true)]
    guesses: Vec<f64>,

    /// Which algorithm to run. Overrides the request file.
    #[arg(short = 'm', long, value_enum)]
    method: Option<MethodArg>,

    /// Convergence tolerance. Overrides the request file.
    #[arg(short = 't', long)]
    tolerance: Option<f64>,

    /// Most iterations to run. Overrides the request file.
    #[arg(short = 'n', long = "max-iterations")]
    max_iterations: Option<usize>,

    /// Print the result as JSON instead of a summary.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Show every iteration.
    #[arg(long = "show-iterations")]
    show_iterations: bool,

    /// Show the symbolic derivatives the solver used.
    #[arg(long = "show-derivatives")]
    show_derivatives: bool,

    /// Log solver progress to stderr. `RUST_LOG` takes precedence.
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Coordinate,
    Newton,
    Stationary,
}

impl From<MethodArg> for Method {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Coordinate => Method::Coordinate,
            MethodArg::Newton => Method::Newton,
            MethodArg::Stationary => Method::Stationary,
        }
    }
}

/// A problem, as read from a request file.
/// `function` is a single expression, `expressions` a list of them. Both may be given.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SolveRequest {
    function: Option<String>,
    expressions: Vec<String>,
    variables: Vec<String>,
    initial_guesses: Vec<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
    method: Option<Method>,
}

impl SolveRequest {
    /// Read the request file if there is one, otherwise use the inline arguments.
    /// Flags given on the command line win over the file.
    fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut request = match &cli.request {
            Some(path) => {
                let text = read_request(path)?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Could not parse request {}", path.display()))?
            }
            None if cli.expressions.is_empty() => {
                bail!("Nothing to solve. Pass an expression with -e, or a request file with -f")
            }
            None => SolveRequest {
                expressions: cli.expressions.clone(),
                variables: cli.variables.clone(),
                initial_guesses: cli.guesses.clone(),
                ..Default::default()
            },
        };
        if let Some(method) = cli.method {
            request.method = Some(method.into());
        }
        if let Some(tolerance) = cli.tolerance {
            request.tolerance = Some(tolerance);
        }
        if let Some(max_iterations) = cli.max_iterations {
            request.max_iterations = Some(max_iterations);
        }
        Ok(request)
    }

    fn spec(&self) -> ExpressionSpec {
        ExpressionSpec {
            expressions: self
                .function
                .iter()
                .chain(&self.expressions)
                .cloned()
                .collect(),
            variables: self.variables.clone(),
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(tolerance) = self.tolerance {
            config = config.with_tolerance(tolerance);
        }
        if let Some(max_iterations) = self.max_iterations {
            config = config.with_max_iterations(max_iterations);
        }
        config
    }
}

/// Everything needed to report on one solve.
struct Run {
    spec: ExpressionSpec,
    method: Method,
    result: SolveResult,
    duration: Duration,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let run = match main_inner(&cli) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    if cli.json {
        match serde_json::to_string_pretty(&run.result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    } else {
        print_output(&run, &cli);
    }
    if !run.result.is_success() {
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "off" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(io::stderr)
        .without_time()
        .init();
}

fn main_inner(cli: &Cli) -> anyhow::Result<Run> {
    let request = SolveRequest::from_cli(cli)?;
    let spec = request.spec();
    let method = request.method.unwrap_or_default();
    let now = Instant::now();
    let result = solve(
        method,
        &spec,
        &request.initial_guesses,
        request.config(),
        &mut TracingSink,
    );
    Ok(Run {
        spec,
        method,
        result,
        duration: now.elapsed(),
    })
}

/// Prints the output nicely to stdout.
fn print_output(run: &Run, cli: &Cli) {
    let Run {
        spec,
        method,
        result,
        duration,
    } = run;
    print_problem(spec, *method);
    if cli.show_derivatives {
        print_derivatives(spec);
    }
    if cli.show_iterations {
        print_iterations(result.iterations(), &spec.variables);
    }
    println!("Iterations needed: {}", result.iterations().len());
    match result {
        SolveResult::Success { solution, .. } => {
            println!("{}", "Converged".green());
            for (name, value) in spec.variables.iter().zip(solution) {
                println!("\t{name} = {value}");
            }
            println!("Solved in {}μs", duration.as_micros());
        }
        SolveResult::Error { message, .. } => {
            eprintln!("{}: {message}", "Could not solve".red());
        }
    }
}

fn print_problem(spec: &ExpressionSpec, method: Method) {
    println!("Method: {method}");
    println!("Variables: {}", spec.variables.join(", "));
    match spec.expressions.as_slice() {
        [single] => println!("Expression: {single}"),
        expressions => {
            println!("Equations:");
            for expression in expressions {
                println!("\t{expression} = 0");
            }
        }
    }
}

/// Print the symbolic partials. Problems that don't compile have nothing to show,
/// and their error is reported with the result.
fn print_derivatives(spec: &ExpressionSpec) {
    let Ok(evaluator) = spec.compile() else {
        return;
    };
    let names = evaluator.variables();
    println!("Derivatives:");
    for (i, (function, row)) in evaluator
        .functions()
        .iter()
        .zip(evaluator.partials())
        .enumerate()
    {
        let f = if evaluator.functions().len() == 1 {
            "f".to_owned()
        } else {
            format!("f{}", i + 1)
        };
        println!("\t{f} = {}", function.display(names));
        for (name, partial) in names.iter().zip(row) {
            println!("\td{f}/d{name} = {}", partial.display(names));
        }
    }
    if evaluator.functions().len() == 1 {
        for (row_name, row) in names.iter().zip(evaluator.second_partials()) {
            for (col_name, second) in names.iter().zip(row) {
                println!("\td2f/d{row_name}d{col_name} = {}", second.display(names));
            }
        }
    }
}

fn print_iterations(records: &[IterationRecord], variables: &[String]) {
    if records.is_empty() {
        return;
    }
    println!("Iterations:");
    for record in records {
        println!(
            "\t{}: {} -> {}",
            record.iteration(),
            point(variables, record.x()),
            point(variables, record.x_new()).yellow(),
        );
        println!("\t   f(x) = {}", numbers(record.fx()));
        if let Some(gradient) = record.gradient() {
            println!("\t   gradient = {}", numbers(gradient));
        }
        if let Some(delta_x) = record.delta_x() {
            println!("\t   delta_x = {}", numbers(delta_x));
        }
    }
}

fn point(variables: &[String], values: &[f64]) -> String {
    let coords: Vec<_> = variables
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{name} = {value:.6}"))
        .collect();
    format!("({})", coords.join(", "))
}

fn numbers(values: &[f64]) -> String {
    let values: Vec<_> = values.iter().map(|v| format!("{v:.6}")).collect();
    format!("[{}]", values.join(", "))
}

/// Read the request text from a file or stdin.
/// '-' means stdin.
fn read_request(path: &Path) -> anyhow::Result<String> {
    if path != Path::new("-") {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()));
    }
    let mut text = String::with_capacity(100);
    io::stdin()
        .read_to_string(&mut text)
        .context("Could not read stdin")?;
    Ok(text)
}
