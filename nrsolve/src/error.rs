use crate::MAX_VARIABLES;

/// Inputs that were rejected before any evaluator call.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    /// At least one variable is required.
    #[error("At least one variable is required.")]
    NoVariables,
    /// Too many variables were declared.
    #[error(
        "This implementation supports up to {} variables only, but {count} were given.",
        MAX_VARIABLES
    )]
    TooManyVariables {
        /// How many variables were given.
        count: usize,
    },
    /// A variable name was declared twice.
    #[error("Variable {name:?} was declared more than once.")]
    DuplicateVariable {
        /// The repeated name.
        name: String,
    },
    /// A variable name was the empty string.
    #[error("Variable names cannot be empty.")]
    EmptyVariableName,
    /// At least one expression is required.
    #[error("At least one expression is required.")]
    NoExpressions,
    /// There should be exactly 1 guess per variable, but you supplied the wrong number.
    #[error(
        "There should be exactly 1 guess per variable, but you supplied {variables} variables and {guesses} guesses"
    )]
    WrongNumberGuesses {
        /// How many variables were declared.
        variables: usize,
        /// How many guesses were given.
        guesses: usize,
    },
    /// An initial guess was NaN or infinite.
    #[error("The initial guess for {variable} must be finite, but it was {value}")]
    NonFiniteGuess {
        /// Which variable had the bad guess.
        variable: String,
        /// The guess itself.
        value: f64,
    },
    /// Tolerance must be a positive, finite number.
    #[error("Tolerance must be positive and finite, but it was {tolerance}")]
    InvalidTolerance {
        /// The rejected tolerance.
        tolerance: f64,
    },
    /// The iteration cap must allow at least one iteration.
    #[error("The maximum number of iterations must be at least 1")]
    ZeroIterations,
    /// The coordinate-wise solver and the stationary-point search both work on one
    /// scalar function, so they only accept a single expression.
    #[error("This method needs a single scalar expression, but {expressions} were given")]
    NotScalar {
        /// How many expressions were given.
        expressions: usize,
    },
    /// The full Newton solver needs either one objective, or one equation per variable.
    #[error(
        "Expected one objective or {variables} equations (one per variable), but {expressions} expressions were given"
    )]
    NotSquare {
        /// How many expressions were given.
        expressions: usize,
        /// How many variables were declared.
        variables: usize,
    },
}

/// The expression text could not be turned into an evaluator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompileError {
    /// The expression isn't valid syntax.
    #[error("Could not parse {expression:?}: {message}")]
    Parse {
        /// The expression text.
        expression: String,
        /// What the parser complained about.
        message: String,
    },
    /// The expression mentions a name which isn't a declared variable or a known constant.
    #[error("{name:?} is not one of the declared variables")]
    UnknownVariable {
        /// The undeclared name.
        name: String,
    },
    /// The expression calls a function that doesn't exist.
    #[error("Unknown function {name:?}")]
    UnknownFunction {
        /// The function name.
        name: String,
    },
    /// Every supported function takes exactly one argument.
    #[error("{function} takes exactly 1 argument, but {found} were given")]
    WrongArity {
        /// The function name.
        function: String,
        /// How many arguments it was called with.
        found: usize,
    },
    /// Too many variables were declared.
    #[error(
        "This implementation supports up to {} variables only, but {count} were given.",
        MAX_VARIABLES
    )]
    TooManyVariables {
        /// How many variables were given.
        count: usize,
    },
    /// A variable name was declared twice.
    #[error("Variable {name:?} was declared more than once.")]
    DuplicateVariable {
        /// The repeated name.
        name: String,
    },
    /// Nothing to compile.
    #[error("At least one expression is required.")]
    NoExpressions,
}

/// Which evaluator output went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    /// The function value(s).
    FunctionValue,
    /// First partial derivatives of the scalar objective.
    Gradient,
    /// First partial derivatives of every expression.
    Jacobian,
    /// Second partial derivatives of the scalar objective.
    Hessian,
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quantity::FunctionValue => write!(f, "f(x)"),
            Quantity::Gradient => write!(f, "the gradient"),
            Quantity::Jacobian => write!(f, "the Jacobian"),
            Quantity::Hessian => write!(f, "the Hessian"),
        }
    }
}

/// Numeric evaluation failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EvaluationError {
    /// A domain error (division by zero, log of a negative number, etc)
    /// produced NaN or infinity.
    #[error("{quantity} is not finite ({value}) at x = {at:?}")]
    NonFinite {
        /// What was being evaluated.
        quantity: Quantity,
        /// The offending value.
        value: f64,
        /// Where it was evaluated.
        at: Vec<f64>,
    },
    /// The point had the wrong number of coordinates.
    #[error("Expected a point with {expected} coordinates, but it had {found}")]
    WrongDimension {
        /// Number of variables the evaluator was compiled for.
        expected: usize,
        /// Number of coordinates given.
        found: usize,
    },
}

/// The matrix a Newton step would have to invert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixKind {
    /// Second derivatives of a single objective.
    /// Also names the 1x1 derivative of a lone equation `f(x) = 0`.
    Hessian,
    /// First derivatives of a system of two or more equations.
    Jacobian,
}

impl std::fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixKind::Hessian => write!(f, "Hessian"),
            MatrixKind::Jacobian => write!(f, "Jacobian"),
        }
    }
}

/// Every way a solve can end without a solution.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SolveError {
    /// Inputs were rejected up front.
    #[error("{0}")]
    Validation(#[from] ValidationError),
    /// Expressions could not be compiled.
    #[error("Invalid function or variables: {0}")]
    Compile(#[from] CompileError),
    /// The evaluator failed partway through.
    #[error("Error during iteration {iteration}: {source}")]
    Evaluation {
        /// 1-based iteration that was running.
        iteration: usize,
        /// Underlying error.
        #[source]
        source: EvaluationError,
    },
    /// Every partial derivative vanished, so no coordinate can move.
    #[error("Gradient is zero or close to zero. No solution found.")]
    DegenerateGradient,
    /// The Newton system has no unique solution at the current point.
    #[error("{matrix} is singular or nearly singular, so no Newton step exists. No solution found.")]
    SingularMatrix {
        /// Which matrix couldn't be inverted.
        matrix: MatrixKind,
    },
    /// Solver did not find a solution within the allowed number of iterations.
    #[error("Exceeded maximum iterations ({max_iterations}). No solution found.")]
    Exhausted {
        /// The cap that was hit.
        max_iterations: usize,
    },
}
