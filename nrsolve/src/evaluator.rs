use indexmap::IndexMap;

use crate::{
    CompileError, EvaluationError, MAX_VARIABLES, Quantity,
    expr::{Expr, Syntax},
};

/// Numeric access to a compiled function and its derivatives.
/// The solvers only ever see a problem through this trait.
///
/// Every method must be pure: the same `x` always gives the same output.
/// NaN or infinite results must be reported as [`EvaluationError::NonFinite`],
/// never passed along.
pub trait Evaluator {
    /// How many variables each point has.
    fn num_variables(&self) -> usize;
    /// How many expressions are evaluated at each point.
    fn num_expressions(&self) -> usize;
    /// One value per expression.
    fn value(&self, x: &[f64]) -> Result<Vec<f64>, EvaluationError>;
    /// Partial derivatives of the first expression, one per variable.
    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, EvaluationError>;
    /// One row per expression, one column per variable.
    fn jacobian(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError>;
    /// Symmetric matrix of second partial derivatives of the first expression.
    fn hessian(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError>;
}

/// Expressions compiled from text, along with their symbolic derivatives.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledEvaluator {
    variables: Vec<String>,
    functions: Vec<Expr>,
    /// `partials[row][col]` is d(functions[row])/d(variables[col]).
    partials: Vec<Vec<Expr>>,
    /// Second derivatives of `functions[0]`.
    second_partials: Vec<Vec<Expr>>,
}

/// Parse the expressions, resolve them against `variables` and differentiate them.
pub fn compile<S: AsRef<str>>(
    expressions: &[S],
    variables: &[S],
) -> Result<CompiledEvaluator, CompileError> {
    if variables.len() > MAX_VARIABLES {
        return Err(CompileError::TooManyVariables {
            count: variables.len(),
        });
    }
    let mut slots = IndexMap::with_capacity(variables.len());
    for (slot, name) in variables.iter().enumerate() {
        let name = name.as_ref();
        if slots.insert(name.to_owned(), slot).is_some() {
            return Err(CompileError::DuplicateVariable {
                name: name.to_owned(),
            });
        }
    }
    if expressions.is_empty() {
        return Err(CompileError::NoExpressions);
    }

    let functions = expressions
        .iter()
        .map(|text| {
            let text = text.as_ref();
            let syntax: Syntax = text.parse().map_err(|message| CompileError::Parse {
                expression: text.to_owned(),
                message,
            })?;
            Expr::lower(&syntax, &slots)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let n = variables.len();
    let partials: Vec<Vec<Expr>> = functions
        .iter()
        .map(|f| (0..n).map(|col| f.derivative(col)).collect())
        .collect();

    // Only the upper triangle is differentiated, then mirrored,
    // so the Hessian is exactly symmetric.
    let mut second_partials = vec![vec![Expr::Const(0.0); n]; n];
    for row in 0..n {
        for col in row..n {
            let d2 = partials[0][row].derivative(col);
            second_partials[col][row] = d2.clone();
            second_partials[row][col] = d2;
        }
    }

    Ok(CompiledEvaluator {
        variables: slots.into_keys().collect(),
        functions,
        partials,
        second_partials,
    })
}

impl CompiledEvaluator {
    /// Declared variable names, in slot order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// The compiled expressions.
    pub fn functions(&self) -> &[Expr] {
        &self.functions
    }

    /// Symbolic first derivatives, one row per expression.
    pub fn partials(&self) -> &[Vec<Expr>] {
        &self.partials
    }

    /// Symbolic second derivatives of the first expression.
    pub fn second_partials(&self) -> &[Vec<Expr>] {
        &self.second_partials
    }

    fn check_dimension(&self, x: &[f64]) -> Result<(), EvaluationError> {
        if x.len() == self.variables.len() {
            Ok(())
        } else {
            Err(EvaluationError::WrongDimension {
                expected: self.variables.len(),
                found: x.len(),
            })
        }
    }

    fn eval_matrix(
        &self,
        rows: &[Vec<Expr>],
        quantity: Quantity,
        x: &[f64],
    ) -> Result<Vec<Vec<f64>>, EvaluationError> {
        self.check_dimension(x)?;
        rows.iter().map(|row| eval_row(row, quantity, x)).collect()
    }
}

fn eval_row(row: &[Expr], quantity: Quantity, x: &[f64]) -> Result<Vec<f64>, EvaluationError> {
    row.iter().map(|e| finite(quantity, e.eval(x), x)).collect()
}

fn finite(quantity: Quantity, value: f64, x: &[f64]) -> Result<f64, EvaluationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvaluationError::NonFinite {
            quantity,
            value,
            at: x.to_vec(),
        })
    }
}

impl Evaluator for CompiledEvaluator {
    fn num_variables(&self) -> usize {
        self.variables.len()
    }

    fn num_expressions(&self) -> usize {
        self.functions.len()
    }

    fn value(&self, x: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.check_dimension(x)?;
        eval_row(&self.functions, Quantity::FunctionValue, x)
    }

    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.check_dimension(x)?;
        eval_row(&self.partials[0], Quantity::Gradient, x)
    }

    fn jacobian(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError> {
        self.eval_matrix(&self.partials, Quantity::Jacobian, x)
    }

    fn hessian(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, EvaluationError> {
        self.eval_matrix(&self.second_partials, Quantity::Hessian, x)
    }
}
