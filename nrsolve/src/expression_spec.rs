use serde::{Deserialize, Serialize};

use crate::{
    CompileError, CompiledEvaluator, Config, MAX_VARIABLES, Method, ValidationError, compile,
};

/// The problem to solve: expression text and the variables it's written in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionSpec {
    /// One scalar expression, or one expression per equation.
    pub expressions: Vec<String>,
    /// Variable names. Their order is the order of every point, gradient and matrix column.
    pub variables: Vec<String>,
}

impl ExpressionSpec {
    /// A single scalar expression.
    pub fn scalar(expression: impl Into<String>, variables: &[&str]) -> Self {
        Self {
            expressions: vec![expression.into()],
            variables: variables.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// A system of equations, each `= 0`.
    pub fn system(expressions: &[&str], variables: &[&str]) -> Self {
        Self {
            expressions: expressions.iter().map(|e| e.to_string()).collect(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Parse and differentiate every expression.
    pub fn compile(&self) -> Result<CompiledEvaluator, CompileError> {
        compile(self.expressions.as_slice(), self.variables.as_slice())
    }

    /// Check everything that can be checked without evaluating anything.
    pub fn validate(
        &self,
        method: Method,
        initial_guess: &[f64],
        config: &Config,
    ) -> Result<(), ValidationError> {
        let variables = self.variables.len();
        if variables == 0 {
            return Err(ValidationError::NoVariables);
        }
        if variables > MAX_VARIABLES {
            return Err(ValidationError::TooManyVariables { count: variables });
        }
        for (i, name) in self.variables.iter().enumerate() {
            if name.is_empty() {
                return Err(ValidationError::EmptyVariableName);
            }
            if self.variables[..i].contains(name) {
                return Err(ValidationError::DuplicateVariable { name: name.clone() });
            }
        }

        let expressions = self.expressions.len();
        if expressions == 0 {
            return Err(ValidationError::NoExpressions);
        }

        if initial_guess.len() != variables {
            return Err(ValidationError::WrongNumberGuesses {
                variables,
                guesses: initial_guess.len(),
            });
        }
        if let Some((name, &value)) = self
            .variables
            .iter()
            .zip(initial_guess)
            .find(|(_, guess)| !guess.is_finite())
        {
            return Err(ValidationError::NonFiniteGuess {
                variable: name.clone(),
                value,
            });
        }

        config.validate()?;

        match method {
            Method::Coordinate | Method::Stationary if expressions != 1 => {
                Err(ValidationError::NotScalar { expressions })
            }
            Method::Newton if expressions != 1 && expressions != variables => {
                Err(ValidationError::NotSquare {
                    expressions,
                    variables,
                })
            }
            _ => Ok(()),
        }
    }
}
