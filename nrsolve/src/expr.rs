//! Symbolic expressions: parsing, differentiation, simplification and numeric evaluation.
//! This is the machinery behind [`crate::CompiledEvaluator`]; the solvers never touch it directly.

mod derivative;
mod display;
mod parser;

use std::f64::consts::{E, PI};

use indexmap::IndexMap;

pub use display::Rendered;
pub use parser::{BinOp, Syntax};

use crate::CompileError;

/// A function which can be called from an expression.
/// Every function takes exactly one argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Func {
    /// Sine
    Sin,
    /// Cosine
    Cos,
    /// Tangent
    Tan,
    /// Inverse sine
    Asin,
    /// Inverse cosine
    Acos,
    /// Inverse tangent
    Atan,
    /// Hyperbolic sine
    Sinh,
    /// Hyperbolic cosine
    Cosh,
    /// Hyperbolic tangent
    Tanh,
    /// Natural exponential
    Exp,
    /// Natural logarithm. Spelled `ln` or `log`.
    Ln,
    /// Square root
    Sqrt,
    /// Absolute value
    Abs,
    /// -1, 0 or 1. Shows up as the derivative of `abs`.
    Sign,
}

impl Func {
    /// Look up a function by the name used in expression text.
    pub fn from_name(name: &str) -> Option<Self> {
        let func = match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "exp" => Self::Exp,
            "ln" | "log" => Self::Ln,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "sign" => Self::Sign,
            _ => return None,
        };
        Some(func)
    }

    /// Canonical name, used when printing.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Sign => "sign",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Sin => libm::sin(x),
            Self::Cos => libm::cos(x),
            Self::Tan => libm::tan(x),
            Self::Asin => libm::asin(x),
            Self::Acos => libm::acos(x),
            Self::Atan => libm::atan(x),
            Self::Sinh => libm::sinh(x),
            Self::Cosh => libm::cosh(x),
            Self::Tanh => libm::tanh(x),
            Self::Exp => libm::exp(x),
            Self::Ln => libm::log(x),
            Self::Sqrt => libm::sqrt(x),
            Self::Abs => libm::fabs(x),
            Self::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    // 0 stays 0, NaN stays NaN.
                    x
                }
            }
        }
    }
}

/// An expression whose variables have been resolved to slots
/// in the point being evaluated.
///
/// Build these with the constructor functions ([`Expr::add`], [`Expr::mul`] etc)
/// rather than the variants directly: the constructors fold constants and drop
/// identities, which keeps derivatives small.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A literal number.
    Const(f64),
    /// The variable in this slot.
    Var(usize),
    /// Negation
    Neg(Box<Expr>),
    /// Addition
    Add(Box<Expr>, Box<Expr>),
    /// Subtraction
    Sub(Box<Expr>, Box<Expr>),
    /// Multiplication
    Mul(Box<Expr>, Box<Expr>),
    /// Division
    Div(Box<Expr>, Box<Expr>),
    /// Exponentiation
    Pow(Box<Expr>, Box<Expr>),
    /// Function call
    Call(Func, Box<Expr>),
}

/// Use `value` if it's a usable number, otherwise keep the unfolded expression
/// so that the domain error shows up when it's evaluated.
fn fold(value: f64, unfolded: impl FnOnce() -> Expr) -> Expr {
    if value.is_finite() {
        Expr::Const(value)
    } else {
        unfolded()
    }
}

impl Expr {
    /// Resolve parsed syntax against the declared variables.
    /// `slots` maps each variable name to its position in the point.
    pub fn lower(syntax: &Syntax, slots: &IndexMap<String, usize>) -> Result<Self, CompileError> {
        let expr = match syntax {
            Syntax::Number(n) => Self::Const(*n),
            Syntax::Name(name) => match (slots.get(name), name.as_str()) {
                (Some(slot), _) => Self::Var(*slot),
                (None, "pi") => Self::Const(PI),
                (None, "E") => Self::Const(E),
                (None, _) => {
                    return Err(CompileError::UnknownVariable { name: name.clone() });
                }
            },
            Syntax::Neg(inner) => Self::neg(Self::lower(inner, slots)?),
            Syntax::Binary(op, lhs, rhs) => {
                let lhs = Self::lower(lhs, slots)?;
                let rhs = Self::lower(rhs, slots)?;
                match op {
                    BinOp::Add => Self::add(lhs, rhs),
                    BinOp::Sub => Self::sub(lhs, rhs),
                    BinOp::Mul => Self::mul(lhs, rhs),
                    BinOp::Div => Self::div(lhs, rhs),
                    BinOp::Pow => Self::pow(lhs, rhs),
                }
            }
            Syntax::Call(name, args) => {
                let Some(func) = Func::from_name(name) else {
                    return Err(CompileError::UnknownFunction { name: name.clone() });
                };
                let [arg] = args.as_slice() else {
                    return Err(CompileError::WrongArity {
                        function: name.clone(),
                        found: args.len(),
                    });
                };
                Self::call(func, Self::lower(arg, slots)?)
            }
        };
        Ok(expr)
    }

    /// Evaluate at the point `x`. Variable slots index into `x`.
    /// Domain errors come back as NaN or infinity; callers decide what to do with them.
    pub fn eval(&self, x: &[f64]) -> f64 {
        match self {
            Self::Const(c) => *c,
            Self::Var(slot) => x[*slot],
            Self::Neg(a) => -a.eval(x),
            Self::Add(a, b) => a.eval(x) + b.eval(x),
            Self::Sub(a, b) => a.eval(x) - b.eval(x),
            Self::Mul(a, b) => a.eval(x) * b.eval(x),
            Self::Div(a, b) => a.eval(x) / b.eval(x),
            Self::Pow(a, b) => libm::pow(a.eval(x), b.eval(x)),
            Self::Call(func, a) => func.apply(a.eval(x)),
        }
    }

    /// If this is a literal, its value.
    pub fn as_const(&self) -> Option<f64> {
        match self {
            Self::Const(c) => Some(*c),
            _ => None,
        }
    }

    // Only ever compares against small integer literals, which are exact.
    #[allow(clippy::float_cmp)]
    fn is_const(&self, value: f64) -> bool {
        self.as_const() == Some(value)
    }

    /// `-a`
    pub fn neg(a: Expr) -> Expr {
        match a {
            Self::Const(c) => Self::Const(0.0 - c),
            Self::Neg(inner) => *inner,
            Self::Mul(k, rest) => match k.as_const() {
                Some(k) => Self::mul_const(-k, *rest),
                None => Self::Neg(Box::new(Self::Mul(k, rest))),
            },
            Self::Sub(lhs, rhs) => Self::Sub(rhs, lhs),
            other => Self::Neg(Box::new(other)),
        }
    }

    /// `a + b`
    pub fn add(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => fold(x + y, || Self::Add(Box::new(a), Box::new(b))),
            (Some(_), None) if a.is_const(0.0) => b,
            (None, Some(_)) if b.is_const(0.0) => a,
            (None, Some(y)) if y < 0.0 => Self::Sub(Box::new(a), Box::new(Self::Const(-y))),
            _ => match b {
                Self::Neg(inner) => Self::sub(a, *inner),
                b => Self::Add(Box::new(a), Box::new(b)),
            },
        }
    }

    /// `a - b`
    pub fn sub(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => fold(x - y, || Self::Sub(Box::new(a), Box::new(b))),
            (Some(_), None) if a.is_const(0.0) => Self::neg(b),
            (None, Some(_)) if b.is_const(0.0) => a,
            _ if a == b => Self::Const(0.0),
            _ => match b {
                Self::Neg(inner) => Self::add(a, *inner),
                b => Self::Sub(Box::new(a), Box::new(b)),
            },
        }
    }

    /// `a * b`. Constant factors are pulled to the left and merged.
    pub fn mul(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => fold(x * y, || Self::Mul(Box::new(a), Box::new(b))),
            (Some(k), None) => Self::mul_const(k, b),
            (None, Some(k)) => Self::mul_const(k, a),
            (None, None) => match (a, b) {
                (Self::Neg(a), b) => Self::neg(Self::mul(*a, b)),
                (a, Self::Neg(b)) => Self::neg(Self::mul(a, *b)),
                (a, b) => Self::Mul(Box::new(a), Box::new(b)),
            },
        }
    }

    #[allow(clippy::float_cmp)]
    fn mul_const(k: f64, e: Expr) -> Expr {
        if k == 0.0 {
            return Self::Const(0.0);
        }
        if k == 1.0 {
            return e;
        }
        if k == -1.0 {
            return Self::neg(e);
        }
        match e {
            Self::Mul(inner, rest) => match inner.as_const().map(|inner_k| k * inner_k) {
                Some(product) if product.is_finite() => Self::mul_const(product, *rest),
                _ => Self::Mul(Box::new(Self::Const(k)), Box::new(Self::Mul(inner, rest))),
            },
            Self::Neg(inner) => Self::mul_const(-k, *inner),
            e => Self::Mul(Box::new(Self::Const(k)), Box::new(e)),
        }
    }

    /// `a / b`
    pub fn div(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => fold(x / y, || Self::Div(Box::new(a), Box::new(b))),
            (Some(_), None) if a.is_const(0.0) => Self::Const(0.0),
            (None, Some(_)) if b.is_const(1.0) => a,
            _ => Self::Div(Box::new(a), Box::new(b)),
        }
    }

    /// `a ^ b`
    pub fn pow(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => fold(libm::pow(x, y), || Self::Pow(Box::new(a), Box::new(b))),
            (_, Some(_)) if b.is_const(0.0) => Self::Const(1.0),
            (_, Some(_)) if b.is_const(1.0) => a,
            (Some(_), _) if a.is_const(1.0) => Self::Const(1.0),
            _ => Self::Pow(Box::new(a), Box::new(b)),
        }
    }

    /// `func(a)`
    pub fn call(func: Func, a: Expr) -> Expr {
        match a.as_const() {
            Some(x) => fold(func.apply(x), || Self::Call(func, Box::new(a))),
            None => Self::Call(func, Box::new(a)),
        }
    }

    /// Render using these variable names.
    pub fn display<'e>(&'e self, names: &'e [String]) -> Rendered<'e> {
        Rendered::new(self, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(names: &[&str]) -> IndexMap<String, usize> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), i))
            .collect()
    }

    fn compile(text: &str, names: &[&str]) -> Result<Expr, CompileError> {
        let syntax: Syntax = text.parse().unwrap();
        Expr::lower(&syntax, &slots(names))
    }

    #[test]
    fn evaluates_arithmetic() {
        let e = compile("x^2 + 3*y - z/2", &["x", "y", "z"]).unwrap();
        assert_eq!(e.eval(&[2.0, 1.0, 4.0]), 5.0);
    }

    #[test]
    fn constants_fold_away() {
        let e = compile("2*3 + 4", &["x"]).unwrap();
        assert_eq!(e, Expr::Const(10.0));
        let e = compile("x*0 + 1*x", &["x"]).unwrap();
        assert_eq!(e, Expr::Var(0));
    }

    #[test]
    fn domain_errors_are_not_folded() {
        // 1/0 must stay symbolic so evaluation reports it.
        let e = compile("1/0", &["x"]).unwrap();
        assert!(matches!(e, Expr::Div(_, _)));
        assert!(e.eval(&[0.0]).is_infinite());
        let e = compile("sqrt(-1)", &["x"]).unwrap();
        assert!(e.eval(&[0.0]).is_nan());
    }

    #[test]
    fn named_constants() {
        let e = compile("pi", &["x"]).unwrap();
        assert_eq!(e, Expr::Const(PI));
        let e = compile("E", &["x"]).unwrap();
        assert_eq!(e, Expr::Const(E));
        // A declared variable shadows the constant.
        let e = compile("E", &["E"]).unwrap();
        assert_eq!(e, Expr::Var(0));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            compile("x + q", &["x"]),
            Err(CompileError::UnknownVariable { name: "q".into() })
        );
        assert_eq!(
            compile("frob(x)", &["x"]),
            Err(CompileError::UnknownFunction {
                name: "frob".into()
            })
        );
        assert_eq!(
            compile("sin(x, x)", &["x"]),
            Err(CompileError::WrongArity {
                function: "sin".into(),
                found: 2
            })
        );
    }

    #[test]
    fn functions_evaluate() {
        let e = compile("sin(x)^2 + cos(x)^2", &["x"]).unwrap();
        assert!((e.eval(&[0.7]) - 1.0).abs() < 1e-12);
        let e = compile("log(exp(x))", &["x"]).unwrap();
        assert!((e.eval(&[1.5]) - 1.5).abs() < 1e-12);
        let e = compile("abs(x) * sign(x)", &["x"]).unwrap();
        assert_eq!(e.eval(&[-3.0]), -3.0);
    }

    #[test]
    fn sign_is_callable() {
        let e = compile("sign(x - 1)", &["x"]).unwrap();
        assert_eq!(e.eval(&[3.0]), 1.0);
        assert_eq!(e.eval(&[1.0]), 0.0);
        assert_eq!(e.eval(&[-3.0]), -1.0);
        assert_eq!(e.derivative(0), Expr::Const(0.0));
        assert_eq!(e.display(&["x".to_owned()]).to_string(), "sign(x - 1)");
    }

    #[test]
    fn negation_is_normalized() {
        let e = compile("-(-x)", &["x"]).unwrap();
        assert_eq!(e, Expr::Var(0));
        let e = compile("x + -y", &["x", "y"]).unwrap();
        assert!(matches!(e, Expr::Sub(_, _)));
        let e = compile("-2*-x", &["x"]).unwrap();
        assert_eq!(e, Expr::Mul(Box::new(Expr::Const(2.0)), Box::new(Expr::Var(0))));
    }
}
