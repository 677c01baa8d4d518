use std::fmt;

use super::Expr;

/// An [`Expr`] paired with the names of its variables, ready to print.
/// Only the parentheses needed to preserve meaning are printed.
pub struct Rendered<'e> {
    expr: &'e Expr,
    names: &'e [String],
}

impl<'e> Rendered<'e> {
    pub(crate) fn new(expr: &'e Expr, names: &'e [String]) -> Self {
        Self { expr, names }
    }

    fn child(&self, expr: &'e Expr) -> Self {
        Self::new(expr, self.names)
    }

    fn write_operand(&self, f: &mut fmt::Formatter<'_>, expr: &'e Expr, parens: bool) -> fmt::Result {
        if parens {
            write!(f, "({})", self.child(expr))
        } else {
            write!(f, "{}", self.child(expr))
        }
    }

    fn write_binary(
        &self,
        f: &mut fmt::Formatter<'_>,
        lhs: &'e Expr,
        op: &str,
        rhs: &'e Expr,
        non_associative: bool,
    ) -> fmt::Result {
        let own = precedence(self.expr);
        self.write_operand(f, lhs, precedence(lhs) < own)?;
        f.write_str(op)?;
        let rhs_parens = precedence(rhs) < own
            || (non_associative && precedence(rhs) == own)
            || is_negative(rhs);
        self.write_operand(f, rhs, rhs_parens)
    }
}

const SUM: u8 = 1;
const PRODUCT: u8 = 2;
const NEGATION: u8 = 3;
const POWER: u8 = 4;
const ATOM: u8 = 5;

fn is_negative(expr: &Expr) -> bool {
    match expr {
        Expr::Neg(_) => true,
        Expr::Const(c) => c.is_sign_negative(),
        _ => false,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Add(..) | Expr::Sub(..) => SUM,
        Expr::Mul(..) | Expr::Div(..) => PRODUCT,
        Expr::Neg(_) => NEGATION,
        Expr::Const(c) if c.is_sign_negative() => NEGATION,
        Expr::Pow(..) => POWER,
        Expr::Const(_) | Expr::Var(_) | Expr::Call(..) => ATOM,
    }
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Var(slot) => match self.names.get(*slot) {
                Some(name) => f.write_str(name),
                None => write!(f, "x{slot}"),
            },
            Expr::Neg(a) => {
                f.write_str("-")?;
                self.write_operand(f, a, precedence(a) <= NEGATION)
            }
            Expr::Add(a, b) => self.write_binary(f, a, " + ", b, false),
            Expr::Sub(a, b) => self.write_binary(f, a, " - ", b, true),
            Expr::Mul(a, b) => self.write_binary(f, a, "*", b, false),
            Expr::Div(a, b) => self.write_binary(f, a, "/", b, true),
            Expr::Pow(a, b) => {
                self.write_operand(f, a, precedence(a) <= POWER)?;
                f.write_str("^")?;
                self.write_operand(f, b, precedence(b) < ATOM)
            }
            Expr::Call(func, a) => {
                write!(f, "{}(", func.name())?;
                self.write_operand(f, a, false)?;
                f.write_str(")")
            }
        }
    }
}
