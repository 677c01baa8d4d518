use std::str::FromStr;

use winnow::{
    Result as WResult,
    ascii::{digit0, digit1, multispace0},
    combinator::{alt, delimited, opt, preceded, separated},
    prelude::*,
    token::{one_of, take_while},
};

/// A binary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `^` or `**`
    Pow,
}

/// Expression text after parsing, before names are resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum Syntax {
    /// A numeric literal.
    Number(f64),
    /// A variable or named constant.
    Name(String),
    /// Unary minus.
    Neg(Box<Syntax>),
    /// `lhs op rhs`
    Binary(BinOp, Box<Syntax>, Box<Syntax>),
    /// `name(args...)`
    Call(String, Vec<Syntax>),
}

impl Syntax {
    fn binary(op: BinOp, lhs: Syntax, rhs: Syntax) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

impl FromStr for Syntax {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        expression.parse(s).map_err(|e| e.to_string())
    }
}

// Grammar, loosest binding first:
//   expression := sum
//   sum        := product (('+' | '-') product)*
//   product    := unary (('*' | '/') unary)*
//   unary      := ('+' | '-') unary | power
//   power      := atom (('^' | '**') unary)?
//   atom       := number | name '(' args ')' | name | '(' sum ')'
// So `-x^2` is `-(x^2)` and `2^-1` is allowed.

fn expression(i: &mut &str) -> WResult<Syntax> {
    let expr = sum(i)?;
    ws(i)?;
    Ok(expr)
}

fn sum(i: &mut &str) -> WResult<Syntax> {
    let mut acc = product(i)?;
    while let Some(op) = opt(preceded(ws, one_of(['+', '-']))).parse_next(i)? {
        let rhs = product(i)?;
        let op = if op == '+' { BinOp::Add } else { BinOp::Sub };
        acc = Syntax::binary(op, acc, rhs);
    }
    Ok(acc)
}

fn product(i: &mut &str) -> WResult<Syntax> {
    let mut acc = unary(i)?;
    while let Some(op) = opt(preceded(ws, one_of(['*', '/']))).parse_next(i)? {
        let rhs = unary(i)?;
        let op = if op == '*' { BinOp::Mul } else { BinOp::Div };
        acc = Syntax::binary(op, acc, rhs);
    }
    Ok(acc)
}

fn unary(i: &mut &str) -> WResult<Syntax> {
    match opt(preceded(ws, one_of(['+', '-']))).parse_next(i)? {
        Some('-') => Ok(Syntax::Neg(Box::new(unary(i)?))),
        Some(_) => unary(i),
        None => power(i),
    }
}

fn power(i: &mut &str) -> WResult<Syntax> {
    let base = atom(i)?;
    if opt(preceded(ws, alt(("**", "^")))).parse_next(i)?.is_none() {
        return Ok(base);
    }
    let exponent = unary(i)?;
    Ok(Syntax::binary(BinOp::Pow, base, exponent))
}

fn atom(i: &mut &str) -> WResult<Syntax> {
    ws(i)?;
    alt((
        number.map(Syntax::Number),
        call_or_name,
        delimited('(', sum, preceded(ws, ')')),
    ))
    .parse_next(i)
}

fn call_or_name(i: &mut &str) -> WResult<Syntax> {
    let name = identifier(i)?;
    let args: Option<Vec<Syntax>> = opt(delimited(
        preceded(ws, '('),
        separated(1.., sum, preceded(ws, ',')),
        preceded(ws, ')'),
    ))
    .parse_next(i)?;
    Ok(match args {
        Some(args) => Syntax::Call(name.to_owned(), args),
        None => Syntax::Name(name.to_owned()),
    })
}

fn identifier<'i>(i: &mut &'i str) -> WResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(i)
}

// 3, 2.5, 2., .5, 1e-3
fn number(i: &mut &str) -> WResult<f64> {
    alt((
        (digit1, opt(('.', digit0)), opt(exponent)).take(),
        ('.', digit1, opt(exponent)).take(),
    ))
    .try_map(str::parse::<f64>)
    .parse_next(i)
}

fn exponent(i: &mut &str) -> WResult<()> {
    (one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)
        .void()
        .parse_next(i)
}

fn ws(i: &mut &str) -> WResult<()> {
    multispace0.void().parse_next(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Syntax {
        Syntax::Name(n.to_owned())
    }

    fn num(n: f64) -> Syntax {
        Syntax::Number(n)
    }

    fn parse(s: &str) -> Syntax {
        s.parse().unwrap()
    }

    #[test]
    fn numbers() {
        for (text, expected) in [
            ("3", 3.0),
            ("2.5", 2.5),
            ("2.", 2.0),
            (".5", 0.5),
            ("1e-3", 0.001),
            ("1.5E2", 150.0),
        ] {
            assert_eq!(parse(text), num(expected), "{text}");
        }
    }

    #[test]
    fn precedence() {
        // 1 + 2*x
        assert_eq!(
            parse("1 + 2*x"),
            Syntax::binary(
                BinOp::Add,
                num(1.0),
                Syntax::binary(BinOp::Mul, num(2.0), name("x"))
            )
        );
        // Unary minus binds looser than power.
        assert_eq!(
            parse("-x^2"),
            Syntax::Neg(Box::new(Syntax::binary(BinOp::Pow, name("x"), num(2.0))))
        );
        // Subtraction is left-associative.
        assert_eq!(
            parse("a - b - c"),
            Syntax::binary(
                BinOp::Sub,
                Syntax::binary(BinOp::Sub, name("a"), name("b")),
                name("c")
            )
        );
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(
            parse("x^y**z"),
            Syntax::binary(
                BinOp::Pow,
                name("x"),
                Syntax::binary(BinOp::Pow, name("y"), name("z"))
            )
        );
        assert_eq!(
            parse("2^-1"),
            Syntax::binary(BinOp::Pow, num(2.0), Syntax::Neg(Box::new(num(1.0))))
        );
    }

    #[test]
    fn calls_and_parens() {
        assert_eq!(
            parse(" sin( (x + y) ) "),
            Syntax::Call(
                "sin".to_owned(),
                vec![Syntax::binary(BinOp::Add, name("x"), name("y"))]
            )
        );
        assert_eq!(
            parse("atan(x, y)"),
            Syntax::Call("atan".to_owned(), vec![name("x"), name("y")])
        );
        assert_eq!(parse("x_1"), name("x_1"));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "x +", "2x", "(x", "x)", "sin()", "x ** ", "3 $ 4", "2e"] {
            assert!(bad.parse::<Syntax>().is_err(), "{bad:?} should not parse");
        }
    }
}
