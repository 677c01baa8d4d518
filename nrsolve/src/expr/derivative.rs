use super::{Expr, Func};

impl Expr {
    /// Symbolic partial derivative with respect to the variable in `slot`.
    pub fn derivative(&self, slot: usize) -> Expr {
        match self {
            Self::Const(_) => Self::Const(0.0),
            Self::Var(s) => Self::Const(if *s == slot { 1.0 } else { 0.0 }),
            Self::Neg(a) => Self::neg(a.derivative(slot)),
            Self::Add(a, b) => Self::add(a.derivative(slot), b.derivative(slot)),
            Self::Sub(a, b) => Self::sub(a.derivative(slot), b.derivative(slot)),
            // (ab)' = a'b + ab'
            Self::Mul(a, b) => Self::add(
                Self::mul(a.derivative(slot), (**b).clone()),
                Self::mul((**a).clone(), b.derivative(slot)),
            ),
            // (a/b)' = a'/b - ab'/b^2
            Self::Div(a, b) => Self::sub(
                Self::div(a.derivative(slot), (**b).clone()),
                Self::div(
                    Self::mul((**a).clone(), b.derivative(slot)),
                    Self::pow((**b).clone(), Self::Const(2.0)),
                ),
            ),
            Self::Pow(a, b) => self.power_derivative(a, b, slot),
            // Chain rule.
            Self::Call(func, a) => Self::mul(outer_derivative(*func, a), a.derivative(slot)),
        }
    }

    fn power_derivative(&self, base: &Expr, exponent: &Expr, slot: usize) -> Expr {
        let db = base.derivative(slot);
        let de = exponent.derivative(slot);
        match (base.as_const(), exponent.as_const()) {
            // (a^n)' = n a^(n-1) a'
            (_, Some(n)) => Self::mul(
                Self::mul(Self::Const(n), Self::pow(base.clone(), Self::Const(n - 1.0))),
                db,
            ),
            // (k^b)' = k^b ln(k) b'
            (Some(_), None) => Self::mul(
                Self::mul(self.clone(), Self::call(Func::Ln, base.clone())),
                de,
            ),
            // (a^b)' = a^b (b' ln(a) + b a'/a)
            (None, None) => Self::mul(
                self.clone(),
                Self::add(
                    Self::mul(de, Self::call(Func::Ln, base.clone())),
                    Self::div(Self::mul(exponent.clone(), db), base.clone()),
                ),
            ),
        }
    }
}

/// d/du of `func(u)`, still in terms of `u`.
fn outer_derivative(func: Func, u: &Expr) -> Expr {
    let u = u.clone();
    let one = || Expr::Const(1.0);
    let squared = |e: Expr| Expr::pow(e, Expr::Const(2.0));
    match func {
        Func::Sin => Expr::call(Func::Cos, u),
        Func::Cos => Expr::neg(Expr::call(Func::Sin, u)),
        Func::Tan => Expr::div(one(), squared(Expr::call(Func::Cos, u))),
        Func::Asin => Expr::div(one(), Expr::call(Func::Sqrt, Expr::sub(one(), squared(u)))),
        Func::Acos => Expr::neg(Expr::div(
            one(),
            Expr::call(Func::Sqrt, Expr::sub(one(), squared(u))),
        )),
        Func::Atan => Expr::div(one(), Expr::add(one(), squared(u))),
        Func::Sinh => Expr::call(Func::Cosh, u),
        Func::Cosh => Expr::call(Func::Sinh, u),
        Func::Tanh => Expr::sub(one(), squared(Expr::call(Func::Tanh, u))),
        Func::Exp => Expr::call(Func::Exp, u),
        Func::Ln => Expr::div(one(), u),
        Func::Sqrt => Expr::div(one(), Expr::mul(Expr::Const(2.0), Expr::call(Func::Sqrt, u))),
        Func::Abs => Expr::call(Func::Sign, u),
        Func::Sign => Expr::Const(0.0),
    }
}
