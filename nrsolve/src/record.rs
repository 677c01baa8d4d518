use serde::{Serialize, Serializer};

/// Everything a solver saw and did during one iteration.
/// Records are created once, in order, and never changed afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IterationRecord {
    /// 1-based.
    pub(crate) iteration: usize,
    /// The point at the start of the iteration.
    pub(crate) x: Vec<f64>,
    /// Function value(s) at `x`.
    #[serde(rename = "f(x)", serialize_with = "scalar_or_vector")]
    pub(crate) fx: Vec<f64>,
    /// Gradient of the scalar objective at `x`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) gradient: Option<Vec<f64>>,
    /// Jacobian of the equation system at `x`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) jacobian: Option<Vec<Vec<f64>>>,
    /// Hessian of the scalar objective at `x`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) hessian: Option<Vec<Vec<f64>>>,
    /// The joint Newton step, if one was solved for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) delta_x: Option<Vec<f64>>,
    /// The point at the end of the iteration.
    pub(crate) x_new: Vec<f64>,
}

// A single expression serializes as a bare number.
fn scalar_or_vector<S: Serializer>(fx: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    match fx {
        [only] => serializer.serialize_f64(*only),
        all => all.serialize(serializer),
    }
}

impl IterationRecord {
    /// A coordinate-wise step on a scalar function.
    pub(crate) fn coordinate(
        iteration: usize,
        x: Vec<f64>,
        fx: f64,
        gradient: Vec<f64>,
        x_new: Vec<f64>,
    ) -> Self {
        Self {
            iteration,
            x,
            fx: vec![fx],
            gradient: Some(gradient),
            jacobian: None,
            hessian: None,
            delta_x: None,
            x_new,
        }
    }

    /// A full Newton step towards a stationary point of a scalar objective.
    pub(crate) fn stationary(
        iteration: usize,
        x: Vec<f64>,
        fx: f64,
        gradient: Vec<f64>,
        hessian: Vec<Vec<f64>>,
        delta_x: Vec<f64>,
        x_new: Vec<f64>,
    ) -> Self {
        Self {
            iteration,
            x,
            fx: vec![fx],
            gradient: Some(gradient),
            jacobian: None,
            hessian: Some(hessian),
            delta_x: Some(delta_x),
            x_new,
        }
    }

    /// A full Newton step towards a root of a square system.
    pub(crate) fn roots(
        iteration: usize,
        x: Vec<f64>,
        fx: Vec<f64>,
        jacobian: Vec<Vec<f64>>,
        delta_x: Vec<f64>,
        x_new: Vec<f64>,
    ) -> Self {
        Self {
            iteration,
            x,
            fx,
            gradient: None,
            jacobian: Some(jacobian),
            hessian: None,
            delta_x: Some(delta_x),
            x_new,
        }
    }

    /// Which iteration this was, starting from 1.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The point at the start of the iteration.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Function value(s) at [`Self::x`], one per expression.
    pub fn fx(&self) -> &[f64] {
        &self.fx
    }

    /// Gradient of the scalar objective, if this solver used one.
    pub fn gradient(&self) -> Option<&[f64]> {
        self.gradient.as_deref()
    }

    /// Jacobian of the equation system, if this solver used one.
    pub fn jacobian(&self) -> Option<&[Vec<f64>]> {
        self.jacobian.as_deref()
    }

    /// Hessian of the scalar objective, if this solver used one.
    pub fn hessian(&self) -> Option<&[Vec<f64>]> {
        self.hessian.as_deref()
    }

    /// The joint Newton step. Coordinate-wise steps don't have one.
    pub fn delta_x(&self) -> Option<&[f64]> {
        self.delta_x.as_deref()
    }

    /// The point at the end of the iteration.
    pub fn x_new(&self) -> &[f64] {
        &self.x_new
    }

    /// Largest absolute change of any coordinate during this iteration.
    pub fn max_change(&self) -> f64 {
        self.x
            .iter()
            .zip(&self.x_new)
            .map(|(a, b)| (b - a).abs())
            .fold(0.0, libm::fmax)
    }
}
