//! Element-wise projection of parameters into their bounds.
//!
//! The lower bound is applied first and the upper bound second. When a bound
//! pair is inverted (lower > upper, e.g. because `eps` exceeds half the
//! feasible width) every element ends at the upper bound.

use bpl_types::{Bound, BplError, BplResult, OptimizableType, Parameter, Tensor};

/// Check that bounds are aligned with the parameter list and shaped like
/// their parameters.
pub fn validate_bounds(params: &[&Parameter], lower: &[Bound], upper: &[Bound]) -> BplResult<()> {
    if lower.len() != params.len() || upper.len() != params.len() {
        return Err(BplError::Validation(format!(
            "{} parameters but {} lower and {} upper bounds",
            params.len(),
            lower.len(),
            upper.len()
        )));
    }
    for ((param, lb), ub) in params.iter().zip(lower).zip(upper) {
        for bound in [lb, ub].into_iter().flatten() {
            check_shape(param, bound)?;
        }
    }
    Ok(())
}

fn check_shape(param: &Parameter, bound: &Tensor) -> BplResult<()> {
    if bound.shape() != param.shape() {
        return Err(BplError::ShapeMismatch {
            name: param.name().to_string(),
            expected: param.shape().to_vec(),
            actual: bound.shape().to_vec(),
        });
    }
    Ok(())
}

/// Raise every element below `lower` to it.
pub fn clamp_lower(values: &mut [f64], lower: &[f64]) {
    for (v, lb) in values.iter_mut().zip(lower) {
        if *v < *lb {
            *v = *lb;
        }
    }
}

/// Lower every element above `upper` to it.
pub fn clamp_upper(values: &mut [f64], upper: &[f64]) {
    for (v, ub) in values.iter_mut().zip(upper) {
        if *v > *ub {
            *v = *ub;
        }
    }
}

/// Project one parameter into `[lower, upper]`; absent bounds are skipped.
pub fn project(param: &mut Parameter, lower: Option<&Tensor>, upper: Option<&Tensor>) -> BplResult<()> {
    if let Some(lb) = lower {
        check_shape(param, lb)?;
        clamp_lower(param.data_mut(), lb.data());
    }
    if let Some(ub) = upper {
        check_shape(param, ub)?;
        clamp_upper(param.data_mut(), ub.data());
    }
    Ok(())
}

/// Project every parameter of `ty` with bounds derived from `eps`.
pub fn project_type<T: OptimizableType>(ty: &mut T, eps: f64) -> BplResult<()> {
    let lower = ty.lower_bounds(eps);
    let upper = ty.upper_bounds(eps);
    project_all(ty.parameters_mut(), &lower, &upper)
}

pub(crate) fn project_all(params: Vec<&mut Parameter>, lower: &[Bound], upper: &[Bound]) -> BplResult<()> {
    for ((param, lb), ub) in params.into_iter().zip(lower).zip(upper) {
        project(param, lb.as_ref(), ub.as_ref())?;
    }
    Ok(())
}

/// Whether every element of `param` lies within the present bounds.
pub fn is_feasible(param: &Parameter, lower: Option<&Tensor>, upper: Option<&Tensor>) -> bool {
    let above = lower.map_or(true, |lb| {
        param.data().iter().zip(lb.data()).all(|(v, b)| v >= b)
    });
    let below = upper.map_or(true, |ub| {
        param.data().iter().zip(ub.data()).all(|(v, b)| v <= b)
    });
    above && below
}
