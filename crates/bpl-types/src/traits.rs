//! Contracts between the optimizer and the probabilistic model.

use image::GrayImage;
use rand::RngCore;

use crate::autodiff::{Tape, Var};
use crate::errors::BplResult;
use crate::tensor::{Parameter, Tensor};

/// Per-parameter bound; `None` means unbounded on that side.
pub type Bound = Option<Tensor>;

/// A sampled object whose continuous parameters can be refined in place.
///
/// `parameters`, `lower_bounds` and `upper_bounds` must be aligned: the same
/// length, and each present bound shaped like its parameter.
pub trait OptimizableType {
    /// Parameters in a fixed order.
    fn parameters(&self) -> Vec<&Parameter>;

    /// Same parameters, same order, mutably.
    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    /// Lower bounds shrunk inward by `eps` where the constraint is open.
    fn lower_bounds(&self, eps: f64) -> Vec<Bound>;

    /// Upper bounds shrunk inward by `eps` where the constraint is open.
    fn upper_bounds(&self, eps: f64) -> Vec<Bound>;
}

/// Scores types and draws tokens and images from them.
pub trait TypeModel<T: OptimizableType> {
    type Token;

    /// Differentiable log-probability of `ty`, recorded on `tape`.
    fn score_type<'t>(&self, ty: &T, tape: &'t Tape) -> BplResult<Var<'t>>;

    /// Draw one token (an instance) of `ty`.
    fn sample_token(&self, ty: &T, rng: &mut dyn RngCore) -> BplResult<Self::Token>;

    /// Render a token to a grayscale image.
    fn sample_image(&self, token: &Self::Token, rng: &mut dyn RngCore) -> BplResult<GrayImage>;
}
