//! # bpl-types
//!
//! Core building blocks shared by the bpl-rs crates: dense tensors and
//! trainable parameters, a scalar reverse-mode autodiff tape, the error type,
//! and the contracts a model and a type must satisfy to be optimized.

pub mod autodiff;
pub mod errors;
pub mod tensor;
pub mod traits;

pub use autodiff::{Gradients, Tape, TensorVar, Var};
pub use errors::*;
pub use tensor::{Parameter, Tensor};
pub use traits::{Bound, OptimizableType, TypeModel};
