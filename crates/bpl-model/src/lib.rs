//! # bpl-model
//!
//! A small generative model of handwritten characters used to drive
//! [`bpl_optimizer::optimize_type`]: a prior [`Library`], sampled
//! [`CharacterType`]s with bounded continuous parameters, and a
//! [`CharacterModel`] that scores types and renders noisy tokens.

pub mod character;
pub mod library;
pub mod model;
pub mod render;

pub use character::{stroke_from_parts, CharacterType, StrokeType};
pub use library::Library;
pub use model::CharacterModel;
pub use render::CharacterToken;
