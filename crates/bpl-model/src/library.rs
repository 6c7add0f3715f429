//! Prior hyper-parameters for the demo character model.

use std::path::Path;

use bpl_types::{validation_error, BplResult};
use serde::{Deserialize, Serialize};

/// Largest canvas side the renderer accepts, in pixels.
pub const MAX_CANVAS_SIZE: f64 = 4096.0;

/// Hyper-parameters of the character prior, motor noise and renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    /// Side length of the square canvas, in pixels.
    pub canvas_size: f64,

    /// Unnormalized P(k) for k = 1, 2, ... strokes.
    pub stroke_count_weights: Vec<f64>,

    /// Unnormalized P(nsub) for nsub = 1, 2, ... sub-strokes per stroke.
    pub nsub_weights: Vec<f64>,

    /// Control points per sub-stroke.
    pub ncpt: usize,

    /// Standard deviation of control-point coordinates (unit scale).
    pub shape_sd: f64,

    /// Gamma prior on inverse scales: shape and rate.
    pub invscale_shape: f64,
    pub invscale_rate: f64,

    /// Standard deviation of stroke start positions around the canvas centre.
    pub position_sd: f64,

    /// Token-level motor noise on control points and start positions.
    pub motor_shape_sd: f64,
    pub motor_position_sd: f64,

    /// Brush radius used when rasterizing, in pixels.
    pub brush_radius: f64,

    /// Probability that an off-stroke pixel is inked, or an on-stroke pixel
    /// is left blank.
    pub ink_flip_prob: f64,
}

impl Default for Library {
    fn default() -> Self {
        Self {
            canvas_size: 105.0,
            stroke_count_weights: vec![0.38, 0.32, 0.17, 0.08, 0.03, 0.01, 0.01],
            nsub_weights: vec![0.52, 0.30, 0.13, 0.05],
            ncpt: 5,
            shape_sd: 1.0,
            invscale_shape: 4.0,
            invscale_rate: 40.0,
            position_sd: 20.0,
            motor_shape_sd: 0.05,
            motor_position_sd: 1.5,
            brush_radius: 1.5,
            ink_flip_prob: 1e-3,
        }
    }
}

impl Library {
    pub fn from_json_file(path: impl AsRef<Path>) -> BplResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let lib: Self = serde_json::from_str(&text)?;
        lib.validate()?;
        Ok(lib)
    }

    pub fn validate(&self) -> BplResult<()> {
        if !(self.canvas_size > 2.0 && self.canvas_size <= MAX_CANVAS_SIZE) {
            return Err(validation_error!(
                "canvas_size must lie in (2, {MAX_CANVAS_SIZE}] pixels, got {}",
                self.canvas_size
            ));
        }
        for (name, weights) in [
            ("stroke_count_weights", &self.stroke_count_weights),
            ("nsub_weights", &self.nsub_weights),
        ] {
            if weights.is_empty() || weights.iter().any(|w| !(*w >= 0.0)) {
                return Err(validation_error!("{name} must be non-empty and non-negative"));
            }
            if weights.iter().sum::<f64>() <= 0.0 {
                return Err(validation_error!("{name} must have positive mass"));
            }
        }
        if self.ncpt < 2 {
            return Err(validation_error!("ncpt must be at least 2, got {}", self.ncpt));
        }
        for (name, value) in [
            ("shape_sd", self.shape_sd),
            ("invscale_shape", self.invscale_shape),
            ("invscale_rate", self.invscale_rate),
            ("position_sd", self.position_sd),
            ("motor_shape_sd", self.motor_shape_sd),
            ("motor_position_sd", self.motor_position_sd),
            ("brush_radius", self.brush_radius),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(validation_error!("{name} must be positive, got {value}"));
            }
        }
        if !(0.0..=0.5).contains(&self.ink_flip_prob) {
            return Err(validation_error!(
                "ink_flip_prob must lie in [0, 0.5], got {}",
                self.ink_flip_prob
            ));
        }
        Ok(())
    }

    /// Largest stroke count with a prior weight.
    pub fn max_strokes(&self) -> usize {
        self.stroke_count_weights.len()
    }

    pub fn max_nsub(&self) -> usize {
        self.nsub_weights.len()
    }

    /// log P(k); `-inf` outside the table.
    pub fn log_prob_k(&self, k: usize) -> f64 {
        log_prob_index(&self.stroke_count_weights, k)
    }

    /// log P(nsub); `-inf` outside the table.
    pub fn log_prob_nsub(&self, nsub: usize) -> f64 {
        log_prob_index(&self.nsub_weights, nsub)
    }

    pub fn canvas_centre(&self) -> f64 {
        self.canvas_size / 2.0
    }
}

/// Log of the normalized weight for the 1-based `count`.
fn log_prob_index(weights: &[f64], count: usize) -> f64 {
    let total: f64 = weights.iter().sum();
    match count.checked_sub(1).and_then(|i| weights.get(i)) {
        Some(w) if *w > 0.0 && total > 0.0 => (w / total).ln(),
        _ => f64::NEG_INFINITY,
    }
}
