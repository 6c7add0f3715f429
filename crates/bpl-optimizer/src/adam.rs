//! Adam optimizer over a fixed list of [`Parameter`]s.
//!
//! Moment estimates are kept per parameter, per element, in the order the
//! parameters are passed to [`Adam::step`]. The parameter list must keep the
//! same order and shapes for the lifetime of one optimizer.

use bpl_types::{BplError, BplResult, Parameter};
use serde::{Deserialize, Serialize};

/// Adam hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl AdamConfig {
    /// Standard decay rates (0.9, 0.999) and stability constant 1e-8.
    pub fn with_lr(lr: f64) -> Self {
        Self {
            lr,
            ..Self::default()
        }
    }
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

pub struct Adam {
    config: AdamConfig,
    t: u32,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> u32 {
        self.t
    }

    fn ensure_state(&mut self, params: &[&mut Parameter]) -> BplResult<()> {
        if self.m.is_empty() {
            self.m = params.iter().map(|p| vec![0.0; p.data().len()]).collect();
            self.v = self.m.clone();
            return Ok(());
        }
        if self.m.len() != params.len() {
            return Err(BplError::Validation(format!(
                "optimizer tracks {} parameters, step got {}",
                self.m.len(),
                params.len()
            )));
        }
        for (m, p) in self.m.iter().zip(params) {
            if m.len() != p.data().len() {
                return Err(BplError::ShapeMismatch {
                    name: p.name().to_string(),
                    expected: vec![m.len()],
                    actual: p.shape().to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Apply one update using the gradients currently stored on `params`.
    pub fn step(&mut self, params: &mut [&mut Parameter]) -> BplResult<()> {
        self.ensure_state(params)?;

        self.t += 1;
        let t = self.t as i32;
        let AdamConfig {
            lr,
            beta1: b1,
            beta2: b2,
            eps,
        } = self.config;

        let bias1 = 1.0 - b1.powi(t);
        let bias2 = 1.0 - b2.powi(t);

        for ((param, m), v) in params.iter_mut().zip(&mut self.m).zip(&mut self.v) {
            let (values, grads) = param.value_and_grad_mut();
            for i in 0..values.len() {
                let g = grads[i];
                m[i] = m[i] * b1 + g * (1.0 - b1);
                v[i] = v[i] * b2 + g * g * (1.0 - b2);

                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;

                values[i] -= lr * m_hat / (v_hat.sqrt() + eps);
            }
        }
        Ok(())
    }
}
