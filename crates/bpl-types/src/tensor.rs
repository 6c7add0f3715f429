//! Dense `f64` tensors and trainable parameters.
//!
//! A [`Parameter`] owns its value tensor and a gradient buffer of the same
//! length. Its shape is fixed at construction; only values change.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{BplError, BplResult};

/// Row-major dense array of `f64` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> BplResult<Self> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(BplError::Validation(format!(
                "tensor of shape {shape:?} needs {numel} values, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Zero-dimensional tensor holding one value.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// One-dimensional tensor over `data`.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn full(shape: Vec<usize>, value: f64) -> Self {
        let numel = shape.iter().product();
        Self {
            shape,
            data: vec![value; numel],
        }
    }

    /// Tensor with the same shape as `self` filled with `value`.
    pub fn full_like(&self, value: f64) -> Self {
        Self::full(self.shape.clone(), value)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// The single value of a one-element tensor.
    pub fn item(&self) -> Option<f64> {
        match self.data.as_slice() {
            [v] => Some(*v),
            _ => None,
        }
    }
}

/// A named tensor that the optimizer may update in place.
#[derive(Debug, Clone)]
pub struct Parameter {
    id: Uuid,
    name: String,
    value: Tensor,
    grad: Vec<f64>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Tensor) -> Self {
        let grad = vec![0.0; value.numel()];
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            value,
            grad,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }

    pub fn data(&self) -> &[f64] {
        self.value.data()
    }

    /// Mutable view of the values. The shape cannot be changed through it.
    pub fn data_mut(&mut self) -> &mut [f64] {
        self.value.data_mut()
    }

    pub fn grad(&self) -> &[f64] {
        &self.grad
    }

    pub fn zero_grad(&mut self) {
        self.grad.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Add `grad` element-wise into the gradient buffer.
    pub fn accumulate_grad(&mut self, grad: &[f64]) -> BplResult<()> {
        if grad.len() != self.grad.len() {
            return Err(BplError::ShapeMismatch {
                name: self.name.clone(),
                expected: self.value.shape().to_vec(),
                actual: vec![grad.len()],
            });
        }
        for (acc, g) in self.grad.iter_mut().zip(grad) {
            *acc += g;
        }
        Ok(())
    }

    /// Split borrow of values and gradient, used by optimizers.
    pub fn value_and_grad_mut(&mut self) -> (&mut [f64], &[f64]) {
        (self.value.data_mut(), &self.grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_rejects_wrong_length() {
        assert!(Tensor::new(vec![2, 3], vec![0.0; 5]).is_err());
        let t = Tensor::new(vec![2, 3], vec![1.0; 6]).unwrap();
        assert_eq!(t.numel(), 6);
        assert_eq!(t.shape(), &[2, 3]);
    }

    #[test]
    fn scalar_item() {
        assert_eq!(Tensor::scalar(1.5).item(), Some(1.5));
        assert_eq!(Tensor::from_vec(vec![1.0, 2.0]).item(), None);
    }

    #[test]
    fn parameter_gradient_accumulates_and_resets() {
        let mut p = Parameter::new("w", Tensor::from_vec(vec![1.0, 2.0]));
        p.accumulate_grad(&[0.5, -1.0]).unwrap();
        p.accumulate_grad(&[0.5, -1.0]).unwrap();
        assert_eq!(p.grad(), &[1.0, -2.0]);

        p.zero_grad();
        assert_eq!(p.grad(), &[0.0, 0.0]);
        assert!(p.accumulate_grad(&[1.0]).is_err());
    }

    #[test]
    fn parameters_get_distinct_ids() {
        let a = Parameter::new("a", Tensor::scalar(0.0));
        let b = Parameter::new("a", Tensor::scalar(0.0));
        assert_ne!(a.id(), b.id());
    }
}
