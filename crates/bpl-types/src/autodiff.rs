//! Scalar reverse-mode automatic differentiation.
//!
//! A [`Tape`] records every arithmetic operation on [`Var`]s as a node holding
//! its value and the local partial derivatives with respect to at most two
//! parents. [`Tape::backward`] sweeps the nodes in reverse and returns the
//! adjoint of every node, from which per-[`Parameter`] gradients are read.
//!
//! Tapes are cheap and meant to be rebuilt for every evaluation: values that
//! are changed outside the tape (for example by a projection step) never show
//! up in a later gradient.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::{Add, Div, Mul, Neg, Sub};

use uuid::Uuid;

use crate::tensor::Parameter;

#[derive(Debug, Clone, Copy)]
struct Node {
    value: f64,
    parents: [(usize, f64); 2],
    arity: usize,
}

/// Span of leaf nodes created for one watched parameter.
#[derive(Debug, Clone, Copy)]
struct LeafSpan {
    start: usize,
    len: usize,
}

/// Wengert list of scalar operations.
#[derive(Debug, Default)]
pub struct Tape {
    nodes: RefCell<Vec<Node>>,
    leaves: RefCell<HashMap<Uuid, LeafSpan>>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, value: f64, parents: [(usize, f64); 2], arity: usize) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(Node {
            value,
            parents,
            arity,
        });
        nodes.len() - 1
    }

    /// A value that does not depend on any watched parameter.
    pub fn constant(&self, value: f64) -> Var<'_> {
        let index = self.push(value, [(0, 0.0); 2], 0);
        Var {
            tape: self,
            index,
            value,
        }
    }

    /// Register `param` as an input and return one leaf per element.
    ///
    /// Watching the same parameter twice returns the same leaves, so
    /// gradients from every use accumulate.
    pub fn watch(&self, param: &Parameter) -> TensorVar<'_> {
        if let Some(span) = self.leaves.borrow().get(&param.id()) {
            let nodes = self.nodes.borrow();
            let vars = (span.start..span.start + span.len)
                .map(|index| Var {
                    tape: self,
                    index,
                    value: nodes[index].value,
                })
                .collect();
            return TensorVar { vars };
        }

        let start = self.len();
        let vars: Vec<Var<'_>> = param
            .data()
            .iter()
            .map(|v| self.constant(*v))
            .collect();
        self.leaves.borrow_mut().insert(
            param.id(),
            LeafSpan {
                start,
                len: vars.len(),
            },
        );
        TensorVar { vars }
    }

    /// Sum of an arbitrary number of vars; an empty sum is the constant 0.
    pub fn sum<'t>(&'t self, vars: impl IntoIterator<Item = Var<'t>>) -> Var<'t> {
        vars.into_iter()
            .fold(self.constant(0.0), |acc, v| acc + v)
    }

    /// Adjoints of every node with respect to `output`.
    pub fn backward(&self, output: Var<'_>) -> Gradients {
        let nodes = self.nodes.borrow();
        let mut adjoints = vec![0.0; nodes.len()];
        adjoints[output.index] = 1.0;

        for index in (0..=output.index).rev() {
            let adjoint = adjoints[index];
            if adjoint == 0.0 {
                continue;
            }
            let node = &nodes[index];
            for &(parent, partial) in &node.parents[..node.arity] {
                adjoints[parent] += adjoint * partial;
            }
        }

        let leaves = self
            .leaves
            .borrow()
            .iter()
            .map(|(id, span)| (*id, *span))
            .collect();
        Gradients { adjoints, leaves }
    }
}

/// Result of a backward sweep.
#[derive(Debug, Clone)]
pub struct Gradients {
    adjoints: Vec<f64>,
    leaves: HashMap<Uuid, LeafSpan>,
}

impl Gradients {
    /// Gradient with respect to a watched parameter, `None` if the
    /// parameter was never watched on this tape.
    pub fn wrt(&self, param: &Parameter) -> Option<&[f64]> {
        self.leaves
            .get(&param.id())
            .map(|span| &self.adjoints[span.start..span.start + span.len])
    }

    /// Gradient with respect to an individual var.
    pub fn of(&self, var: Var<'_>) -> f64 {
        self.adjoints.get(var.index).copied().unwrap_or(0.0)
    }
}

/// A scalar recorded on a [`Tape`].
#[derive(Clone, Copy)]
pub struct Var<'t> {
    tape: &'t Tape,
    index: usize,
    value: f64,
}

impl std::fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Var")
            .field("index", &self.index)
            .field("value", &self.value)
            .finish()
    }
}

impl<'t> Var<'t> {
    /// Detached value.
    pub fn value(&self) -> f64 {
        self.value
    }

    fn unary(self, value: f64, partial: f64) -> Var<'t> {
        let index = self
            .tape
            .push(value, [(self.index, partial), (0, 0.0)], 1);
        Var {
            tape: self.tape,
            index,
            value,
        }
    }

    fn binary(self, other: Var<'t>, value: f64, d_self: f64, d_other: f64) -> Var<'t> {
        let index = self
            .tape
            .push(value, [(self.index, d_self), (other.index, d_other)], 2);
        Var {
            tape: self.tape,
            index,
            value,
        }
    }

    pub fn ln(self) -> Var<'t> {
        self.unary(self.value.ln(), 1.0 / self.value)
    }

    pub fn exp(self) -> Var<'t> {
        let e = self.value.exp();
        self.unary(e, e)
    }

    pub fn sqrt(self) -> Var<'t> {
        let s = self.value.sqrt();
        self.unary(s, 0.5 / s)
    }

    pub fn square(self) -> Var<'t> {
        self.unary(self.value * self.value, 2.0 * self.value)
    }
}

impl<'t> Add for Var<'t> {
    type Output = Var<'t>;
    fn add(self, rhs: Var<'t>) -> Var<'t> {
        self.binary(rhs, self.value + rhs.value, 1.0, 1.0)
    }
}

impl<'t> Sub for Var<'t> {
    type Output = Var<'t>;
    fn sub(self, rhs: Var<'t>) -> Var<'t> {
        self.binary(rhs, self.value - rhs.value, 1.0, -1.0)
    }
}

impl<'t> Mul for Var<'t> {
    type Output = Var<'t>;
    fn mul(self, rhs: Var<'t>) -> Var<'t> {
        self.binary(rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl<'t> Div for Var<'t> {
    type Output = Var<'t>;
    fn div(self, rhs: Var<'t>) -> Var<'t> {
        let q = self.value / rhs.value;
        self.binary(rhs, q, 1.0 / rhs.value, -q / rhs.value)
    }
}

impl<'t> Neg for Var<'t> {
    type Output = Var<'t>;
    fn neg(self) -> Var<'t> {
        self.unary(-self.value, -1.0)
    }
}

impl<'t> Add<f64> for Var<'t> {
    type Output = Var<'t>;
    fn add(self, rhs: f64) -> Var<'t> {
        self.unary(self.value + rhs, 1.0)
    }
}

impl<'t> Sub<f64> for Var<'t> {
    type Output = Var<'t>;
    fn sub(self, rhs: f64) -> Var<'t> {
        self.unary(self.value - rhs, 1.0)
    }
}

impl<'t> Mul<f64> for Var<'t> {
    type Output = Var<'t>;
    fn mul(self, rhs: f64) -> Var<'t> {
        self.unary(self.value * rhs, rhs)
    }
}

impl<'t> Div<f64> for Var<'t> {
    type Output = Var<'t>;
    fn div(self, rhs: f64) -> Var<'t> {
        self.unary(self.value / rhs, 1.0 / rhs)
    }
}

impl<'t> Add<Var<'t>> for f64 {
    type Output = Var<'t>;
    fn add(self, rhs: Var<'t>) -> Var<'t> {
        rhs + self
    }
}

impl<'t> Sub<Var<'t>> for f64 {
    type Output = Var<'t>;
    fn sub(self, rhs: Var<'t>) -> Var<'t> {
        rhs.unary(self - rhs.value, -1.0)
    }
}

impl<'t> Mul<Var<'t>> for f64 {
    type Output = Var<'t>;
    fn mul(self, rhs: Var<'t>) -> Var<'t> {
        rhs * self
    }
}

/// The leaves of one watched parameter, in row-major order.
#[derive(Debug, Clone)]
pub struct TensorVar<'t> {
    vars: Vec<Var<'t>>,
}

impl<'t> TensorVar<'t> {
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Var<'t>> {
        self.vars.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Var<'t>> + '_ {
        self.vars.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use approx::assert_relative_eq;

    #[test]
    fn gradient_of_polynomial() {
        let tape = Tape::new();
        let x = tape.constant(3.0);
        // f = x^2 + 2x + 1, df/dx = 2x + 2
        let f = x.square() + x * 2.0 + 1.0;
        assert_relative_eq!(f.value(), 16.0);
        let grads = tape.backward(f);
        assert_relative_eq!(grads.of(x), 8.0);
    }

    #[test]
    fn gradient_of_log_and_division() {
        let tape = Tape::new();
        let a = tape.constant(2.0);
        let b = tape.constant(4.0);
        let f = (a / b).ln() - b.exp() * 0.0 + a.sqrt();
        let grads = tape.backward(f);
        // d/da ln(a/b) = 1/a, d/da sqrt(a) = 1/(2 sqrt a)
        assert_relative_eq!(grads.of(a), 0.5 + 0.5 / 2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(grads.of(b), -0.25, epsilon = 1e-12);
    }

    #[test]
    fn watched_parameter_gradients_accumulate_across_uses() {
        let param = Parameter::new("w", Tensor::from_vec(vec![1.0, -2.0]));
        let tape = Tape::new();
        let w = tape.watch(&param);
        let again = tape.watch(&param);
        let f = tape.sum(w.iter().map(|v| v.square())) + tape.sum(again.iter());

        let grads = tape.backward(f);
        let g = grads.wrt(&param).unwrap();
        assert_relative_eq!(g[0], 3.0);
        assert_relative_eq!(g[1], -3.0);
    }

    #[test]
    fn unwatched_parameter_has_no_gradient() {
        let param = Parameter::new("w", Tensor::scalar(1.0));
        let tape = Tape::new();
        let f = tape.constant(-3.0);
        let grads = tape.backward(f);
        assert!(grads.wrt(&param).is_none());
    }
}
