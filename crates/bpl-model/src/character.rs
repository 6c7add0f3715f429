//! Character types: the sampled objects whose parameters get optimized.

use bpl_types::{Bound, OptimizableType, Parameter, Tensor};

/// One stroke of a character type.
///
/// `shapes` has shape `[nsub, ncpt, 2]` (unit-scale control-point offsets),
/// `invscales` has shape `[nsub]`, `start` has shape `[2]` (canvas pixels).
#[derive(Debug, Clone)]
pub struct StrokeType {
    pub nsub: usize,
    pub shapes: Parameter,
    pub invscales: Parameter,
    pub start: Parameter,
}

impl StrokeType {
    pub fn ncpt(&self) -> usize {
        self.shapes.shape().get(1).copied().unwrap_or(0)
    }

    /// Control points of sub-stroke `sub` as `(x, y)` offsets.
    pub fn control_points(&self, sub: usize) -> Vec<(f64, f64)> {
        let ncpt = self.ncpt();
        let data = self.shapes.data();
        (0..ncpt)
            .map(|c| {
                let base = (sub * ncpt + c) * 2;
                (data[base], data[base + 1])
            })
            .collect()
    }
}

/// A sampled character type: `k` strokes, each with its own sub-strokes.
#[derive(Debug, Clone)]
pub struct CharacterType {
    pub part_types: Vec<StrokeType>,
    canvas_size: f64,
}

impl CharacterType {
    pub fn new(part_types: Vec<StrokeType>, canvas_size: f64) -> Self {
        Self {
            part_types,
            canvas_size,
        }
    }

    /// Number of strokes.
    pub fn k(&self) -> usize {
        self.part_types.len()
    }

    pub fn canvas_size(&self) -> f64 {
        self.canvas_size
    }

    /// Number of sub-strokes of every stroke, in stroke order.
    pub fn nsub_counts(&self) -> Vec<usize> {
        self.part_types.iter().map(|p| p.nsub).collect()
    }
}

impl OptimizableType for CharacterType {
    fn parameters(&self) -> Vec<&Parameter> {
        self.part_types
            .iter()
            .flat_map(|p| [&p.shapes, &p.invscales, &p.start])
            .collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.part_types
            .iter_mut()
            .flat_map(|p| [&mut p.shapes, &mut p.invscales, &mut p.start])
            .collect()
    }

    /// Shapes are unbounded, inverse scales stay above `eps`, start
    /// positions stay `eps` inside the canvas.
    fn lower_bounds(&self, eps: f64) -> Vec<Bound> {
        self.part_types
            .iter()
            .flat_map(|p| {
                [
                    None,
                    Some(p.invscales.value().full_like(eps)),
                    Some(p.start.value().full_like(eps)),
                ]
            })
            .collect()
    }

    fn upper_bounds(&self, eps: f64) -> Vec<Bound> {
        let edge = self.canvas_size - eps;
        self.part_types
            .iter()
            .flat_map(|p| [None, None, Some(p.start.value().full_like(edge))])
            .collect()
    }
}

/// Build a stroke from flat data; used by the model and by tests.
pub fn stroke_from_parts(
    nsub: usize,
    ncpt: usize,
    shapes: Vec<f64>,
    invscales: Vec<f64>,
    start: (f64, f64),
) -> bpl_types::BplResult<StrokeType> {
    Ok(StrokeType {
        nsub,
        shapes: Parameter::new("shapes", Tensor::new(vec![nsub, ncpt, 2], shapes)?),
        invscales: Parameter::new("invscales", Tensor::new(vec![nsub], invscales)?),
        start: Parameter::new("start", Tensor::from_vec(vec![start.0, start.1])),
    })
}
