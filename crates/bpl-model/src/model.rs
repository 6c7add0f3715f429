//! Demo character model: sampling, differentiable scoring and rendering.
//!
//! The prior is deliberately small: Gaussian control points, Gamma inverse
//! scales, Gaussian start positions, and tabulated stroke and sub-stroke
//! counts. It exists so that the optimizer has something real to climb.

use std::f64::consts::PI;

use bpl_types::{model_error, validation_error, BplError, BplResult, Tape, TypeModel, Var};
use image::GrayImage;
use rand::distributions::{Distribution, WeightedIndex};
use rand::RngCore;
use rand_distr::{Gamma, Normal};
use statrs::function::gamma::ln_gamma;
use tracing::debug;

use crate::character::{stroke_from_parts, CharacterType, StrokeType};
use crate::library::Library;
use crate::render::{ink_probabilities, sample_binary_image, stroke_trajectory, CharacterToken};

pub struct CharacterModel {
    lib: Library,
}

impl CharacterModel {
    pub fn new(lib: Library) -> BplResult<Self> {
        lib.validate()?;
        Ok(Self { lib })
    }

    pub fn library(&self) -> &Library {
        &self.lib
    }

    /// Sample a character type with `k` strokes, or a prior-drawn count when
    /// `k` is `None`.
    pub fn sample_type(&self, k: Option<usize>, rng: &mut dyn RngCore) -> BplResult<CharacterType> {
        let k = match k {
            Some(k) if k == 0 || k > self.lib.max_strokes() => {
                return Err(validation_error!(
                    "number of strokes must be in 1..={}, got {k}",
                    self.lib.max_strokes()
                ));
            }
            Some(k) => k,
            None => sample_count(&self.lib.stroke_count_weights, rng)?,
        };

        let part_types = (0..k)
            .map(|_| self.sample_part_type(rng))
            .collect::<BplResult<Vec<_>>>()?;
        let ty = CharacterType::new(part_types, self.lib.canvas_size);
        debug!(k = ty.k(), nsub = ?ty.nsub_counts(), "sampled character type");
        Ok(ty)
    }

    fn sample_part_type(&self, rng: &mut dyn RngCore) -> BplResult<StrokeType> {
        let lib = &self.lib;
        let nsub = sample_count(&lib.nsub_weights, rng)?;

        let shape_dist = normal(0.0, lib.shape_sd)?;
        let shapes = (0..nsub * lib.ncpt * 2)
            .map(|_| shape_dist.sample(rng))
            .collect();

        let scale_dist = Gamma::new(lib.invscale_shape, 1.0 / lib.invscale_rate)
            .map_err(|e| sampling_error(format!("invscale prior: {e}")))?;
        let invscales = (0..nsub).map(|_| scale_dist.sample(rng)).collect();

        let centre = lib.canvas_centre();
        let pos_dist = normal(centre, lib.position_sd)?;
        let inside = |v: f64| v.clamp(1.0, lib.canvas_size - 1.0);
        let start = (inside(pos_dist.sample(rng)), inside(pos_dist.sample(rng)));

        stroke_from_parts(nsub, lib.ncpt, shapes, invscales, start)
    }
}

fn sampling_error(msg: String) -> BplError {
    BplError::Sampling(msg)
}

fn normal(mean: f64, sd: f64) -> BplResult<Normal<f64>> {
    Normal::new(mean, sd).map_err(|e| sampling_error(format!("normal({mean}, {sd}): {e}")))
}

/// Draw a 1-based count from unnormalized weights.
fn sample_count(weights: &[f64], rng: &mut dyn RngCore) -> BplResult<usize> {
    let dist = WeightedIndex::new(weights)
        .map_err(|e| sampling_error(format!("count weights: {e}")))?;
    Ok(dist.sample(rng) + 1)
}

fn normal_log_pdf<'t>(x: Var<'t>, mean: f64, sd: f64) -> Var<'t> {
    let z = (x - mean) / sd;
    z.square() * -0.5 - (sd.ln() + 0.5 * (2.0 * PI).ln())
}

fn gamma_log_pdf<'t>(x: Var<'t>, shape: f64, rate: f64) -> Var<'t> {
    x.ln() * (shape - 1.0) - x * rate + (shape * rate.ln() - ln_gamma(shape))
}

impl TypeModel<CharacterType> for CharacterModel {
    type Token = CharacterToken;

    fn score_type<'t>(&self, ty: &CharacterType, tape: &'t Tape) -> BplResult<Var<'t>> {
        let lib = &self.lib;
        let mut terms = vec![tape.constant(lib.log_prob_k(ty.k()))];

        for part in &ty.part_types {
            terms.push(tape.constant(lib.log_prob_nsub(part.nsub)));

            let shapes = tape.watch(&part.shapes);
            terms.extend(shapes.iter().map(|v| normal_log_pdf(v, 0.0, lib.shape_sd)));

            let invscales = tape.watch(&part.invscales);
            for v in invscales.iter() {
                if !(v.value() > 0.0) {
                    return Err(model_error!(
                        "inverse scale must be positive, got {}",
                        v.value()
                    ));
                }
                terms.push(gamma_log_pdf(v, lib.invscale_shape, lib.invscale_rate));
            }

            let start = tape.watch(&part.start);
            let centre = lib.canvas_centre();
            terms.extend(start.iter().map(|v| normal_log_pdf(v, centre, lib.position_sd)));
        }

        Ok(tape.sum(terms))
    }

    fn sample_token(&self, ty: &CharacterType, rng: &mut dyn RngCore) -> BplResult<CharacterToken> {
        let lib = &self.lib;
        let shape_noise = normal(0.0, lib.motor_shape_sd)?;
        let pos_noise = normal(0.0, lib.motor_position_sd)?;

        let strokes = ty
            .part_types
            .iter()
            .map(|part| {
                let control_points: Vec<Vec<(f64, f64)>> = (0..part.nsub)
                    .map(|sub| {
                        part.control_points(sub)
                            .into_iter()
                            .map(|(x, y)| (x + shape_noise.sample(rng), y + shape_noise.sample(rng)))
                            .collect()
                    })
                    .collect();
                let s = part.start.data();
                let start = (s[0] + pos_noise.sample(rng), s[1] + pos_noise.sample(rng));
                stroke_trajectory(start, &control_points, part.invscales.data())
            })
            .collect();
        Ok(CharacterToken { strokes })
    }

    fn sample_image(&self, token: &CharacterToken, rng: &mut dyn RngCore) -> BplResult<GrayImage> {
        let size = self.lib.canvas_size.round() as u32;
        let probs = ink_probabilities(token, size, self.lib.brush_radius)?;
        sample_binary_image(&probs, size, self.lib.ink_flip_prob, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bpl_types::OptimizableType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model() -> CharacterModel {
        CharacterModel::new(Library::default()).unwrap()
    }

    /// Central finite difference of the score along one parameter element.
    fn numeric_grad(model: &CharacterModel, ty: &mut CharacterType, param: usize, elem: usize) -> f64 {
        let h = 1e-6;
        let eval = |ty: &CharacterType| {
            let tape = Tape::new();
            let score = model.score_type(ty, &tape).unwrap().value();
            score
        };
        ty.parameters_mut()[param].data_mut()[elem] += h;
        let up = eval(&*ty);
        ty.parameters_mut()[param].data_mut()[elem] -= 2.0 * h;
        let down = eval(&*ty);
        ty.parameters_mut()[param].data_mut()[elem] += h;
        (up - down) / (2.0 * h)
    }

    #[test]
    fn sample_type_respects_requested_stroke_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let ty = model().sample_type(Some(3), &mut rng).unwrap();
        assert_eq!(ty.k(), 3);
        assert_eq!(ty.part_types.len(), 3);
        for part in &ty.part_types {
            assert!(part.nsub >= 1 && part.nsub <= Library::default().max_nsub());
            assert_eq!(part.shapes.shape(), &[part.nsub, 5, 2]);
            assert!(part.invscales.data().iter().all(|v| *v > 0.0));
        }
    }

    #[test]
    fn model_rejects_libraries_it_cannot_render() {
        let huge = Library {
            canvas_size: 70_000.0,
            ..Library::default()
        };
        assert!(CharacterModel::new(huge).is_err());

        let negative_noise = Library {
            motor_shape_sd: -1.0,
            ..Library::default()
        };
        assert!(CharacterModel::new(negative_noise).is_err());
    }

    #[test]
    fn sample_type_rejects_out_of_range_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(model().sample_type(Some(0), &mut rng).is_err());
        assert!(model().sample_type(Some(99), &mut rng).is_err());
    }

    #[test]
    fn score_gradient_matches_finite_differences() {
        let model = model();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut ty = model.sample_type(Some(2), &mut rng).unwrap();

        let tape = Tape::new();
        let score = model.score_type(&ty, &tape).unwrap();
        let grads = tape.backward(score);
        let analytic: Vec<Vec<f64>> = ty
            .parameters()
            .iter()
            .map(|p| grads.wrt(p).unwrap().to_vec())
            .collect();

        for (param, elem) in [(0, 0), (1, 0), (2, 1), (3, 3), (4, 0), (5, 0)] {
            let numeric = numeric_grad(&model, &mut ty, param, elem);
            assert_relative_eq!(analytic[param][elem], numeric, epsilon = 1e-4, max_relative = 1e-4);
        }
    }

    #[test]
    fn score_includes_discrete_terms() {
        let model = model();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let ty = model.sample_type(Some(1), &mut rng).unwrap();
        let tape = Tape::new();
        let score = model.score_type(&ty, &tape).unwrap().value();
        assert!(score.is_finite());
        assert!(score < model.library().log_prob_k(1));
    }

    #[test]
    fn tokens_render_to_canvas_sized_images() {
        let model = model();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let ty = model.sample_type(Some(2), &mut rng).unwrap();
        let token = model.sample_token(&ty, &mut rng).unwrap();
        assert_eq!(token.strokes.len(), 2);

        let img = model.sample_image(&token, &mut rng).unwrap();
        assert_eq!(img.dimensions(), (105, 105));
    }
}
