//! Constrained gradient ascent on a type's log-likelihood.

use bpl_types::{BplResult, OptimizableType, Tape, TypeModel};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::adam::Adam;
use crate::config::OptimizeConfig;
use crate::diagnostics::DiagnosticSink;
use crate::projection::{project_all, validate_bounds};

/// Upper limit on the trajectory buffer reserved before the first step.
const MAX_PREALLOCATED_SCORES: usize = 1 << 16;

/// Refine the parameters of `ty` in place to increase `model.score_type(ty)`.
///
/// Runs `config.nb_iter` rounded to the nearest ten iterations. Each one
/// records the current score, takes an Adam step on the negated score and
/// projects every parameter into the bounds the type reports for
/// `config.eps` (lower bound first, then upper). Ten evenly spaced
/// checkpoints are reported to `sink`; with `show_examples` each checkpoint
/// also carries `samples_per_row` images rendered from fresh tokens.
///
/// Returns the score trajectory, one entry per iteration.
pub fn optimize_type<T, M>(
    model: &M,
    ty: &mut T,
    config: &OptimizeConfig,
    sink: &mut dyn DiagnosticSink,
) -> BplResult<Vec<f64>>
where
    T: OptimizableType,
    M: TypeModel<T>,
{
    let nb_iter = config.effective_iterations();
    let interval = config.checkpoint_interval();

    let lower = ty.lower_bounds(config.eps);
    let upper = ty.upper_bounds(config.eps);
    validate_bounds(&ty.parameters(), &lower, &upper)?;

    info!(
        nb_iter,
        lr = config.lr,
        eps = config.eps,
        parameters = lower.len(),
        "optimizing type"
    );

    let mut adam = Adam::new(config.adam());
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut scores = Vec::with_capacity(nb_iter.min(MAX_PREALLOCATED_SCORES));

    for idx in 0..nb_iter {
        if interval > 0 && idx % interval == 0 {
            let row = idx / interval;
            info!("iteration #{idx}");
            sink.checkpoint(row, idx);
            if config.show_examples {
                for col in 0..config.samples_per_row {
                    let token = model.sample_token(ty, &mut rng)?;
                    let image = model.sample_image(&token, &mut rng)?;
                    sink.record_sample(row, col, image);
                }
            }
        }

        for param in ty.parameters_mut() {
            param.zero_grad();
        }

        let tape = Tape::new();
        let score = model.score_type(ty, &tape)?;
        let value = score.value();
        if !value.is_finite() {
            warn!(iteration = idx, score = value, "non-finite score");
        }
        debug!(iteration = idx, score = value);
        scores.push(value);

        let grads = tape.backward(-score);
        let mut params = ty.parameters_mut();
        for param in params.iter_mut() {
            if let Some(g) = grads.wrt(param) {
                param.accumulate_grad(g)?;
            }
        }
        adam.step(&mut params)?;
        project_all(params, &lower, &upper)?;
    }

    if let (Some(first), Some(last)) = (scores.first(), scores.last()) {
        info!(initial = first, last = last, "optimization finished");
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{NullSink, SampleGrid};
    use approx::assert_relative_eq;
    use bpl_types::{Bound, Parameter, Tensor, Var};
    use image::{GrayImage, Luma};
    use rand::RngCore;

    /// Two scalars: `x` in [0, 1] and unbounded `y`.
    struct Pair {
        x: Parameter,
        y: Parameter,
    }

    impl OptimizableType for Pair {
        fn parameters(&self) -> Vec<&Parameter> {
            vec![&self.x, &self.y]
        }

        fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
            vec![&mut self.x, &mut self.y]
        }

        fn lower_bounds(&self, eps: f64) -> Vec<Bound> {
            vec![Some(Tensor::scalar(eps)), None]
        }

        fn upper_bounds(&self, eps: f64) -> Vec<Bound> {
            vec![Some(Tensor::scalar(1.0 - eps)), None]
        }
    }

    /// score = -(x - 2)^2 - (y + 1)^2; the optimum for x is outside its box.
    struct Quadratic;

    impl TypeModel<Pair> for Quadratic {
        type Token = f64;

        fn score_type<'t>(&self, ty: &Pair, tape: &'t Tape) -> BplResult<Var<'t>> {
            let x = tape.watch(&ty.x).get(0).unwrap();
            let y = tape.watch(&ty.y).get(0).unwrap();
            Ok(-(x - 2.0).square() - (y + 1.0).square())
        }

        fn sample_token(&self, ty: &Pair, _rng: &mut dyn RngCore) -> BplResult<f64> {
            Ok(ty.x.data()[0])
        }

        fn sample_image(&self, token: &f64, _rng: &mut dyn RngCore) -> BplResult<GrayImage> {
            Ok(GrayImage::from_pixel(2, 2, Luma([(token * 255.0) as u8])))
        }
    }

    fn pair() -> Pair {
        Pair {
            x: Parameter::new("x", Tensor::scalar(0.5)),
            y: Parameter::new("y", Tensor::scalar(0.0)),
        }
    }

    #[test]
    fn climbs_to_the_bound_and_the_free_optimum() {
        let mut ty = pair();
        let config = OptimizeConfig::new(0.05, 400, 1e-3).with_show_examples(false);
        let scores = optimize_type(&Quadratic, &mut ty, &config, &mut NullSink).unwrap();

        assert_eq!(scores.len(), 400);
        assert_relative_eq!(ty.x.data()[0], 1.0 - 1e-3, epsilon = 1e-12);
        assert!((ty.y.data()[0] + 1.0).abs() < 0.05);
        assert!(scores.last().unwrap() > scores.first().unwrap());
    }

    #[test]
    fn grid_gets_ten_rows_of_samples() {
        let mut ty = pair();
        let config = OptimizeConfig::new(0.01, 100, 1e-4);
        let mut grid = SampleGrid::new(10, 4);
        optimize_type(&Quadratic, &mut ty, &config, &mut grid).unwrap();

        assert_eq!(grid.checkpoints(), &[0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
        for row in 0..10 {
            assert_eq!(grid.label(row), Some(row * 10));
            for col in 0..4 {
                assert!(grid.cell(row, col).is_some());
            }
        }
    }

    #[test]
    fn misaligned_bounds_are_rejected_before_any_step() {
        struct Broken(Parameter);
        impl OptimizableType for Broken {
            fn parameters(&self) -> Vec<&Parameter> {
                vec![&self.0]
            }
            fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
                vec![&mut self.0]
            }
            fn lower_bounds(&self, _eps: f64) -> Vec<Bound> {
                vec![]
            }
            fn upper_bounds(&self, _eps: f64) -> Vec<Bound> {
                vec![None]
            }
        }
        struct Flat;
        impl TypeModel<Broken> for Flat {
            type Token = ();
            fn score_type<'t>(&self, _ty: &Broken, tape: &'t Tape) -> BplResult<Var<'t>> {
                Ok(tape.constant(0.0))
            }
            fn sample_token(&self, _ty: &Broken, _rng: &mut dyn RngCore) -> BplResult<()> {
                Ok(())
            }
            fn sample_image(&self, _token: &(), _rng: &mut dyn RngCore) -> BplResult<GrayImage> {
                Ok(GrayImage::new(1, 1))
            }
        }

        let mut ty = Broken(Parameter::new("p", Tensor::scalar(3.0)));
        let config = OptimizeConfig::new(0.1, 10, 1e-4);
        assert!(optimize_type(&Flat, &mut ty, &config, &mut NullSink).is_err());
        assert_eq!(ty.0.data(), &[3.0]);
    }
}
