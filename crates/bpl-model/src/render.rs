//! Stroke trajectories and their rasterization.

use bpl_types::{BplError, BplResult};
use image::{GrayImage, Luma};
use rand::{Rng, RngCore};

/// Pixel spacing between consecutive trajectory samples.
const STEP: f64 = 0.5;

/// A concrete instance of a character type: one pixel-space trajectory per
/// stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterToken {
    pub strokes: Vec<Vec<(f64, f64)>>,
}

/// Trajectory of one stroke.
///
/// Each sub-stroke visits its control points, scaled by `1 / invscale`, as
/// offsets from the point where the previous sub-stroke ended.
pub fn stroke_trajectory(
    start: (f64, f64),
    control_points: &[Vec<(f64, f64)>],
    invscales: &[f64],
) -> Vec<(f64, f64)> {
    let mut path = vec![start];
    let mut anchor = start;
    for (cps, invscale) in control_points.iter().zip(invscales) {
        let scale = 1.0 / invscale;
        for (x, y) in cps {
            path.push((anchor.0 + x * scale, anchor.1 + y * scale));
        }
        if let Some(last) = path.last() {
            anchor = *last;
        }
    }
    densify(&path)
}

/// Insert points so that consecutive samples are at most `STEP` apart.
fn densify(path: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(path.len());
    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let dist = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        let n = if dist.is_finite() {
            ((dist / STEP).ceil() as usize).clamp(1, 10_000)
        } else {
            1
        };
        for i in 0..n {
            let t = i as f64 / n as f64;
            out.push((a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1)));
        }
    }
    if let Some(last) = path.last() {
        out.push(*last);
    }
    out
}

/// Number of pixels on a `size` x `size` canvas.
fn pixel_count(size: u32) -> BplResult<usize> {
    if size == 0 {
        return Err(BplError::Render("canvas has zero size".into()));
    }
    let side = usize::try_from(size).map_err(|e| BplError::Render(e.to_string()))?;
    side.checked_mul(side)
        .ok_or_else(|| BplError::Render(format!("canvas of side {size} is too large")))
}

/// Per-pixel ink probability of a token with a Gaussian brush.
pub fn ink_probabilities(token: &CharacterToken, size: u32, brush_radius: f64) -> BplResult<Vec<f64>> {
    let mut probs = vec![0.0; pixel_count(size)?];
    let side = size as usize;
    let reach = (2.0 * brush_radius).ceil() as i64;
    let denom = 2.0 * brush_radius * brush_radius;

    for (px, py) in token.strokes.iter().flatten() {
        if !px.is_finite() || !py.is_finite() {
            continue;
        }
        let cx = px.floor() as i64;
        let cy = py.floor() as i64;
        for y in (cy - reach)..=(cy + reach) {
            for x in (cx - reach)..=(cx + reach) {
                if x < 0 || y < 0 || x >= size as i64 || y >= size as i64 {
                    continue;
                }
                let dx = x as f64 + 0.5 - px;
                let dy = y as f64 + 0.5 - py;
                let p = (-(dx * dx + dy * dy) / denom).exp();
                let slot = &mut probs[y as usize * side + x as usize];
                if p > *slot {
                    *slot = p;
                }
            }
        }
    }
    Ok(probs)
}

/// Sample a binary image (ink black on white) from ink probabilities, with
/// symmetric pixel flip noise.
pub fn sample_binary_image(
    probs: &[f64],
    size: u32,
    flip_prob: f64,
    rng: &mut dyn RngCore,
) -> BplResult<GrayImage> {
    let count = pixel_count(size)?;
    if probs.len() != count {
        return Err(BplError::ShapeMismatch {
            name: "ink probabilities".into(),
            expected: vec![size as usize, size as usize],
            actual: vec![probs.len()],
        });
    }
    let side = size as usize;
    let mut img = GrayImage::from_pixel(size, size, Luma([255]));
    for (i, p) in probs.iter().enumerate() {
        let p = p * (1.0 - 2.0 * flip_prob) + flip_prob;
        if rng.gen::<f64>() < p {
            img.put_pixel((i % side) as u32, (i / side) as u32, Luma([0]));
        }
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn trajectory_chains_sub_strokes() {
        let cps = vec![vec![(10.0, 0.0)], vec![(0.0, 10.0)]];
        let path = stroke_trajectory((5.0, 5.0), &cps, &[1.0, 2.0]);
        assert_eq!(path.first(), Some(&(5.0, 5.0)));
        // Second sub-stroke starts at (15, 5) and moves 10 / 2 down.
        assert_eq!(path.last(), Some(&(15.0, 10.0)));
        for pair in path.windows(2) {
            let d = ((pair[1].0 - pair[0].0).powi(2) + (pair[1].1 - pair[0].1).powi(2)).sqrt();
            assert!(d <= STEP + 1e-9);
        }
    }

    #[test]
    fn ink_follows_the_stroke() {
        let token = CharacterToken {
            strokes: vec![stroke_trajectory((10.0, 20.5), &[vec![(30.0, 0.0)]], &[1.0])],
        };
        let probs = ink_probabilities(&token, 64, 1.5).unwrap();
        assert!(probs[20 * 64 + 25] > 0.8);
        assert_eq!(probs[50 * 64 + 50], 0.0);
    }

    #[test]
    fn binary_image_is_deterministic_for_a_seed() {
        let token = CharacterToken {
            strokes: vec![vec![(8.0, 8.0), (12.0, 8.0)]],
        };
        let probs = ink_probabilities(&token, 16, 1.0).unwrap();
        let mut a = ChaCha8Rng::seed_from_u64(3);
        let mut b = ChaCha8Rng::seed_from_u64(3);
        let img_a = sample_binary_image(&probs, 16, 0.0, &mut a).unwrap();
        let img_b = sample_binary_image(&probs, 16, 0.0, &mut b).unwrap();
        assert_eq!(img_a, img_b);
        // With no flip noise, pixels far from the stroke stay blank.
        assert_eq!(img_a.get_pixel(0, 15)[0], 255);
    }

    #[test]
    fn canvas_side_beyond_u32_area_renders_without_overflow() {
        let token = CharacterToken {
            strokes: vec![vec![(10.0, 10.0)]],
        };
        // 70_000^2 does not fit in u32; the count is taken in usize.
        match pixel_count(70_000) {
            Ok(n) => assert_eq!(n / 70_000, 70_000),
            Err(e) => assert!(matches!(e, BplError::Render(_))),
        }
        assert!(matches!(ink_probabilities(&token, 0, 1.0), Err(BplError::Render(_))));
    }

    #[test]
    fn probability_count_must_match_canvas() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(sample_binary_image(&[0.0; 10], 4, 0.0, &mut rng).is_err());
    }
}
