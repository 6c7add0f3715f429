//! Score-trajectory visualization.
//!
//! Two forms: a Unicode sparkline for log lines and a line chart
//! (log-likelihood against iteration) drawn with plotters for saving as an
//! image. Chart text uses a bundled DejaVu Sans face.

use std::error::Error;
use std::sync::OnceLock;

use bpl_types::{BplError, BplResult};
use image::{Rgb, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

const FONT_FAMILY: &str = "sans-serif";
const FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Smallest chart that still fits the axis label areas.
const MIN_WIDTH: u32 = 160;
const MIN_HEIGHT: u32 = 120;

/// Sparkline of `values` resampled to `width` characters.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() {
        return " ".repeat(width);
    }

    let chars = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let (min, max) = finite_range(values);
    let range = (max - min).max(1e-12);

    (0..width)
        .map(|i| {
            let idx = if values.len() <= width {
                if i < values.len() {
                    i
                } else {
                    return ' ';
                }
            } else {
                i * values.len() / width
            };
            let v = values[idx];
            if !v.is_finite() {
                return '?';
            }
            let level = (((v - min) / range) * 7.0).round() as usize;
            chars[level.min(7)]
        })
        .collect()
}

fn finite_range(values: &[f64]) -> (f64, f64) {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

/// Plot `values` against their index, with labelled axes.
///
/// Non-finite scores are left out of the line.
pub fn plot_scores(values: &[f64], width: u32, height: u32) -> BplResult<RgbImage> {
    let width = width.max(MIN_WIDTH);
    let height = height.max(MIN_HEIGHT);

    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (i as f64, *v))
        .collect();
    let (min, max) = finite_range(values);
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    let x_max = values.len().saturating_sub(1).max(1) as f64;

    let canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    draw_on(canvas, |root| {
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..x_max, (min - pad)..(max + pad))?;

        chart
            .configure_mesh()
            .x_desc("iteration")
            .y_desc("log-likelihood")
            .draw()?;

        chart.draw_series(LineSeries::new(points, &BLUE))?;
        Ok(())
    })
}

/// Register the bundled face once per process.
fn register_fonts() -> BplResult<()> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT).map_err(|_| "InvalidFont".to_string())
        })
        .clone()
        .map_err(|e| BplError::Render(format!("cannot load chart font: {e}")))
}

/// Run `draw` against `image` through the plotters bitmap backend.
pub(crate) fn draw_on<F>(image: RgbImage, draw: F) -> BplResult<RgbImage>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<(), Box<dyn Error>>,
{
    register_fonts()?;
    let (width, height) = image.dimensions();
    let mut buffer = image.into_raw();
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root).map_err(|e| BplError::Render(e.to_string()))?;
        root.present().map_err(|e| BplError::Render(e.to_string()))?;
    }
    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| BplError::Render("plot buffer does not match its size".into()))
}

/// Text style for labels drawn with [`draw_on`].
pub(crate) fn label_style(size: f64) -> TextStyle<'static> {
    TextStyle::from((FONT_FAMILY, size).into_font()).color(&BLACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_line(p: &Rgb<u8>) -> bool {
        p[2] > 200 && p[0] < 80 && p[1] < 80
    }

    fn is_dark(p: &Rgb<u8>) -> bool {
        p[0] < 128 && p[0] == p[1] && p[1] == p[2]
    }

    #[test]
    fn sparkline_spans_levels() {
        let line = sparkline(&[0.0, 1.0, 2.0, 3.0], 4);
        assert_eq!(line.chars().count(), 4);
        assert!(line.starts_with('▁'));
        assert!(line.ends_with('█'));
    }

    #[test]
    fn sparkline_pads_short_series() {
        assert_eq!(sparkline(&[], 3), "   ");
        assert_eq!(sparkline(&[1.0], 3).chars().count(), 3);
    }

    #[test]
    fn plot_draws_the_trajectory_line() {
        let scores: Vec<f64> = (0..50).map(|i| -100.0 + i as f64).collect();
        let img = plot_scores(&scores, 320, 240).unwrap();
        assert_eq!(img.dimensions(), (320, 240));
        assert!(img.pixels().filter(|p| is_line(p)).count() > 50);
    }

    #[test]
    fn plot_labels_its_axes() {
        let img = plot_scores(&[1.0, 2.0, 3.0], 320, 240).unwrap();
        // Axis descriptions and tick labels sit left of and below the plot area.
        let left = (0..240).any(|y| (0..40).any(|x| is_dark(img.get_pixel(x, y))));
        let bottom = (0..320).any(|x| (195..240).any(|y| is_dark(img.get_pixel(x, y))));
        assert!(left);
        assert!(bottom);
    }

    #[test]
    fn plot_handles_constant_and_empty_series() {
        let flat = plot_scores(&[2.0; 10], 200, 150).unwrap();
        assert!(flat.pixels().any(is_line));
        let empty = plot_scores(&[], 200, 150).unwrap();
        assert!(!empty.pixels().any(is_line));
        assert_eq!(plot_scores(&[1.0], 10, 10).unwrap().dimensions(), (MIN_WIDTH, MIN_HEIGHT));
    }
}
