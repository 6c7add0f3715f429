//! Diagnostic sinks that observe an optimization run.
//!
//! The optimizer reports each checkpoint and, when examples are enabled, the
//! images rendered from tokens of the current type. A sink never feeds back
//! into the run.

use std::path::Path;

use bpl_types::BplResult;
use image::imageops;
use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

use crate::plot::{draw_on, label_style};

/// Receiver for checkpoint notifications and sample images.
pub trait DiagnosticSink {
    /// A checkpoint was reached; `row` is its position in the grid.
    fn checkpoint(&mut self, row: usize, iteration: usize);

    /// One rendered sample for grid cell (`row`, `col`).
    fn record_sample(&mut self, row: usize, col: usize, image: GrayImage);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn checkpoint(&mut self, _row: usize, _iteration: usize) {}

    fn record_sample(&mut self, _row: usize, _col: usize, _image: GrayImage) {}
}

const PADDING: u32 = 2;
/// Width of the column holding each row's iteration label.
const LABEL_WIDTH: u32 = 48;
const LABEL_SIZE: f64 = 14.0;
const BACKGROUND: Luma<u8> = Luma([255]);
const SEPARATOR: Luma<u8> = Luma([160]);

/// Grid of sample images, one row per checkpoint, labelled by iteration.
#[derive(Debug, Clone)]
pub struct SampleGrid {
    rows: usize,
    cols: usize,
    cells: Vec<Option<GrayImage>>,
    labels: Vec<Option<usize>>,
    checkpoints: Vec<usize>,
}

impl SampleGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
            labels: vec![None; rows],
            checkpoints: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Iteration index that labels `row`, if that row was reached.
    pub fn label(&self, row: usize) -> Option<usize> {
        self.labels.get(row).copied().flatten()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&GrayImage> {
        if col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).and_then(Option::as_ref)
    }

    /// Every checkpoint iteration seen, in order.
    pub fn checkpoints(&self) -> &[usize] {
        &self.checkpoints
    }

    fn grow_to(&mut self, row: usize) {
        if row >= self.rows {
            self.rows = row + 1;
            self.cells.resize(self.rows * self.cols, None);
            self.labels.resize(self.rows, None);
        }
    }

    /// Compose all cells into one image, each row preceded by its
    /// iteration label; empty cells stay blank.
    pub fn compose(&self) -> BplResult<GrayImage> {
        let (cell_w, cell_h) = self
            .cells
            .iter()
            .flatten()
            .fold((1, 1), |(w, h), img| (w.max(img.width()), h.max(img.height())));

        let width = LABEL_WIDTH + self.cols as u32 * (cell_w + PADDING) + PADDING;
        let height = self.rows as u32 * (cell_h + PADDING) + PADDING;
        let mut canvas = GrayImage::from_pixel(width, height, SEPARATOR);
        let gutter = GrayImage::from_pixel(LABEL_WIDTH, height, BACKGROUND);
        imageops::replace(&mut canvas, &gutter, 0, 0);

        let blank = GrayImage::from_pixel(cell_w, cell_h, BACKGROUND);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let x0 = i64::from(LABEL_WIDTH + col as u32 * (cell_w + PADDING));
                let y0 = i64::from(PADDING + row as u32 * (cell_h + PADDING));
                imageops::replace(&mut canvas, &blank, x0, y0);
                if let Some(img) = self.cell(row, col) {
                    imageops::replace(&mut canvas, img, x0, y0);
                }
            }
        }

        let labels: Vec<(i32, String)> = self
            .labels
            .iter()
            .enumerate()
            .filter_map(|(row, label)| {
                let centre = PADDING + row as u32 * (cell_h + PADDING) + cell_h / 2;
                label.map(|it| (centre as i32 - LABEL_SIZE as i32 / 2, it.to_string()))
            })
            .collect();
        if labels.is_empty() {
            return Ok(canvas);
        }

        let style = label_style(LABEL_SIZE);
        let rgb = draw_on(DynamicImage::ImageLuma8(canvas).to_rgb8(), |root| {
            for (y, text) in &labels {
                root.draw_text(text, &style, (4, *y))?;
            }
            Ok(())
        })?;
        Ok(DynamicImage::ImageRgb8(rgb).to_luma8())
    }

    /// Write the composed grid as an image file (format from the extension).
    pub fn save(&self, path: impl AsRef<Path>) -> BplResult<()> {
        self.compose()?.save(path.as_ref())?;
        Ok(())
    }
}

impl DiagnosticSink for SampleGrid {
    fn checkpoint(&mut self, row: usize, iteration: usize) {
        self.grow_to(row);
        self.labels[row] = Some(iteration);
        self.checkpoints.push(iteration);
    }

    fn record_sample(&mut self, row: usize, col: usize, image: GrayImage) {
        if col >= self.cols {
            debug!(row, col, "dropping sample outside grid columns");
            return;
        }
        self.grow_to(row);
        self.cells[row * self.cols + col] = Some(image);
    }
}
