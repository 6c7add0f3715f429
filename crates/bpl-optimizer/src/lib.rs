//! # bpl-optimizer
//!
//! Constrained optimization of a sampled type's continuous parameters.
//!
//! Provides the Adam optimizer, element-wise bound projection, the run
//! configuration, diagnostic sinks (sample grids), score plots and the
//! [`optimize_type`] loop that ties them together.

pub mod adam;
pub mod config;
pub mod diagnostics;
mod optimize;
pub mod plot;
pub mod projection;
pub mod report;

pub use adam::{Adam, AdamConfig};
pub use config::{round_to_ten, OptimizeConfig};
pub use diagnostics::{DiagnosticSink, NullSink, SampleGrid};
pub use optimize::optimize_type;
pub use plot::{plot_scores, sparkline};
pub use projection::{is_feasible, project, project_type, validate_bounds};
pub use report::{OptimizationReport, RunState};
