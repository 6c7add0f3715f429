//! Sample a character type and optimize its parameters under the prior.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bpl_model::{CharacterModel, Library};
use bpl_optimizer::{
    optimize_type, plot_scores, sparkline, DiagnosticSink, NullSink, OptimizationReport,
    OptimizeConfig, SampleGrid,
};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const PLOT_WIDTH: u32 = 640;
const PLOT_HEIGHT: u32 = 360;

#[derive(Parser, Debug)]
#[command(name = "bpl-optimize-type")]
#[command(about = "Optimize the parameters of a sampled character type")]
#[command(version)]
struct Cli {
    /// Number of strokes; drawn from the prior when omitted
    #[arg(long)]
    ns: Option<usize>,

    /// Adam learning rate
    #[arg(long, default_value_t = 0.001)]
    lr: f64,

    /// Tolerance for the parameter bounds
    #[arg(long, default_value_t = 0.0001)]
    eps: f64,

    /// Number of iterations (rounded to the nearest multiple of ten)
    #[arg(long = "nb_iter", default_value_t = 1000)]
    nb_iter: usize,

    /// Seed for type sampling and diagnostic tokens
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Skip drawing sample tokens at checkpoints
    #[arg(long)]
    no_examples: bool,

    /// Prior hyper-parameters as JSON; built-in defaults otherwise
    #[arg(long)]
    library: Option<PathBuf>,

    /// Where to write the grid of checkpoint samples
    #[arg(long, default_value = "type_samples.png")]
    grid_out: PathBuf,

    /// Where to write the score-vs-iteration plot
    #[arg(long, default_value = "score_plot.png")]
    plot_out: PathBuf,

    /// Optional JSON run report
    #[arg(long)]
    scores_out: Option<PathBuf>,

    /// Log verbosity used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let lib = match &cli.library {
        Some(path) => Library::from_json_file(path)
            .with_context(|| format!("loading library from {}", path.display()))?,
        None => Library::default(),
    };
    let model = CharacterModel::new(lib).context("building character model")?;

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let mut ty = model
        .sample_type(cli.ns, &mut rng)
        .context("sampling character type")?;
    println!("num strokes: {}", ty.k());
    println!("num sub-strokes: {:?}", ty.nsub_counts());

    let config = OptimizeConfig::new(cli.lr, cli.nb_iter, cli.eps)
        .with_show_examples(!cli.no_examples)
        .with_seed(cli.seed);
    let mut grid = SampleGrid::new(config.checkpoint_rows, config.samples_per_row);
    let mut null = NullSink;
    let sink: &mut dyn DiagnosticSink = if config.show_examples { &mut grid } else { &mut null };

    let mut report = OptimizationReport::new(config.clone());
    report.mark_running();
    let scores = match optimize_type(&model, &mut ty, &config, sink) {
        Ok(scores) => scores,
        Err(e) => {
            error!("optimization failed: {e}");
            report.mark_failed(e.to_string());
            if let Some(path) = &cli.scores_out {
                report.save(path).context("writing run report")?;
            }
            return Err(e).context("optimizing character type");
        }
    };
    report.mark_completed(scores);

    if let (Some(first), Some(last)) = (report.initial_score(), report.final_score()) {
        info!("score {first:.3} -> {last:.3}");
    }
    info!("trajectory {}", sparkline(&report.scores, 60));

    if config.show_examples {
        grid.save(&cli.grid_out)
            .with_context(|| format!("writing {}", cli.grid_out.display()))?;
        info!("wrote sample grid to {}", cli.grid_out.display());
    }

    plot_scores(&report.scores, PLOT_WIDTH, PLOT_HEIGHT)
        .context("rendering score plot")?
        .save(&cli.plot_out)
        .with_context(|| format!("writing {}", cli.plot_out.display()))?;
    info!("wrote score plot to {}", cli.plot_out.display());

    if let Some(path) = &cli.scores_out {
        report
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
