//! Strata: segment trajectories and build class-stratified training batches.
//!
//! Provides subcommands for each stage of data preparation:
//!
//! - `synth`    -- Write a synthetic labelled trajectory set
//! - `segment`  -- Cut trajectories into pieces and report the layout
//! - `plan`     -- Report per-class group counts and the batch plan
//! - `batches`  -- Pull batches from the stratified generator
//! - `run`      -- Segment, fit and evaluate the nearest-centroid classifier

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use strata::batching::{plan, StratifiedBatchGenerator};
use strata::config::{BatchSize, StrataConfig};
use strata::training::{evaluate, fit, NearestCentroid};
use strata::trajectory::{
    class_counts, class_indices, segment, synthetic, SegmentLayout, TrajectorySet,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Strata: trajectory segmentation and class-stratified group batching
#[derive(Parser)]
#[command(name = "strata", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sub-sampling stride.
    #[arg(long, global = true)]
    sampling: Option<usize>,

    /// Pieces cut from each trajectory.
    #[arg(long, global = true)]
    num_pieces: Option<usize>,

    /// Same-class samples grouped into one training sample.
    #[arg(long, global = true)]
    num_inputs: Option<usize>,

    /// Requested batch size, or "unbounded".
    #[arg(long, global = true)]
    batch_size: Option<BatchSize>,

    /// Seed for shuffling and splitting.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Suppress batch sizing diagnostics.
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic labelled trajectory set.
    Synth {
        /// Where to write the set.
        #[arg(long, default_value = "data/trajectories.json")]
        output: PathBuf,

        /// Trajectories per class, comma separated.
        #[arg(long, value_delimiter = ',', default_value = "40,25,15")]
        counts: Vec<usize>,

        /// Points per trajectory.
        #[arg(long, default_value_t = 128)]
        length: usize,
    },

    /// Segment trajectories and report the resulting layout.
    Segment {
        /// Path to the trajectory set.
        #[arg(long, default_value = "data/trajectories.json")]
        input: PathBuf,
    },

    /// Report per-class group counts and the batch plan.
    Plan {
        /// Path to the trajectory set.
        #[arg(long, default_value = "data/trajectories.json")]
        input: PathBuf,
    },

    /// Pull batches from the stratified generator and report their makeup.
    Batches {
        /// Path to the trajectory set.
        #[arg(long, default_value = "data/trajectories.json")]
        input: PathBuf,

        /// Number of batches to pull.
        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Segment, fit and evaluate the nearest-centroid reference classifier.
    Run {
        /// Path to the trajectory set.
        #[arg(long, default_value = "data/trajectories.json")]
        input: PathBuf,

        /// Training epochs (overrides the config file).
        #[arg(long)]
        epochs: Option<usize>,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load or create configuration.
    let mut config = match &cli.config {
        Some(path) => StrataConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StrataConfig::default(),
    };
    apply_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Synth {
            output,
            counts,
            length,
        } => cmd_synth(&config, &output, &counts, length),
        Commands::Segment { input } => cmd_segment(&config, &input),
        Commands::Plan { input } => cmd_plan(&config, &input),
        Commands::Batches { input, count } => cmd_batches(&config, &input, count),
        Commands::Run { input, epochs } => {
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }
            cmd_run(&config, &input)
        }
    }
}

fn apply_overrides(config: &mut StrataConfig, cli: &Cli) {
    if let Some(sampling) = cli.sampling {
        config.segmentation.sampling = sampling;
    }
    if let Some(num_pieces) = cli.num_pieces {
        config.segmentation.num_pieces = num_pieces;
    }
    if let Some(num_inputs) = cli.num_inputs {
        config.batching.num_inputs = num_inputs;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batching.batch_size = batch_size;
    }
    if cli.seed.is_some() {
        config.batching.seed = cli.seed;
    }
    if cli.quiet {
        config.batching.verbose = false;
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_synth(config: &StrataConfig, output: &Path, counts: &[usize], length: usize) -> Result<()> {
    let mut rng = match config.batching.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let set = synthetic(counts, length, &mut rng);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    set.save_to_file(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!(
        path = %output.display(),
        trajectories = set.len(),
        classes = set.num_classes(),
        length,
        "Saved synthetic trajectories"
    );
    Ok(())
}

fn cmd_segment(config: &StrataConfig, input: &Path) -> Result<()> {
    let set = load_set(input)?;
    let (inputs, _) = set.to_arrays()?;
    let seg = &config.segmentation;

    let layout = SegmentLayout::new(inputs.ncols(), seg.sampling, seg.num_pieces)?;
    let segments = segment(&inputs, seg.sampling, seg.num_pieces)?;

    println!("Trajectories: {} x {} points", inputs.nrows(), inputs.ncols());
    println!(
        "  After sub-sampling (stride {}): {} points",
        seg.sampling, layout.sampled_length
    );
    println!("  Piece length: {}", layout.length_piece);
    for (i, window) in layout.windows().enumerate() {
        println!("  Piece {i}: [{}, {})", window.start, window.end);
    }
    println!("  Output shape: {:?}", segments.shape());
    Ok(())
}

fn cmd_plan(config: &StrataConfig, input: &Path) -> Result<()> {
    let set = load_set(input)?;
    let (_, labels) = set.to_arrays()?;
    let batching = &config.batching;

    let batch_plan = plan(labels.view(), batching.num_inputs, batching.batch_size)?;
    batch_plan.log_summary(batching.verbose);

    let counts = class_counts(&class_indices(labels.view())?, labels.ncols());
    println!("Samples per class and complete groups of {}:", batching.num_inputs);
    for (c, (count, groups)) in counts.iter().zip(&batch_plan.groups_per_class).enumerate() {
        println!("  class {c}: {count} samples, {groups} groups");
    }
    println!();
    println!("Requested batch size: {}", batch_plan.requested);
    println!("Effective batch size: {}", batch_plan.batch_size);
    println!("Batches per epoch:    {}", batch_plan.num_batch);
    println!(
        "Groups per epoch:     {} of {}",
        batch_plan.groups_per_epoch(),
        batch_plan.total_groups()
    );
    Ok(())
}

fn cmd_batches(config: &StrataConfig, input: &Path, count: usize) -> Result<()> {
    let set = load_set(input)?;
    let (inputs, labels) = set.to_arrays()?;
    let seg = &config.segmentation;
    let batching = &config.batching;

    let segments = segment(&inputs, seg.sampling, seg.num_pieces)?;
    let batch_plan = plan(labels.view(), batching.num_inputs, batching.batch_size)?;
    batch_plan.log_summary(batching.verbose);

    let num_classes = labels.ncols();
    let mut generator = match batching.seed {
        Some(seed) => StratifiedBatchGenerator::with_seed(
            segments,
            labels,
            batching.num_inputs,
            batch_plan,
            seed,
        )?,
        None => StratifiedBatchGenerator::new(segments, labels, batching.num_inputs, batch_plan)?,
    };

    for i in 0..count {
        let batch = generator.next_batch()?;
        let per_class = class_counts(&batch.classes()?, num_classes);
        println!(
            "Batch {i} (epoch {}): inputs {:?}, groups per class {:?}",
            generator.epochs_started() - 1,
            batch.inputs.shape(),
            per_class
        );
    }
    Ok(())
}

fn cmd_run(config: &StrataConfig, input: &Path) -> Result<()> {
    let set = load_set(input)?;
    let (inputs, labels) = set.to_arrays()?;
    let seg = &config.segmentation;

    let segments = segment(&inputs, seg.sampling, seg.num_pieces)?;
    tracing::info!(shape = ?segments.shape(), "Segmented trajectories");

    let mut model = NearestCentroid::new();
    let report = fit(&mut model, &segments, &labels, config).context("Training failed")?;

    println!(
        "Trained on {} samples, validated on {} ({} batches of {} per epoch)",
        report.train_samples,
        report.validation_samples,
        report.train_plan.num_batch,
        report.train_plan.batch_size
    );
    for entry in &report.history {
        let valid = entry
            .validation
            .map(|m| format!("{:.2}%", m.accuracy * 100.0))
            .unwrap_or_else(|| "-".into());
        println!(
            "  Epoch {:>3}: train {:.2}%  validation {}  at {}",
            entry.epoch,
            entry.train.accuracy * 100.0,
            valid,
            entry.recorded_at.format("%H:%M:%S")
        );
    }

    let metrics = evaluate(
        &model,
        &segments,
        &labels,
        config.batching.num_inputs,
        config.batching.seed,
    )?;
    println!(
        "Full-set accuracy: {:.2}% over {} groups",
        metrics.accuracy * 100.0,
        metrics.num_samples
    );
    Ok(())
}

fn load_set(path: &Path) -> Result<TrajectorySet> {
    TrajectorySet::load_from_file(path)
        .with_context(|| format!("Failed to read trajectories from {}", path.display()))
}
