use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Complete configuration for segmentation, batching and the fit wrappers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrataConfig {
    pub segmentation: SegmentationConfig,
    pub batching: BatchingConfig,
    pub training: TrainingConfig,
}

/// How raw trajectories are cut into pieces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Stride used to sub-sample each trajectory (default: 1).
    pub sampling: usize,
    /// Number of overlapping pieces cut from each trajectory (default: 3).
    pub num_pieces: usize,
}

/// How segmented samples are grouped and packed into batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Same-class samples concatenated into one group (default: 1).
    pub num_inputs: usize,
    /// Requested number of groups per batch (default: 50).
    pub batch_size: BatchSize,
    /// Whether to log batch sizing diagnostics (default: true).
    pub verbose: bool,
    /// Seed for the epoch shuffles and the train/validation split.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Options forwarded to the fit wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs (default: 50).
    pub epochs: usize,
    /// Fraction of samples held out for validation (default: 0.2).
    pub validation_split: f64,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig {
                sampling: 1,
                num_pieces: 3,
            },
            batching: BatchingConfig {
                num_inputs: 1,
                batch_size: BatchSize::Fixed(50),
                verbose: true,
                seed: None,
            },
            training: TrainingConfig {
                epochs: 50,
                validation_split: 0.2,
            },
        }
    }
}

impl StrataConfig {
    /// Read a JSON configuration file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject option values that cannot produce any data.
    pub fn validate(&self) -> Result<()> {
        if self.segmentation.sampling == 0 {
            return Err(StrataError::config("sampling must be at least 1"));
        }
        if self.segmentation.num_pieces == 0 {
            return Err(StrataError::config("num_pieces must be at least 1"));
        }
        if self.batching.num_inputs == 0 {
            return Err(StrataError::config("num_inputs must be at least 1"));
        }
        if self.batching.batch_size == BatchSize::Fixed(0) {
            return Err(StrataError::config("batch_size must be positive"));
        }
        let split = self.training.validation_split;
        if !(0.0..1.0).contains(&split) {
            return Err(StrataError::config(format!(
                "validation_split must lie in [0, 1), got {split}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Batch size
// ---------------------------------------------------------------------------

/// A requested batch size: a fixed number of groups, or "as many as the
/// data allows" in a single batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSize {
    Fixed(usize),
    Unbounded,
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSize::Fixed(n) => write!(f, "{n}"),
            BatchSize::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl FromStr for BatchSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unbounded" | "inf" => Ok(BatchSize::Unbounded),
            other => match other.parse::<usize>() {
                Ok(0) => Err("batch size must be positive".to_string()),
                Ok(n) => Ok(BatchSize::Fixed(n)),
                Err(_) => Err(format!(
                    "expected a positive integer or \"unbounded\", got {s:?}"
                )),
            },
        }
    }
}
