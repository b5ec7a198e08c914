//! Error types shared by segmentation, planning, and batch generation.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Everything that can go wrong while preparing data for training.
#[derive(Error, Debug)]
pub enum StrataError {
    /// Malformed or degenerate trajectory/label tensors.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Non-positive sizing options, or no complete group available.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The shuffled sweep ran out of samples before a batch slot could be
    /// filled. Only happens when the batch plan disagrees with the labels.
    #[error(
        "sample source exhausted in epoch {epoch}, batch {batch}, slot {slot} \
         after consuming {consumed} samples"
    )]
    ExhaustedSource {
        epoch: usize,
        batch: usize,
        slot: usize,
        consumed: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StrataError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_source_message_names_position() {
        let err = StrataError::ExhaustedSource {
            epoch: 2,
            batch: 1,
            slot: 3,
            consumed: 13,
        };
        let text = err.to_string();
        assert!(text.contains("epoch 2"));
        assert!(text.contains("slot 3"));
        assert!(text.contains("13 samples"));
    }

    #[test]
    fn test_helpers_pick_variant() {
        assert!(matches!(StrataError::shape("x"), StrataError::InvalidShape(_)));
        assert!(matches!(
            StrataError::config("x"),
            StrataError::InvalidConfiguration(_)
        ));
    }
}
