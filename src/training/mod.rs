//! Training collaborators.
//!
//! The model itself is external: anything implementing
//! [`classifier::Classifier`] can be trained from a
//! [`crate::batching::BatchSource`]. This module provides that seam, the
//! fit/evaluate/predict wrappers that wire the planner and generator to it,
//! and a small nearest-centroid reference classifier.

pub mod centroid;
pub mod classifier;
pub mod pipeline;

pub use centroid::NearestCentroid;
pub use classifier::{Classifier, EpochMetrics, Metrics};
pub use pipeline::{evaluate, fit, predict, FitReport};
