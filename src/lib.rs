//! Strata: trajectory segmentation and class-stratified group batching.
//!
//! Raw trajectories are cut into overlapping fixed-length pieces, then packed
//! into training batches whose samples each concatenate several same-class
//! trajectories. The pipeline is:
//!
//! raw trajectories -> [`trajectory::segment`] -> [`batching::plan`] ->
//! [`batching::StratifiedBatchGenerator`] -> [`training::Classifier`]

pub mod batching;
pub mod config;
pub mod error;
pub mod training;
pub mod trajectory;

pub use error::{Result, StrataError};
