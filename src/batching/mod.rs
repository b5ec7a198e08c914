//! Sizing and producing class-stratified training batches.
//!
//! - [`planner::plan`] decides how many batches of which size one epoch can
//!   hold, given the per-class sample counts and the group multiplicity.
//! - [`generator::StratifiedBatchGenerator`] produces those batches on demand,
//!   reshuffling at every epoch boundary.

pub mod generator;
pub mod planner;

pub use generator::{Batch, BatchSource, StratifiedBatchGenerator};
pub use planner::{plan, BatchPlan};
