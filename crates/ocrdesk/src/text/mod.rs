//! Text utilities over recognized output.

pub mod compare;

pub use compare::{ComparisonResult, compare_results};
