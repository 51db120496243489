//! Word-level comparison of two recognition results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// `|common| / max(|first|, |second|)` over lowercase word sets; 0 when both are empty.
    pub similarity: f64,
    pub common_words: Vec<String>,
    pub unique_to_first: Vec<String>,
    pub unique_to_second: Vec<String>,
}

fn word_set(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

pub fn compare_results(first: &str, second: &str) -> ComparisonResult {
    let a = word_set(first);
    let b = word_set(second);

    let common: Vec<String> = a.intersection(&b).cloned().collect();
    let largest = a.len().max(b.len());
    let similarity = if largest == 0 {
        0.0
    } else {
        common.len() as f64 / largest as f64
    };

    ComparisonResult {
        similarity,
        common_words: common,
        unique_to_first: a.difference(&b).cloned().collect(),
        unique_to_second: b.difference(&a).cloned().collect(),
    }
}
