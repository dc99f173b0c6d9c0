//! Evaluation metrics for speaker labelings.
//!
//! Diarization labels are only meaningful up to relabeling: a clustering
//! that swaps speaker 0 and speaker 1 is the same answer. Both metrics here
//! are permutation-invariant.
//!
//! | Metric | Range | Best | Notes |
//! |--------|-------|------|-------|
//! | [`purity`] | [0, 1] | 1 | Simple; favors over-clustering |
//! | [`ari`] | [-1, 1] | 1 | Chance-corrected pair agreement |
//!
//! # References
//!
//! - Hubert & Arabie (1985). "Comparing partitions" (ARI)

use std::collections::HashMap;

/// Fraction of segments whose predicted cluster's majority class matches
/// their true class.
///
/// Returns 0.0 for empty or mismatched inputs.
pub fn purity(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.len() != truth.len() || pred.is_empty() {
        return 0.0;
    }

    let mut clusters: HashMap<usize, HashMap<usize, usize>> = HashMap::new();
    for (&p, &t) in pred.iter().zip(truth.iter()) {
        *clusters.entry(p).or_default().entry(t).or_insert(0) += 1;
    }

    let correct: usize = clusters
        .values()
        .map(|counts| counts.values().copied().max().unwrap_or(0))
        .sum();
    correct as f64 / pred.len() as f64
}

/// Adjusted Rand Index between two labelings.
///
/// 1.0 for identical partitions (up to relabeling), ~0.0 for random
/// agreement. Returns 0.0 for empty or mismatched inputs.
pub fn ari(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.len() != truth.len() || pred.is_empty() {
        return 0.0;
    }
    let n = pred.len();
    if n < 2 {
        return 1.0;
    }

    let mut joint: HashMap<(usize, usize), usize> = HashMap::new();
    let mut rows: HashMap<usize, usize> = HashMap::new();
    let mut cols: HashMap<usize, usize> = HashMap::new();
    for (&p, &t) in pred.iter().zip(truth.iter()) {
        *joint.entry((p, t)).or_insert(0) += 1;
        *rows.entry(p).or_insert(0) += 1;
        *cols.entry(t).or_insert(0) += 1;
    }

    let choose2 = |v: usize| (v * v.saturating_sub(1)) as f64 / 2.0;
    let index: f64 = joint.values().map(|&v| choose2(v)).sum();
    let row_sum: f64 = rows.values().map(|&v| choose2(v)).sum();
    let col_sum: f64 = cols.values().map(|&v| choose2(v)).sum();
    let expected = row_sum * col_sum / choose2(n);
    let max_index = 0.5 * (row_sum + col_sum);

    if (max_index - expected).abs() < f64::EPSILON {
        // Both partitions are trivial (all-one-cluster or all-singletons).
        return 1.0;
    }
    (index - expected) / (max_index - expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purity_perfect() {
        let pred = [0, 0, 1, 1];
        let truth = [1, 1, 0, 0];
        assert!((purity(&pred, &truth) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_purity_partial() {
        let pred = [0, 0, 0, 1];
        let truth = [0, 0, 1, 1];
        // Cluster 0 majority is class 0 (2 of 3); cluster 1 is class 1.
        assert!((purity(&pred, &truth) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_purity_empty_and_mismatched() {
        assert_eq!(purity(&[], &[]), 0.0);
        assert_eq!(purity(&[0], &[0, 1]), 0.0);
    }

    #[test]
    fn test_ari_perfect_and_permuted() {
        let truth = [0, 0, 1, 1, 2, 2];
        assert!((ari(&truth, &truth) - 1.0).abs() < 1e-12);

        let permuted = [2, 2, 0, 0, 1, 1];
        assert!((ari(&permuted, &truth) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ari_disagreement_below_one() {
        let pred = [0, 1, 0, 1, 0, 1];
        let truth = [0, 0, 0, 1, 1, 1];
        let score = ari(&pred, &truth);
        assert!(score < 0.5);
    }

    #[test]
    fn test_ari_trivial_partitions() {
        let pred = [0, 0, 0];
        let truth = [0, 0, 0];
        assert!((ari(&pred, &truth) - 1.0).abs() < 1e-12);
    }
}
