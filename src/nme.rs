//! Normalized Maximum Eigengap (NME) analysis.
//!
//! Picks the neighbor count `p` used to binarize an affinity matrix, and
//! estimates the speaker count, without labeled data. For each candidate
//! `p` the binarized graph's Laplacian eigengaps are computed, and the
//! candidate is scored by
//!
//! ```text
//! g(p) = (p / N) / (max_gap / (λ_max + ε) + ε)
//! ```
//!
//! the ratio of relative neighbor density to relative spectral separation.
//! A small g(p) means the graph is still sparse yet its spectrum separates
//! cleanly; the candidate minimizing g(p) wins. The index of the largest
//! eigengap (within the first `max_num_speakers` gaps) gives the speaker
//! count for that candidate.
//!
//! Eigendecomposition per candidate is cubic, so large sessions are stride
//! subsampled to `nme_mat_size` first and the chosen `p` is scaled back by
//! the subsampling ratio at the end. Subsampling bounds latency, not
//! quality; it can drop underrepresented speakers if pushed too low.
//!
//! References: Park et al., "Auto-Tuning Spectral Clustering for Speaker
//! Diarization Using Normalized Maximum Eigengap", IEEE SPL 27 (2019).

use std::collections::HashMap;

use log::debug;
use ndarray::{s, Array1, Array2};

use crate::error::{Error, Result};
use crate::graph::{binarize, is_fully_connected, minimum_connection};
use crate::spectral::{eig_decompose, laplacian};

/// Score denominators guard.
const EPS: f64 = 1e-10;

/// Immutable NME search configuration.
///
/// Working copies of the (possibly subsampled) affinity matrix are local to
/// [`nme_analysis`]; repeated calls with the same config cannot observe each
/// other's state.
#[derive(Debug, Clone)]
pub struct NmescConfig {
    /// Maximum number of speakers considered in the gap search.
    max_num_speakers: usize,
    /// Upper bound for the searched neighbor fraction p/N.
    max_rp_threshold: f64,
    /// Search a fixed number of candidates instead of the full range.
    sparse_search: bool,
    /// Number of candidates when sparse search is enabled.
    sparse_search_volume: usize,
    /// Subsample the affinity matrix before analysis.
    use_subsampling: bool,
    /// Target matrix size for subsampling.
    nme_mat_size: usize,
    /// Fixed neighbor-fraction threshold; > 0 skips the search entirely.
    fixed_thres: f64,
}

impl Default for NmescConfig {
    fn default() -> Self {
        Self {
            max_num_speakers: 10,
            max_rp_threshold: 0.15,
            sparse_search: true,
            sparse_search_volume: 30,
            use_subsampling: true,
            nme_mat_size: 512,
            fixed_thres: 0.0,
        }
    }
}

impl NmescConfig {
    /// Create a config with the recommended defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of speakers.
    pub fn with_max_num_speakers(mut self, n: usize) -> Self {
        self.max_num_speakers = n;
        self
    }

    /// Set the neighbor-fraction search bound.
    pub fn with_max_rp_threshold(mut self, threshold: f64) -> Self {
        self.max_rp_threshold = threshold;
        self
    }

    /// Enable or disable sparse candidate search.
    pub fn with_sparse_search(mut self, sparse: bool) -> Self {
        self.sparse_search = sparse;
        self
    }

    /// Set the sparse search volume.
    pub fn with_sparse_search_volume(mut self, volume: usize) -> Self {
        self.sparse_search_volume = volume;
        self
    }

    /// Enable or disable subsampling.
    pub fn with_subsampling(mut self, subsample: bool) -> Self {
        self.use_subsampling = subsample;
        self
    }

    /// Set the subsampling target size.
    pub fn with_nme_mat_size(mut self, size: usize) -> Self {
        self.nme_mat_size = size;
        self
    }

    /// Set a fixed threshold, skipping the NME search.
    pub fn with_fixed_thres(mut self, thres: f64) -> Self {
        self.fixed_thres = thres;
        self
    }

    /// Maximum number of speakers considered.
    pub fn max_num_speakers(&self) -> usize {
        self.max_num_speakers
    }
}

/// Outcome of an NME analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NmescResult {
    /// Estimated number of speakers.
    pub num_speakers: usize,
    /// Chosen neighbor count, rescaled to the pre-subsampling dimension.
    pub p_value: usize,
}

/// Run the NME search on an affinity matrix.
///
/// # Errors
///
/// Fails on a non-square or empty matrix, or if an eigendecomposition does
/// not converge.
pub fn nme_analysis(affinity: &Array2<f64>, config: &NmescConfig) -> Result<NmescResult> {
    let n = affinity.nrows();
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    if affinity.ncols() != n {
        return Err(Error::ShapeMismatch {
            expected: format!("{n}x{n}"),
            actual: format!("{}x{}", affinity.nrows(), affinity.ncols()),
        });
    }

    let (working, subsample_ratio) = if config.use_subsampling {
        subsample(affinity, config.nme_mat_size)
    } else {
        (affinity.clone(), 1)
    };
    let n_sub = working.nrows();

    let (candidates, max_n) = p_value_candidates(n_sub, config);
    debug!(
        "nme search: n={n} n_sub={n_sub} ratio={subsample_ratio} candidates={} max_n={max_n}",
        candidates.len()
    );

    let mut est_by_p: HashMap<usize, usize> = HashMap::with_capacity(candidates.len());
    let mut best_p = candidates[0];
    let mut best_score = f64::INFINITY;
    for &p in &candidates {
        let (est, score) = eig_ratio(&working, p, config)?;
        est_by_p.insert(p, est);
        if score < best_score {
            best_score = score;
            best_p = p;
        }
    }

    let mut chosen_p = best_p;
    let graph = binarize(&working, chosen_p);
    if !is_fully_connected(&graph) {
        let (repaired, p) = minimum_connection(&working, &candidates, max_n);
        debug!("nme graph for p={chosen_p} disconnected, repaired to p={p}");
        chosen_p = p;
        if !est_by_p.contains_key(&chosen_p) {
            let (est, _, _) = eigengap_estimate(&repaired, config.max_num_speakers)?;
            est_by_p.insert(chosen_p, est);
        }
    }

    let num_speakers = est_by_p[&chosen_p];
    let p_value = (chosen_p * subsample_ratio).max(1);
    debug!("nme result: p={chosen_p} (rescaled {p_value}), speakers={num_speakers}");
    Ok(NmescResult {
        num_speakers,
        p_value,
    })
}

/// Estimate the speaker count from a binarized graph via the largest
/// eigengap of its Laplacian.
pub fn estimate_num_speakers(graph: &Array2<f64>, max_num_speakers: usize) -> Result<usize> {
    let (est, _, _) = eigengap_estimate(graph, max_num_speakers)?;
    Ok(est)
}

/// Stride-subsample a square matrix down to roughly `target` rows.
///
/// Returns the submatrix and the integer stride used (1 = untouched).
fn subsample(affinity: &Array2<f64>, target: usize) -> (Array2<f64>, usize) {
    let n = affinity.nrows();
    let ratio = if target == 0 { 1 } else { (n / target).max(1) };
    if ratio == 1 {
        return (affinity.clone(), 1);
    }
    let step = ratio as isize;
    let sub = affinity.slice(s![..;step, ..;step]).to_owned();
    (sub, ratio)
}

/// Candidate neighbor counts and the search bound `max_n`.
///
/// Always returns at least one candidate (p = 1), so degenerate thresholds
/// cannot empty the search.
fn p_value_candidates(n: usize, config: &NmescConfig) -> (Vec<usize>, usize) {
    if config.fixed_thres > 0.0 {
        let p = ((n as f64 * config.fixed_thres).floor() as usize).max(1);
        return (vec![p], p);
    }

    let max_n = ((n as f64 * config.max_rp_threshold).floor() as usize).max(1);
    let candidates = if config.sparse_search {
        let steps = max_n.min(config.sparse_search_volume).max(1);
        let mut values: Vec<usize> = (0..steps)
            .map(|i| {
                if steps == 1 {
                    1
                } else {
                    let t = i as f64 / (steps - 1) as f64;
                    (1.0 + t * (max_n as f64 - 1.0)) as usize
                }
            })
            .collect();
        values.sort_unstable();
        values.dedup();
        values
    } else {
        // Full scan over [1, max_n).
        let mut values: Vec<usize> = (1..max_n).collect();
        if values.is_empty() {
            values.push(1);
        }
        values
    };
    (candidates, max_n)
}

/// Speaker estimate and normalized eigengap score for one candidate `p`.
fn eig_ratio(affinity: &Array2<f64>, p: usize, config: &NmescConfig) -> Result<(usize, f64)> {
    let n = affinity.nrows();
    let graph = binarize(affinity, p);
    let (est, lambdas, gaps) = eigengap_estimate(&graph, config.max_num_speakers)?;

    let max_gap = if gaps.is_empty() { 0.0 } else { gaps[est - 1] };
    let lambda_max = lambdas[lambdas.len() - 1];
    let normalized_gap = max_gap / (lambda_max + EPS);
    let score = (p as f64 / n as f64) / (normalized_gap + EPS);
    Ok((est, score))
}

/// Eigengap speaker estimate with the supporting spectrum.
///
/// Eigenvalues come back ascending; gaps are consecutive differences; the
/// estimate is the argmax over the first `max_num_speakers` gaps, plus one.
fn eigengap_estimate(
    graph: &Array2<f64>,
    max_num_speakers: usize,
) -> Result<(usize, Array1<f64>, Vec<f64>)> {
    let lap = laplacian(graph);
    let (lambdas, _) = eig_decompose(&lap)?;

    let gaps: Vec<f64> = (1..lambdas.len())
        .map(|i| lambdas[i] - lambdas[i - 1])
        .collect();
    if gaps.is_empty() {
        return Ok((1, lambdas, gaps));
    }

    let bound = max_num_speakers.min(gaps.len());
    let mut best = 0;
    for (i, &gap) in gaps[..bound].iter().enumerate() {
        if gap > gaps[best] {
            best = i;
        }
    }
    Ok((best + 1, lambdas, gaps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::cos_affinity_matrix;
    use ndarray::Array2;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    /// Three well-separated Gaussian blobs, 30 points each, 10 dimensions.
    fn three_blob_affinity(seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows: Vec<f64> = Vec::with_capacity(90 * 10);
        for c in 0..3usize {
            for _ in 0..30 {
                for d in 0..10usize {
                    let noise: f64 = rng.sample(StandardNormal);
                    let mean = if d == c * 3 { 20.0 } else { 0.0 };
                    rows.push(mean + 0.1 * noise);
                }
            }
        }
        let emb = Array2::from_shape_vec((90, 10), rows).unwrap();
        cos_affinity_matrix(&emb)
    }

    #[test]
    fn test_three_blob_speaker_count() {
        let affinity = three_blob_affinity(13);
        let config = NmescConfig::new().with_max_num_speakers(8);
        let result = nme_analysis(&affinity, &config).unwrap();
        assert_eq!(result.num_speakers, 3);
        assert!(result.p_value >= 1);
    }

    #[test]
    fn test_subsample_ratio() {
        let a = Array2::<f64>::eye(10);
        let (sub, ratio) = subsample(&a, 300);
        assert_eq!(ratio, 1);
        assert_eq!(sub.nrows(), 10);

        let a = Array2::<f64>::eye(650);
        let (sub, ratio) = subsample(&a, 300);
        assert_eq!(ratio, 2);
        assert_eq!(sub.nrows(), 325);

        let a = Array2::<f64>::eye(900);
        let (sub, ratio) = subsample(&a, 300);
        assert_eq!(ratio, 3);
        assert_eq!(sub.nrows(), 300);
    }

    #[test]
    fn test_p_value_candidates_sparse() {
        let config = NmescConfig::new().with_sparse_search_volume(10);
        let (candidates, max_n) = p_value_candidates(200, &config);
        assert_eq!(max_n, 30);
        assert!(candidates.len() <= 10);
        assert_eq!(candidates[0], 1);
        assert!(*candidates.last().unwrap() <= max_n);
        assert!(candidates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_p_value_candidates_full() {
        let config = NmescConfig::new().with_sparse_search(false);
        let (candidates, max_n) = p_value_candidates(100, &config);
        assert_eq!(max_n, 15);
        assert_eq!(candidates, (1..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_p_value_candidates_tiny_input() {
        // floor(4 * 0.15) = 0: the p = 1 guard kicks in.
        let config = NmescConfig::new();
        let (candidates, max_n) = p_value_candidates(4, &config);
        assert_eq!(max_n, 1);
        assert_eq!(candidates, vec![1]);
    }

    #[test]
    fn test_p_value_candidates_fixed_thres() {
        let config = NmescConfig::new().with_fixed_thres(0.1);
        let (candidates, max_n) = p_value_candidates(120, &config);
        assert_eq!(candidates, vec![12]);
        assert_eq!(max_n, 12);
    }

    #[test]
    fn test_fixed_thres_analysis() {
        let affinity = three_blob_affinity(5);
        let config = NmescConfig::new()
            .with_max_num_speakers(8)
            .with_fixed_thres(0.1);
        let result = nme_analysis(&affinity, &config).unwrap();
        assert_eq!(result.p_value, 9);
        assert_eq!(result.num_speakers, 3);
    }

    #[test]
    fn test_estimate_num_speakers_block_graph() {
        // Two disconnected blocks: two zero eigenvalues, gap at index 1.
        let mut graph = Array2::<f64>::zeros((6, 6));
        for i in 0..6 {
            for j in 0..6 {
                if i != j && (i < 3) == (j < 3) {
                    graph[[i, j]] = 1.0;
                }
            }
        }
        let est = estimate_num_speakers(&graph, 8).unwrap();
        assert_eq!(est, 2);
    }

    #[test]
    fn test_estimate_bounded_by_max_speakers() {
        // Identity-like graph (no edges): all eigenvalues zero, every gap
        // zero; the estimate stays at 1 and within bounds regardless.
        let graph = Array2::<f64>::zeros((6, 6));
        let est = estimate_num_speakers(&graph, 3).unwrap();
        assert!(est >= 1 && est <= 3);
    }

    #[test]
    fn test_nme_rejects_non_square() {
        let bad = Array2::<f64>::zeros((3, 4));
        let err = nme_analysis(&bad, &NmescConfig::new()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_nme_deterministic() {
        let affinity = three_blob_affinity(99);
        let config = NmescConfig::new().with_max_num_speakers(8);
        let a = nme_analysis(&affinity, &config).unwrap();
        let b = nme_analysis(&affinity, &config).unwrap();
        assert_eq!(a, b);
    }
}
