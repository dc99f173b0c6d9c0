//! Top-level speaker clustering orchestration.
//!
//! [`cluster`] wires the whole pipeline together for one session:
//!
//! ```text
//! multiscale embeddings
//!   └─ fuse scales into one affinity matrix        (affinity)
//!      └─ NME search: neighbor count + count est   (nmesc)
//!         └─ binarized graph                       (graph)
//!            └─ spectral embedding                 (spectral)
//!               └─ seeded k-means + majority vote  (kmeans)
//! ```
//!
//! Three execution paths, chosen by session size:
//!
//! - **Trivial**: a single segment returns label 0 immediately.
//! - **Enhanced counting**: short sessions (at most
//!   `enhanced_count_thres` segments, no oracle count) estimate the
//!   speaker count with anchor augmentation before clustering.
//! - **Standard**: NME analysis picks the binarization threshold and count.
//!
//! The final speaker count resolves by priority: oracle, then enhanced
//! estimate, then NME estimate. The whole call is deterministic for a fixed
//! config; every stochastic step derives from the config seed.

use log::debug;
use ndarray::Array2;

use crate::affinity::fuse_multiscale;
use crate::anchors::{enhanced_speaker_count, EnhancedCountConfig};
use crate::error::{Error, Result};
use crate::graph::binarize;
use crate::kmeans::cluster_embeddings;
use crate::nme::{nme_analysis, NmescConfig};
use crate::scales::MultiscaleInput;
use crate::spectral::spectral_embeddings;

/// Matrix size target for NME subsampling at the session level.
const SESSION_NME_MAT_SIZE: usize = 300;

/// Session-level clustering configuration.
#[derive(Debug, Clone)]
pub struct ClusteringConfig {
    /// Maximum number of speakers to consider.
    max_num_speakers: usize,
    /// Minimum segment count for NME analysis.
    min_samples_for_nmesc: usize,
    /// Segment count at or below which enhanced counting runs.
    enhanced_count_thres: usize,
    /// NME neighbor-fraction search bound.
    max_rp_threshold: f64,
    /// NME sparse search volume.
    sparse_search_volume: usize,
    /// Fixed threshold; > 0 skips the NME search.
    fixed_thres: f64,
    /// Known speaker count, if any. Overrides all estimates.
    oracle_num_speakers: Option<usize>,
    /// Base seed for k-means trials.
    seed: u64,
    /// Number of k-means trials to majority-vote over.
    kmeans_trials: usize,
    /// Enhanced counting parameters.
    enhanced: EnhancedCountConfig,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            max_num_speakers: 8,
            min_samples_for_nmesc: 6,
            enhanced_count_thres: 80,
            max_rp_threshold: 0.15,
            sparse_search_volume: 30,
            fixed_thres: 0.0,
            oracle_num_speakers: None,
            seed: 0,
            kmeans_trials: 1,
            enhanced: EnhancedCountConfig::default(),
        }
    }
}

impl ClusteringConfig {
    /// Create a config with the recommended defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of speakers.
    pub fn with_max_num_speakers(mut self, n: usize) -> Self {
        self.max_num_speakers = n;
        self
    }

    /// Set the minimum segment count for NME analysis.
    pub fn with_min_samples_for_nmesc(mut self, n: usize) -> Self {
        self.min_samples_for_nmesc = n;
        self
    }

    /// Set the enhanced-counting threshold.
    pub fn with_enhanced_count_thres(mut self, n: usize) -> Self {
        self.enhanced_count_thres = n;
        self
    }

    /// Set the NME neighbor-fraction search bound.
    pub fn with_max_rp_threshold(mut self, threshold: f64) -> Self {
        self.max_rp_threshold = threshold;
        self
    }

    /// Set the NME sparse search volume.
    pub fn with_sparse_search_volume(mut self, volume: usize) -> Self {
        self.sparse_search_volume = volume;
        self
    }

    /// Set a fixed binarization threshold, skipping the NME search.
    pub fn with_fixed_thres(mut self, thres: f64) -> Self {
        self.fixed_thres = thres;
        self
    }

    /// Provide the oracle speaker count.
    pub fn with_oracle_num_speakers(mut self, n: usize) -> Self {
        self.oracle_num_speakers = Some(n);
        self
    }

    /// Set the base random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of k-means trials (majority vote across trials;
    /// 30 is recommended when runtime allows, 1 is the fast default).
    pub fn with_kmeans_trials(mut self, trials: usize) -> Self {
        self.kmeans_trials = trials.max(1);
        self
    }

    /// Set the enhanced-counting parameters.
    pub fn with_enhanced(mut self, enhanced: EnhancedCountConfig) -> Self {
        self.enhanced = enhanced;
        self
    }
}

/// Cluster a multiscale session into per-segment speaker labels.
///
/// Returns one label per base-scale segment, in segment order.
///
/// # Errors
///
/// Fails on invalid shapes, an oracle count exceeding the segment count, or
/// eigendecomposition non-convergence.
pub fn cluster(input: &MultiscaleInput, config: &ClusteringConfig) -> Result<Vec<usize>> {
    let base = input.base_scale();
    let n = base.n_segments();

    if n == 1 {
        return Ok(vec![0]);
    }

    let short_session = n <= config.enhanced_count_thres.max(config.min_samples_for_nmesc);
    let enhanced_est = if short_session && config.oracle_num_speakers.is_none() {
        let est = enhanced_speaker_count(base.embeddings(), &config.enhanced)?;
        debug!("enhanced count for {n} segments: {est}");
        Some(est)
    } else {
        None
    };

    let max_num_speakers = config
        .oracle_num_speakers
        .unwrap_or(config.max_num_speakers);

    let affinity = fuse_multiscale(input);

    let (matrix, nme_est) = if n > config.min_samples_for_nmesc {
        let nmesc_config = NmescConfig::new()
            .with_max_num_speakers(max_num_speakers)
            .with_max_rp_threshold(config.max_rp_threshold)
            .with_sparse_search(true)
            .with_sparse_search_volume(config.sparse_search_volume)
            .with_fixed_thres(config.fixed_thres)
            .with_nme_mat_size(SESSION_NME_MAT_SIZE);
        let result = nme_analysis(&affinity, &nmesc_config)?;
        (binarize(&affinity, result.p_value), Some(result.num_speakers))
    } else {
        // Too few segments for a meaningful eigengap search: cluster the
        // raw fused affinity.
        (affinity, None)
    };

    let num_speakers = config
        .oracle_num_speakers
        .or(enhanced_est)
        .or(nme_est)
        .unwrap_or(1);
    debug!(
        "session n={n}: oracle={:?} enhanced={enhanced_est:?} nme={nme_est:?} -> k={num_speakers}",
        config.oracle_num_speakers
    );

    cluster_affinity(&matrix, num_speakers, config.seed, config.kmeans_trials)
}

/// Cluster a prepared affinity (or binarized graph) matrix directly.
///
/// This is the entry point for callers that already hold an affinity
/// matrix; [`cluster`] funnels into it after fusion and NME analysis.
///
/// # Errors
///
/// [`Error::ShapeMismatch`] if the matrix is not square;
/// [`Error::InvalidClusterCount`] if `num_speakers` is 0 or exceeds the
/// matrix dimension.
pub fn cluster_affinity(
    affinity: &Array2<f64>,
    num_speakers: usize,
    seed: u64,
    n_trials: usize,
) -> Result<Vec<usize>> {
    if affinity.nrows() != affinity.ncols() {
        return Err(Error::ShapeMismatch {
            expected: format!("{0}x{0}", affinity.nrows()),
            actual: format!("{}x{}", affinity.nrows(), affinity.ncols()),
        });
    }

    let embedding = spectral_embeddings(affinity, num_speakers)?;
    cluster_embeddings(&embedding, num_speakers, seed, n_trials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::purity;
    use crate::scales::ScaleData;
    use ndarray::Array2;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    /// `n_per` points per cluster around orthogonal means, plus matching
    /// interval strings and ground-truth labels.
    fn blob_session(
        n_clusters: usize,
        n_per: usize,
        dim: usize,
        seed: u64,
    ) -> (MultiscaleInput, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(n_clusters * n_per);
        let mut truth = Vec::with_capacity(n_clusters * n_per);
        for c in 0..n_clusters {
            for _ in 0..n_per {
                let mut row = vec![0.0f64; dim];
                for (d, v) in row.iter_mut().enumerate() {
                    let noise: f64 = rng.sample(StandardNormal);
                    let mean = if d == c * 2 { 20.0 } else { 0.0 };
                    *v = mean + 0.1 * noise;
                }
                rows.push(row);
                truth.push(c);
            }
        }
        let n = rows.len();
        let timestamps: Vec<String> = (0..n)
            .map(|i| format!("{}.0 {}.0", i, i + 1))
            .collect();
        let scale = ScaleData::new(rows, &timestamps, 1.0).unwrap();
        (MultiscaleInput::single(scale), truth)
    }

    #[test]
    fn test_single_segment_label_zero() {
        let scale = ScaleData::new(vec![vec![1.0, 0.0]], &["0 1"], 1.0).unwrap();
        let input = MultiscaleInput::single(scale);
        let labels = cluster(&input, &ClusteringConfig::new()).unwrap();
        assert_eq!(labels, vec![0]);
    }

    #[test]
    fn test_identical_embeddings_single_label() {
        let rows = vec![vec![0.7, 0.3, 0.1]; 10];
        let timestamps: Vec<String> = (0..10).map(|i| format!("{i} {}", i + 1)).collect();
        let scale = ScaleData::new(rows, &timestamps, 1.0).unwrap();
        let input = MultiscaleInput::single(scale);

        let labels = cluster(&input, &ClusteringConfig::new()).unwrap();
        assert_eq!(labels.len(), 10);
        assert!(labels.iter().all(|&l| l == labels[0]));
    }

    #[test]
    fn test_three_speakers_recovered() {
        // 90 segments puts the session on the standard NME path.
        let (input, truth) = blob_session(3, 30, 10, 1);
        let config = ClusteringConfig::new().with_kmeans_trials(5);
        let labels = cluster(&input, &config).unwrap();

        assert_eq!(labels.len(), 90);
        let distinct: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(distinct.len(), 3);
        assert!(
            purity(&labels, &truth) >= 0.95,
            "purity {} below 0.95",
            purity(&labels, &truth)
        );
    }

    #[test]
    fn test_oracle_count_wins() {
        let (input, _) = blob_session(3, 30, 10, 2);
        let config = ClusteringConfig::new().with_oracle_num_speakers(2);
        let labels = cluster(&input, &config).unwrap();
        let distinct: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(distinct.len(), 2);
    }

    #[test]
    fn test_short_session_enhanced_path() {
        // 20 segments: below the enhanced-count threshold, above the NME
        // minimum, so both estimators run and the enhanced count wins.
        let (input, _) = blob_session(2, 10, 6, 3);
        let labels = cluster(&input, &ClusteringConfig::new()).unwrap();
        assert_eq!(labels.len(), 20);
        assert!(labels.iter().all(|&l| l < 20));
    }

    #[test]
    fn test_deterministic_end_to_end() {
        let (input, _) = blob_session(3, 30, 10, 4);
        let config = ClusteringConfig::new().with_kmeans_trials(3).with_seed(9);
        let a = cluster(&input, &config).unwrap();
        let b = cluster(&input, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cluster_affinity_rejects_non_square() {
        let bad = Array2::<f64>::zeros((3, 4));
        let err = cluster_affinity(&bad, 2, 0, 1).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_oracle_beyond_segments_errors() {
        let (input, _) = blob_session(2, 3, 4, 5);
        let config = ClusteringConfig::new().with_oracle_num_speakers(10);
        let err = cluster(&input, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidClusterCount { .. }));
    }
}
