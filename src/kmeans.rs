//! Seeded k-means over spectral embeddings.
//!
//! # k-means++ Seeding
//!
//! Lloyd's algorithm is initialization-sensitive. k-means++ spreads the
//! initial centers: the first is uniform at random, each later one is chosen
//! from candidates sampled with probability proportional to D(x)^2, the
//! squared distance to the nearest already-chosen center (Arthur &
//! Vassilvitskii, 2007). Per round, `n_local_trials` candidates are drawn by
//! cumulative-sum sampling and the one minimizing the total potential is
//! committed.
//!
//! # Refinement
//!
//! Standard Lloyd iteration: nearest-center assignment under squared
//! Euclidean distance, centers recomputed as member means, an empty cluster
//! reseeded to a uniformly random data point. Iteration stops when the
//! squared sum of per-center shift norms falls below the threshold, or at
//! the iteration cap. The tight default cap (15) is tuned for spectral
//! embeddings, which are low-dimensional and well separated.
//!
//! # Trials and voting
//!
//! [`cluster_embeddings`] repeats seed+refine over consecutive seeds and
//! takes a per-point majority vote. Cluster indices are arbitrary per trial,
//! so every trial is first aligned to the first trial's labeling by
//! maximum-overlap matching; voting raw indices across unaligned trials can
//! mix incompatible labelings.
//!
//! All randomness is seeded (`StdRng`); identical inputs and seeds give
//! bit-identical labels.

use ndarray::Array2;
use rand::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Center-shift threshold below which refinement stops.
const SHIFT_THRESHOLD: f64 = 1e-4;
/// Refinement iteration cap.
const ITER_LIMIT: usize = 15;
/// Candidate count per k-means++ seeding round.
const N_LOCAL_TRIALS: usize = 30;

/// Choose `k` initial centers from the rows of `x` with k-means++.
///
/// # Errors
///
/// Returns an error for empty input or `k` outside [1, n].
pub fn kmeans_plus_plus(x: &Array2<f64>, k: usize, seed: u64) -> Result<Array2<f64>> {
    validate(x, k)?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(seed_centers(x, k, &mut rng))
}

/// Full k-means: k-means++ seeding plus Lloyd refinement.
///
/// The empty-cluster reseed draws from the same seeded RNG stream as the
/// seeding step, so a single `seed` fixes the whole run.
pub fn kmeans(x: &Array2<f64>, k: usize, seed: u64) -> Result<Vec<usize>> {
    validate(x, k)?;
    let n = x.nrows();
    let d = x.ncols();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = seed_centers(x, k, &mut rng);
    let mut labels = vec![0usize; n];

    for _iter in 0..ITER_LIMIT {
        assign(x, &centers, &mut labels, k);

        let old_centers = centers.clone();
        let mut counts = vec![0usize; k];
        centers.fill(0.0);
        for i in 0..n {
            let c = labels[i];
            counts[c] += 1;
            for j in 0..d {
                centers[[c, j]] += x[[i, j]];
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for j in 0..d {
                    centers[[c, j]] /= counts[c] as f64;
                }
            } else {
                // Degenerate cluster: reseed to a random data point.
                let idx = rng.random_range(0..n);
                for j in 0..d {
                    centers[[c, j]] = x[[idx, j]];
                }
            }
        }

        // Squared sum of per-center shift norms.
        let mut shift_sum = 0.0;
        for c in 0..k {
            let mut sq = 0.0;
            for j in 0..d {
                let diff = centers[[c, j]] - old_centers[[c, j]];
                sq += diff * diff;
            }
            shift_sum += sq.sqrt();
        }
        if shift_sum * shift_sum < SHIFT_THRESHOLD {
            break;
        }
    }

    Ok(labels)
}

/// Run k-means for seeds `base_seed..base_seed + n_trials`, align every
/// trial to the first, and return the per-point majority vote.
///
/// Ties vote for the smallest label, so the result is deterministic.
pub fn cluster_embeddings(
    x: &Array2<f64>,
    k: usize,
    base_seed: u64,
    n_trials: usize,
) -> Result<Vec<usize>> {
    validate(x, k)?;
    let n_trials = n_trials.max(1);
    let n = x.nrows();

    let reference = kmeans(x, k, base_seed)?;
    let mut aligned: Vec<Vec<usize>> = Vec::with_capacity(n_trials);
    aligned.push(reference.clone());
    for t in 1..n_trials as u64 {
        let labels = kmeans(x, k, base_seed + t)?;
        aligned.push(align_to_reference(&labels, &reference, k));
    }

    let mut voted = vec![0usize; n];
    let mut tally = vec![0usize; k];
    for (i, vote) in voted.iter_mut().enumerate() {
        tally.fill(0);
        for labels in &aligned {
            tally[labels[i]] += 1;
        }
        let mut best = 0;
        for (label, &count) in tally.iter().enumerate() {
            if count > tally[best] {
                best = label;
            }
        }
        *vote = best;
    }
    Ok(voted)
}

/// Squared Euclidean distances between the rows of `a` and the rows of `b`.
pub fn pairwise_sq_distances(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((a.nrows(), b.nrows()));
    for i in 0..a.nrows() {
        for j in 0..b.nrows() {
            let mut sq = 0.0;
            for c in 0..a.ncols() {
                let diff = a[[i, c]] - b[[j, c]];
                sq += diff * diff;
            }
            out[[i, j]] = sq;
        }
    }
    out
}

fn validate(x: &Array2<f64>, k: usize) -> Result<()> {
    if x.nrows() == 0 {
        return Err(Error::EmptyInput);
    }
    if k == 0 || k > x.nrows() {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: x.nrows(),
        });
    }
    Ok(())
}

fn seed_centers(x: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = x.nrows();
    let d = x.ncols();
    let mut centers = Array2::<f64>::zeros((k, d));

    let first = rng.random_range(0..n);
    for j in 0..d {
        centers[[0, j]] = x[[first, j]];
    }

    // D(x)^2 to the nearest chosen center, maintained incrementally.
    let mut closest_sq: Vec<f64> = (0..n)
        .map(|i| {
            let mut sq = 0.0;
            for j in 0..d {
                let diff = x[[i, j]] - centers[[0, j]];
                sq += diff * diff;
            }
            sq
        })
        .collect();
    let mut current_pot: f64 = closest_sq.iter().sum();

    let mut cumsum = vec![0.0f64; n];
    for c in 1..k {
        let mut acc = 0.0;
        for (i, &v) in closest_sq.iter().enumerate() {
            acc += v;
            cumsum[i] = acc;
        }

        let mut best_candidate = 0usize;
        let mut best_pot = f64::INFINITY;
        let mut best_dist: Vec<f64> = Vec::new();
        for _ in 0..N_LOCAL_TRIALS {
            let target = rng.random::<f64>() * current_pot;
            let candidate = cumsum
                .partition_point(|&v| v < target)
                .min(n - 1);

            let mut pot = 0.0;
            let mut dist = Vec::with_capacity(n);
            for i in 0..n {
                let mut sq = 0.0;
                for j in 0..d {
                    let diff = x[[i, j]] - x[[candidate, j]];
                    sq += diff * diff;
                }
                let v = sq.min(closest_sq[i]);
                pot += v;
                dist.push(v);
            }
            if pot < best_pot {
                best_pot = pot;
                best_candidate = candidate;
                best_dist = dist;
            }
        }

        for j in 0..d {
            centers[[c, j]] = x[[best_candidate, j]];
        }
        closest_sq = best_dist;
        current_pot = best_pot;
    }

    centers
}

fn assign(x: &Array2<f64>, centers: &Array2<f64>, labels: &mut [usize], k: usize) {
    #[cfg(feature = "parallel")]
    {
        labels.par_iter_mut().enumerate().for_each(|(i, label)| {
            *label = nearest_center(x, centers, i, k);
        });
    }

    #[cfg(not(feature = "parallel"))]
    for (i, label) in labels.iter_mut().enumerate() {
        *label = nearest_center(x, centers, i, k);
    }
}

fn nearest_center(x: &Array2<f64>, centers: &Array2<f64>, i: usize, k: usize) -> usize {
    let d = x.ncols();
    let mut best = 0;
    let mut best_sq = f64::INFINITY;
    for c in 0..k {
        let mut sq = 0.0;
        for j in 0..d {
            let diff = x[[i, j]] - centers[[c, j]];
            sq += diff * diff;
        }
        if sq < best_sq {
            best_sq = sq;
            best = c;
        }
    }
    best
}

/// Relabel `labels` onto `reference`'s cluster indices by maximum-overlap
/// matching of the k x k agreement matrix (greedy, deterministic).
fn align_to_reference(labels: &[usize], reference: &[usize], k: usize) -> Vec<usize> {
    let mut overlap = Array2::<usize>::zeros((k, k));
    for (&a, &b) in labels.iter().zip(reference.iter()) {
        overlap[[a, b]] += 1;
    }

    let mut mapping = vec![usize::MAX; k];
    let mut row_used = vec![false; k];
    let mut col_used = vec![false; k];
    for _ in 0..k {
        let mut best: Option<(usize, usize, usize)> = None;
        for a in 0..k {
            if row_used[a] {
                continue;
            }
            for b in 0..k {
                if col_used[b] {
                    continue;
                }
                let count = overlap[[a, b]];
                if best.map_or(true, |(c, _, _)| count > c) {
                    best = Some((count, a, b));
                }
            }
        }
        let (_, a, b) = best.expect("k unmatched pairs remain");
        mapping[a] = b;
        row_used[a] = true;
        col_used[b] = true;
    }

    labels.iter().map(|&a| mapping[a]).collect()
}
