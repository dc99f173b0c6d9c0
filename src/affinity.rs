//! Affinity construction: cosine similarity and multiscale fusion.
//!
//! The clustering pipeline never looks at raw embeddings after this point;
//! everything downstream (binarization, eigengap analysis, spectral
//! embedding) operates on an N x N affinity matrix, where N is the number of
//! base-scale segments.
//!
//! # Construction
//!
//! Per scale:
//!
//! ```text
//! 1. Normalize rows (L2 norm + eps, eps guards zero vectors)
//! 2. A = X_norm · X_normᵀ, diagonal forced to 1
//! 3. Global min-max scaling to [0, 1]
//! ```
//!
//! # Multiscale fusion
//!
//! Coarser scales have fewer segments than the base scale. To fuse them at
//! base resolution, each base segment is assigned the coarse segment whose
//! interval midpoint is nearest in time; the coarse affinity matrix is then
//! replicated row- and column-wise by assignment counts, yielding an N x N
//! matrix aligned with the base scale. The fused affinity is the per-scale
//! weighted sum of these replicated matrices. Weights are taken as given;
//! they should sum to 1 if the fused matrix is to keep a unit diagonal.
//!
//! The whole module is pure: no state survives a call.

use ndarray::Array2;

use crate::scales::MultiscaleInput;

/// Epsilon added to row norms before division.
const NORM_EPS: f64 = 3.5e-4;

/// Cosine-similarity affinity matrix, min-max scaled to [0, 1] with a unit
/// diagonal.
pub fn cos_affinity_matrix(emb: &Array2<f64>) -> Array2<f64> {
    let n = emb.nrows();
    let mut normed = emb.clone();
    for mut row in normed.rows_mut() {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt() + NORM_EPS;
        row.mapv_inplace(|v| v / norm);
    }

    let mut sim = normed.dot(&normed.t());
    for i in 0..n {
        sim[[i, i]] = 1.0;
    }
    scale_min_max(&mut sim);
    sim
}

/// Fuse all scales into one base-resolution affinity matrix.
///
/// For a single-scale input with weight 1.0 this is exactly
/// [`cos_affinity_matrix`] of the base embeddings.
pub fn fuse_multiscale(input: &MultiscaleInput) -> Array2<f64> {
    let base = input.base_scale();
    let n = base.n_segments();
    let base_mids = base.midpoints();

    let mut fused = Array2::<f64>::zeros((n, n));
    for scale in input.scales() {
        let affinity = cos_affinity_matrix(scale.embeddings());
        let mapping = nearest_anchor_mapping(&scale.midpoints(), &base_mids);
        let expanded = expansion_indices(&mapping, scale.n_segments());
        let w = scale.weight();
        for (r, &sr) in expanded.iter().enumerate() {
            for (c, &sc) in expanded.iter().enumerate() {
                fused[[r, c]] += w * affinity[[sr, sc]];
            }
        }
    }
    fused
}

/// Min-max scale a matrix to [0, 1] in place.
///
/// A constant matrix (zero range) maps to all ones, which keeps identical
/// embeddings fully connected instead of producing NaN.
fn scale_min_max(x: &mut Array2<f64>) {
    let mut vmin = f64::INFINITY;
    let mut vmax = f64::NEG_INFINITY;
    for &v in x.iter() {
        vmin = vmin.min(v);
        vmax = vmax.max(v);
    }
    let range = vmax - vmin;
    if range <= f64::EPSILON {
        x.fill(1.0);
        return;
    }
    x.mapv_inplace(|v| (v - vmin) / range);
}

/// For each base-scale midpoint, the index of the nearest midpoint at the
/// other scale (first wins on ties).
fn nearest_anchor_mapping(scale_mids: &[f64], base_mids: &[f64]) -> Vec<usize> {
    base_mids
        .iter()
        .map(|&b| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (j, &m) in scale_mids.iter().enumerate() {
                let dist = (m - b).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// Expand scale indices by assignment multiplicity, in index order.
///
/// `expanded[k]` lists each scale segment index as many times as base
/// segments map to it; the result always has base-scale length.
fn expansion_indices(mapping: &[usize], n_scale_segments: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_scale_segments];
    for &j in mapping {
        counts[j] += 1;
    }
    let mut expanded = Vec::with_capacity(mapping.len());
    for (j, &c) in counts.iter().enumerate() {
        expanded.extend(std::iter::repeat(j).take(c));
    }
    expanded
}
