//! Graph Laplacian and spectral embedding.
//!
//! The Laplacian here is the unnormalized L = D - A, with the affinity
//! diagonal zeroed first and D the diagonal of row-wise absolute sums. Its
//! eigen-spectrum drives both ends of the pipeline: the eigengap analysis
//! that estimates the speaker count, and the spectral embedding that k-means
//! finally clusters.
//!
//! Eigendecomposition is the one numerically delicate primitive in the
//! crate. It goes through `faer`'s self-adjoint solver, and eigenvalues are
//! re-sorted ascending here rather than trusting solver output order, since
//! the downstream gap ranking is sensitive to ordering ties.
//!
//! # Embedding convention
//!
//! [`spectral_embeddings`] takes the eigenvectors of the K smallest
//! eigenvalues and **reverses their column order** (largest-to-smallest of
//! the retained K). This is the NME-SC convention (Park et al. 2019) and is
//! preserved exactly; results produced here stay comparable with other
//! implementations of the same algorithm.

use faer::{Mat, Side};
use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Unnormalized graph Laplacian L = D - A with zeroed diagonal.
pub fn laplacian(affinity: &Array2<f64>) -> Array2<f64> {
    let n = affinity.nrows();
    let mut lap = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        let mut degree = 0.0;
        for j in 0..n {
            if i != j {
                degree += affinity[[i, j]].abs();
                lap[[i, j]] = -affinity[[i, j]];
            }
        }
        lap[[i, i]] = degree;
    }
    lap
}

/// Symmetric eigendecomposition, eigenvalues ascending.
///
/// Returns `(eigenvalues, eigenvectors)` where column `k` of the eigenvector
/// matrix pairs with eigenvalue `k`.
///
/// # Errors
///
/// [`Error::EigenFailure`] if the solver does not converge. There is no
/// retry; callers decide whether to re-run with different subsampling.
pub fn eig_decompose(matrix: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = matrix.nrows();
    if n == 0 || matrix.ncols() != n {
        return Err(Error::ShapeMismatch {
            expected: format!("{n}x{n}"),
            actual: format!("{}x{}", matrix.nrows(), matrix.ncols()),
        });
    }

    let mat = Mat::from_fn(n, n, |i, j| matrix[[i, j]]);
    let evd = mat
        .self_adjoint_eigen(Side::Lower)
        .map_err(|_| Error::EigenFailure { dim: n })?;
    let s = evd.S().column_vector();
    let u = evd.U();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| s[a].total_cmp(&s[b]));

    let mut eigenvalues = Array1::<f64>::zeros(n);
    let mut eigenvectors = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        eigenvalues[dst] = s[src];
        for i in 0..n {
            eigenvectors[[i, dst]] = u[(i, src)];
        }
    }
    Ok((eigenvalues, eigenvectors))
}

/// Spectral embedding: eigenvectors of the K smallest Laplacian eigenvalues,
/// column order reversed, as an N x K matrix.
pub fn spectral_embeddings(affinity: &Array2<f64>, k: usize) -> Result<Array2<f64>> {
    let n = affinity.nrows();
    if k == 0 || k > n {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: n,
        });
    }

    let lap = laplacian(affinity);
    let (_, eigenvectors) = eig_decompose(&lap)?;

    let mut embedding = Array2::<f64>::zeros((n, k));
    for c in 0..k {
        let src = k - 1 - c;
        for i in 0..n {
            embedding[[i, c]] = eigenvectors[[i, src]];
        }
    }
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_laplacian_rows_sum_to_zero() {
        let a = array![
            [1.0, 0.5, 0.2],
            [0.5, 1.0, 0.7],
            [0.2, 0.7, 1.0],
        ];
        let lap = laplacian(&a);
        for i in 0..3 {
            let row_sum: f64 = (0..3).map(|j| lap[[i, j]]).sum();
            assert!(row_sum.abs() < 1e-12);
            assert!(lap[[i, i]] > 0.0);
        }
        // The affinity diagonal does not leak into the degree.
        assert!((lap[[0, 0]] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_eig_decompose_ascending() {
        let m = array![
            [3.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 2.0],
        ];
        let (vals, vecs) = eig_decompose(&m).unwrap();
        assert!((vals[0] - 1.0).abs() < 1e-10);
        assert!((vals[1] - 2.0).abs() < 1e-10);
        assert!((vals[2] - 3.0).abs() < 1e-10);

        // Eigenvector columns follow the sorted values: the smallest
        // eigenvalue 1.0 belongs to axis 1.
        assert!(vecs[[1, 0]].abs() > 0.99);
        assert!(vecs[[2, 1]].abs() > 0.99);
        assert!(vecs[[0, 2]].abs() > 0.99);
    }

    #[test]
    fn test_connected_laplacian_null_vector() {
        let a = array![
            [1.0, 0.8, 0.1],
            [0.8, 1.0, 0.6],
            [0.1, 0.6, 1.0],
        ];
        let lap = laplacian(&a);
        let (vals, vecs) = eig_decompose(&lap).unwrap();
        // Connected graph: exactly one (near-)zero eigenvalue with a
        // constant eigenvector.
        assert!(vals[0].abs() < 1e-10);
        assert!(vals[1] > 1e-6);
        let first = vecs[[0, 0]];
        assert!(first.abs() > 1e-6);
        for i in 1..3 {
            assert!((vecs[[i, 0]] - first).abs() < 1e-8);
        }
    }

    #[test]
    fn test_embedding_reverses_columns() {
        let a = array![
            [1.0, 0.9, 0.1, 0.1],
            [0.9, 1.0, 0.1, 0.1],
            [0.1, 0.1, 1.0, 0.9],
            [0.1, 0.1, 0.9, 1.0],
        ];
        let lap = laplacian(&a);
        let (_, vecs) = eig_decompose(&lap).unwrap();
        let emb = spectral_embeddings(&a, 2).unwrap();

        assert_eq!(emb.nrows(), 4);
        assert_eq!(emb.ncols(), 2);
        for i in 0..4 {
            assert!((emb[[i, 0]] - vecs[[i, 1]]).abs() < 1e-12);
            assert!((emb[[i, 1]] - vecs[[i, 0]]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_embedding_separates_blocks() {
        let a = array![
            [1.0, 0.9, 0.05, 0.05],
            [0.9, 1.0, 0.05, 0.05],
            [0.05, 0.05, 1.0, 0.9],
            [0.05, 0.05, 0.9, 1.0],
        ];
        let emb = spectral_embeddings(&a, 2).unwrap();
        // The Fiedler component (column 0 after reversal) splits the blocks.
        assert_eq!(
            emb[[0, 0]].signum(),
            emb[[1, 0]].signum(),
        );
        assert_eq!(
            emb[[2, 0]].signum(),
            emb[[3, 0]].signum(),
        );
        assert_ne!(
            emb[[0, 0]].signum(),
            emb[[2, 0]].signum(),
        );
    }

    #[test]
    fn test_embedding_invalid_k() {
        let a = array![[1.0, 0.5], [0.5, 1.0]];
        assert!(matches!(
            spectral_embeddings(&a, 0).unwrap_err(),
            Error::InvalidClusterCount { .. }
        ));
        assert!(matches!(
            spectral_embeddings(&a, 3).unwrap_err(),
            Error::InvalidClusterCount { .. }
        ));
    }
}
