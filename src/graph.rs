//! k-nearest-neighbor graph binarization and connectivity.
//!
//! An affinity matrix is turned into a sparse graph by keeping, per row, the
//! `p` strongest connections and dropping the rest. The directed result is
//! symmetrized as 0.5 * (G + Gᵀ), so entries are 0, 0.5 (one-sided pick), or
//! 1 (mutual pick).
//!
//! Spectral clustering on a disconnected graph produces degenerate
//! eigenvectors, so the binarized graph must be fully connected before it is
//! handed to the embedder. Connectivity is monotonic in `p`: adding
//! neighbors never disconnects a node, which is what makes the minimal
//! neighbor-count search in [`minimum_connection`] well defined.

use ndarray::Array2;

/// Binarize the top-`p` entries per row and symmetrize.
pub fn binarize(affinity: &Array2<f64>, p: usize) -> Array2<f64> {
    let n = affinity.nrows();
    let mut picked = Array2::<f64>::zeros((n, n));
    let mut order: Vec<usize> = Vec::with_capacity(n);
    for i in 0..n {
        order.clear();
        order.extend(0..n);
        let row = affinity.row(i);
        order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
        for &j in order.iter().take(p) {
            picked[[i, j]] = 1.0;
        }
    }

    let mut graph = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            graph[[i, j]] = 0.5 * (picked[[i, j]] + picked[[j, i]]);
        }
    }
    graph
}

/// Whether every node is reachable from node 0, treating nonzero entries as
/// edges.
pub fn is_fully_connected(graph: &Array2<f64>) -> bool {
    let n = graph.nrows();
    if n == 0 {
        return false;
    }
    let mut reached = vec![false; n];
    let mut stack = vec![0usize];
    reached[0] = true;
    let mut count = 1;
    while let Some(i) = stack.pop() {
        for j in 0..n {
            if !reached[j] && graph[[i, j]] != 0.0 {
                reached[j] = true;
                count += 1;
                stack.push(j);
            }
        }
    }
    count == n
}

/// Search candidate neighbor counts, in increasing order, for the smallest
/// one whose binarized graph is fully connected.
///
/// Stops at the first connected graph or once a candidate exceeds `max_n`.
/// If nothing in range connects, the graph for the largest candidate tried
/// is returned best-effort; callers are not guaranteed connectivity.
pub fn minimum_connection(
    affinity: &Array2<f64>,
    candidates: &[usize],
    max_n: usize,
) -> (Array2<f64>, usize) {
    let mut sorted: Vec<usize> = candidates.iter().copied().filter(|&p| p >= 1).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut graph = binarize(affinity, 1);
    let mut p_used = 1;
    for &p in &sorted {
        if p > max_n {
            break;
        }
        graph = binarize(affinity, p);
        p_used = p;
        if is_fully_connected(&graph) {
            break;
        }
    }
    (graph, p_used)
}
