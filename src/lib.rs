//! # nmesc
//!
//! Speaker clustering for diarization via Normalized Maximum Eigengap
//! spectral clustering (NME-SC).
//!
//! Given time-windowed speaker embeddings at one or more temporal scales,
//! the crate estimates how many distinct speakers are present and assigns
//! each base-scale segment a speaker label. No labeled data, no fixed
//! cluster count: the binarization threshold and the speaker count are both
//! auto-tuned from the affinity matrix's Laplacian eigen-spectrum.
//!
//! # Pipeline
//!
//! ```text
//! embeddings ─ affinity fusion ─ NME search ─ binarized graph
//!                                                │
//!                    labels ─ seeded k-means ─ spectral embedding
//! ```
//!
//! # Example
//!
//! ```
//! use nmesc::{cluster, ClusteringConfig, MultiscaleInput, ScaleData};
//!
//! let embeddings = vec![
//!     vec![1.0, 0.0],
//!     vec![0.9, 0.1],
//!     vec![0.0, 1.0],
//! ];
//! let timestamps = ["0.0 1.0", "1.0 2.0", "2.0 3.0"];
//! let scale = ScaleData::new(embeddings, &timestamps, 1.0)?;
//! let input = MultiscaleInput::single(scale);
//!
//! let labels = cluster(&input, &ClusteringConfig::new())?;
//! assert_eq!(labels.len(), 3);
//! # Ok::<(), nmesc::Error>(())
//! ```
//!
//! Everything is deterministic for a fixed seed; no global random state is
//! touched. Eigendecomposition cost is cubic in the session size, bounded
//! by the NME subsampling step.
//!
//! # References
//!
//! - Park et al., "Auto-Tuning Spectral Clustering for Speaker Diarization
//!   Using Normalized Maximum Eigengap", IEEE Signal Processing Letters 27
//!   (2019), <https://arxiv.org/abs/2003.02405>

pub mod affinity;
pub mod anchors;
mod clustering;
/// Error types used across `nmesc`.
pub mod error;
pub mod graph;
pub mod kmeans;
pub mod metrics;
pub mod nme;
pub mod scales;
pub mod spectral;

pub use crate::affinity::{cos_affinity_matrix, fuse_multiscale};
pub use crate::anchors::{add_anchor_embeddings, enhanced_speaker_count, EnhancedCountConfig};
pub use crate::clustering::{cluster, cluster_affinity, ClusteringConfig};
pub use crate::error::{Error, Result};
pub use crate::graph::{binarize, is_fully_connected, minimum_connection};
pub use crate::kmeans::{cluster_embeddings, kmeans, kmeans_plus_plus};
pub use crate::metrics::{ari, purity};
pub use crate::nme::{estimate_num_speakers, nme_analysis, NmescConfig, NmescResult};
pub use crate::scales::{MultiscaleInput, ScaleData};
pub use crate::spectral::{eig_decompose, laplacian, spectral_embeddings};
