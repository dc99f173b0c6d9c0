//! Multiscale segment data: embeddings, time intervals, fusion weights.
//!
//! Diarization front-ends window a recording at several temporal resolutions
//! ("scales") and emit one embedding per window. Coarse scales give stable
//! speaker representations; fine scales give temporal precision. This module
//! holds the per-scale data and defines the ordering contract used by the
//! rest of the crate:
//!
//! - Scales form an explicit ordered list, coarsest first.
//! - The **base scale is the last record** (the finest resolution). All
//!   cluster labels are emitted at base-scale segment granularity.
//!
//! Time intervals arrive as `"start end"` strings (seconds), the format
//! produced by the segmentation stage, and are parsed once at construction.

use ndarray::Array2;

use crate::error::{Error, Result};

/// Embeddings and time intervals for one temporal scale.
#[derive(Debug, Clone)]
pub struct ScaleData {
    /// One embedding per segment, row-major (n_segments x dim).
    embeddings: Array2<f64>,
    /// Parsed (start, end) interval per segment, in seconds.
    intervals: Vec<(f64, f64)>,
    /// Fusion weight for this scale.
    weight: f64,
}

impl ScaleData {
    /// Build a scale record from embedding rows and `"start end"` interval
    /// strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding list is empty, rows have uneven
    /// dimensions, the interval count does not match the row count, or an
    /// interval string fails to parse.
    pub fn new<S: AsRef<str>>(
        embeddings: Vec<Vec<f64>>,
        timestamps: &[S],
        weight: f64,
    ) -> Result<Self> {
        if embeddings.is_empty() {
            return Err(Error::EmptyInput);
        }
        if timestamps.len() != embeddings.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} timestamps", embeddings.len()),
                actual: format!("{} timestamps", timestamps.len()),
            });
        }

        let dim = embeddings[0].len();
        if dim == 0 {
            return Err(Error::EmptyInput);
        }
        let n = embeddings.len();
        let mut flat: Vec<f64> = Vec::with_capacity(n * dim);
        for row in &embeddings {
            if row.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: row.len(),
                });
            }
            flat.extend(row);
        }
        let embeddings =
            Array2::from_shape_vec((n, dim), flat).map_err(|_| Error::ShapeMismatch {
                expected: format!("{n}x{dim} embedding matrix"),
                actual: "ragged embedding rows".to_string(),
            })?;

        let intervals = timestamps
            .iter()
            .map(|s| parse_interval(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            embeddings,
            intervals,
            weight,
        })
    }

    /// Build a scale record from an already-assembled embedding matrix.
    pub fn from_matrix(
        embeddings: Array2<f64>,
        intervals: Vec<(f64, f64)>,
        weight: f64,
    ) -> Result<Self> {
        if embeddings.nrows() == 0 || embeddings.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        if intervals.len() != embeddings.nrows() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} intervals", embeddings.nrows()),
                actual: format!("{} intervals", intervals.len()),
            });
        }
        Ok(Self {
            embeddings,
            intervals,
            weight,
        })
    }

    /// Number of segments at this scale.
    pub fn n_segments(&self) -> usize {
        self.embeddings.nrows()
    }

    /// Embedding dimension.
    pub fn dim(&self) -> usize {
        self.embeddings.ncols()
    }

    /// Embedding matrix (n_segments x dim).
    pub fn embeddings(&self) -> &Array2<f64> {
        &self.embeddings
    }

    /// Parsed (start, end) intervals.
    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }

    /// Fusion weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Interval midpoints, the anchor times used for cross-scale mapping.
    pub fn midpoints(&self) -> Vec<f64> {
        self.intervals
            .iter()
            .map(|(s, e)| 0.5 * (s + e))
            .collect()
    }
}

/// Ordered multiscale input for one session, coarsest scale first.
///
/// The last record is the base scale; labels are produced per base-scale
/// segment.
#[derive(Debug, Clone)]
pub struct MultiscaleInput {
    scales: Vec<ScaleData>,
}

impl MultiscaleInput {
    /// Wrap an ordered list of scale records.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or the embedding dimension is
    /// not uniform across scales.
    pub fn new(scales: Vec<ScaleData>) -> Result<Self> {
        let Some(first) = scales.first() else {
            return Err(Error::EmptyInput);
        };
        let dim = first.dim();
        for scale in &scales {
            if scale.dim() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: scale.dim(),
                });
            }
        }
        Ok(Self { scales })
    }

    /// Single-scale convenience constructor.
    pub fn single(scale: ScaleData) -> Self {
        Self {
            scales: vec![scale],
        }
    }

    /// All scale records, coarsest first.
    pub fn scales(&self) -> &[ScaleData] {
        &self.scales
    }

    /// Number of scales.
    pub fn n_scales(&self) -> usize {
        self.scales.len()
    }

    /// The base (finest, last) scale.
    pub fn base_scale(&self) -> &ScaleData {
        self.scales.last().expect("validated non-empty")
    }
}

fn parse_interval(raw: &str) -> Result<(f64, f64)> {
    let mut parts = raw.split_whitespace();
    let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::Timestamp {
            value: raw.to_string(),
        });
    };
    let start: f64 = start.parse().map_err(|_| Error::Timestamp {
        value: raw.to_string(),
    })?;
    let end: f64 = end.parse().map_err(|_| Error::Timestamp {
        value: raw.to_string(),
    })?;
    Ok((start, end))
}
