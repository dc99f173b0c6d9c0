use core::fmt;

/// Result alias for `nmesc`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty (no scales, no segments, or no embeddings).
    EmptyInput,

    /// Embedding dimension mismatch within or across scales.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Matrix shape mismatch (string description).
    ShapeMismatch {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        actual: String,
    },

    /// Invalid number of clusters requested.
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// Eigendecomposition of the Laplacian did not converge.
    EigenFailure {
        /// Dimension of the matrix that failed to decompose.
        dim: usize,
    },

    /// A "start end" time-interval string could not be parsed.
    Timestamp {
        /// The offending string.
        value: String,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::ShapeMismatch { expected, actual } => {
                write!(f, "shape mismatch: expected {expected}, actual {actual}")
            }
            Error::InvalidClusterCount { requested, n_items } => {
                write!(f, "cannot create {requested} clusters from {n_items} items")
            }
            Error::EigenFailure { dim } => {
                write!(f, "eigendecomposition failed for {dim}x{dim} laplacian")
            }
            Error::Timestamp { value } => {
                write!(f, "cannot parse time interval {value:?} as \"start end\"")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
        }
    }
}

impl std::error::Error for Error {}
