//! Error types for the ecdedup core

/// Result type alias for core operations.
pub type DedupResult<T> = Result<T, DedupError>;

/// All errors that can occur while coding, fingerprinting or matching shares
#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    /// Padding block size outside 2..=255
    #[error("Invalid block size {block_size}: must be between 2 and 255, inclusive")]
    InvalidBlockSize {
        /// The rejected block size.
        block_size: usize,
    },
    /// Fewer distinct shares than the reconstruction threshold were supplied
    #[error("Insufficient shares: need {needed}, got {got}")]
    InsufficientShares {
        /// Shares required (T).
        needed: usize,
        /// Distinct shares actually supplied.
        got: usize,
    },
    /// Supplied shares cannot belong to one encoding
    #[error("Malformed shares: {0}")]
    MalformedShares(String),
    /// Similarity matrix or assignment is degenerate
    #[error("Invalid matrix: {0}")]
    InvalidMatrix(String),
    /// Parameter rejected at the API boundary (T > N, zero piece length, ...)
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    /// The Reed-Solomon library returned an error
    #[error("Reed-Solomon error: {0}")]
    ReedSolomon(#[from] reed_solomon_erasure::Error),
    /// Decoding a file from a subset of its shares did not reproduce it
    #[error("Reconstruction mismatch: decoded {decoded} bytes, expected {expected}")]
    ReconstructionMismatch {
        /// Length of the original buffer.
        expected: usize,
        /// Length of the decoded buffer.
        decoded: usize,
    },
}
