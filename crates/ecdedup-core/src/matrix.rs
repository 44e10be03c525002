//! Similarity matrix between candidate rows (shares or files) and buckets.
//!
//! `score(i, j)` is the number of bytes of row `i` whose pieces bucket `j`
//! already stores. When there are more rows than buckets the bucket columns are
//! tiled `ratio = ceil(M / K)` times and zero rows are appended, giving a square
//! `ratio*K` matrix the assignment solver can match perfectly. Tiling is pure
//! index arithmetic over the `M x K` base scores.

use crate::database::{BucketId, Database};
use crate::error::{DedupError, DedupResult};
use crate::fingerprint::{Fingerprint, PieceLengthTable};
use tracing::debug;

/// Augmented square similarity matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityMatrix {
    /// Row-major `real_rows x buckets` base scores.
    base: Vec<u64>,
    real_rows: usize,
    buckets: usize,
    ratio: usize,
}

impl SimilarityMatrix {
    /// Wrap row-major base scores for `buckets` buckets and augment them.
    pub fn from_scores(base: Vec<u64>, buckets: usize) -> DedupResult<Self> {
        if buckets == 0 {
            return Err(DedupError::InvalidMatrix(
                "bucket count must be positive".to_string(),
            ));
        }
        if base.len() % buckets != 0 {
            return Err(DedupError::InvalidMatrix(format!(
                "{} scores do not fill rows of {} buckets",
                base.len(),
                buckets
            )));
        }
        let real_rows = base.len() / buckets;
        let ratio = if real_rows > buckets {
            real_rows.div_ceil(buckets)
        } else {
            1
        };
        Ok(Self {
            base,
            real_rows,
            buckets,
            ratio,
        })
    }

    /// Row count after augmentation, `max(M, ratio*K)`.
    pub fn rows(&self) -> usize {
        self.real_rows.max(self.columns())
    }

    /// Column count after tiling, `ratio*K`.
    pub fn columns(&self) -> usize {
        self.ratio * self.buckets
    }

    /// Rows backed by real fingerprints (M); the rest are zero dummies.
    pub fn real_rows(&self) -> usize {
        self.real_rows
    }

    /// Bucket count (K).
    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// Number of horizontal tiles.
    pub fn ratio(&self) -> usize {
        self.ratio
    }

    /// Bucket a tiled column stands for.
    pub fn bucket_of(&self, column: usize) -> BucketId {
        column % self.buckets
    }

    /// Is the augmented matrix square?
    pub fn is_square(&self) -> bool {
        self.rows() == self.columns()
    }

    /// Score at (`row`, `column`) of the augmented matrix; zero for dummy rows.
    pub fn get(&self, row: usize, column: usize) -> u64 {
        if row >= self.real_rows {
            return 0;
        }
        self.base[row * self.buckets + self.bucket_of(column)]
    }

    /// Untiled scores of a real row, one per bucket.
    pub fn bucket_scores(&self, row: usize) -> &[u64] {
        if row >= self.real_rows {
            return &[];
        }
        &self.base[row * self.buckets..(row + 1) * self.buckets]
    }

    /// Largest score in the matrix (zero if empty).
    pub fn max_score(&self) -> u64 {
        self.base.iter().copied().max().unwrap_or(0)
    }
}

/// Score every fingerprint against every bucket of `database`.
///
/// A digest the length table does not know contributes the length recorded
/// in the fingerprint itself.
pub fn build_matrix(
    fingerprints: &[Fingerprint],
    database: &Database,
    lengths: &PieceLengthTable,
    k: usize,
) -> DedupResult<SimilarityMatrix> {
    if k == 0 {
        return Err(DedupError::InvalidMatrix(
            "bucket count must be positive".to_string(),
        ));
    }

    let mut base = vec![0u64; fingerprints.len() * k];
    for (row, fingerprint) in fingerprints.iter().enumerate() {
        let scores = &mut base[row * k..(row + 1) * k];
        for piece in fingerprint.pieces() {
            let buckets = database.lookup(&piece.digest);
            if buckets.is_empty() {
                continue;
            }
            let len = lengths.get(&piece.digest).unwrap_or(piece.len) as u64;
            for &bucket in buckets.iter().filter(|&&b| b < k) {
                scores[bucket] += len;
            }
        }
    }

    let matrix = SimilarityMatrix::from_scores(base, k)?;
    debug!(
        real_rows = matrix.real_rows(),
        buckets = k,
        ratio = matrix.ratio(),
        size = matrix.rows(),
        max_score = matrix.max_score(),
        "built similarity matrix"
    );
    Ok(matrix)
}
