//! Content-addressed deduplication index: digest → buckets already holding it.
//!
//! The index only grows within a run. Independent runs each start from a
//! fresh (or cleared) [`Database`].

use crate::assign::Assignment;
use crate::error::{DedupError, DedupResult};
use crate::fingerprint::{Digest, Fingerprint};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Identifier of a logical storage destination, `0..K`.
pub type BucketId = usize;

static NO_BUCKETS: BTreeSet<BucketId> = BTreeSet::new();

/// In-memory map from piece digest to the set of buckets storing that piece.
#[derive(Debug, Default, Clone)]
pub struct Database {
    entries: HashMap<Digest, BTreeSet<BucketId>>,
}

impl Database {
    /// Create a new empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Buckets known to hold `digest` (empty if unknown).
    pub fn lookup(&self, digest: &Digest) -> &BTreeSet<BucketId> {
        self.entries.get(digest).unwrap_or(&NO_BUCKETS)
    }

    /// True if `bucket` already holds `digest`.
    pub fn contains(&self, digest: &Digest, bucket: BucketId) -> bool {
        self.lookup(digest).contains(&bucket)
    }

    /// Associate `digest` with `bucket`. Returns true if the pair is new.
    pub fn insert(&mut self, digest: Digest, bucket: BucketId) -> bool {
        self.entries.entry(digest).or_default().insert(bucket)
    }

    /// Record where each real row was routed.
    ///
    /// `k` must match the assignment's bucket count. Row `i` of `fingerprints`
    /// goes to bucket `assignment.column(i) mod k`;
    /// every digest of that fingerprint gains the bucket. Rows past
    /// `fingerprints.len()` are augmentation dummies and are skipped.
    /// Returns the number of new (digest, bucket) pairs.
    pub fn update(
        &mut self,
        assignment: &Assignment,
        fingerprints: &[Fingerprint],
        k: usize,
    ) -> DedupResult<usize> {
        if k == 0 {
            return Err(DedupError::InvalidParameters(
                "bucket count must be positive".to_string(),
            ));
        }
        if assignment.bucket_count() != k {
            return Err(DedupError::InvalidParameters(format!(
                "assignment folds onto {} buckets, database update asked for {k}",
                assignment.bucket_count()
            )));
        }
        if assignment.len() < fingerprints.len() {
            return Err(DedupError::InvalidMatrix(format!(
                "assignment covers {} rows, {} fingerprints supplied",
                assignment.len(),
                fingerprints.len()
            )));
        }

        let mut added = 0;
        for (row, fingerprint) in fingerprints.iter().enumerate() {
            let bucket = assignment.bucket(row);
            for digest in fingerprint.digests() {
                if self.insert(*digest, bucket) {
                    added += 1;
                }
            }
        }
        debug!(rows = fingerprints.len(), added, entries = self.entries.len(), "updated database");
        Ok(added)
    }

    /// Forget everything; used between independent runs.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of distinct digests tracked
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the database empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (digest, bucket) pairs.
    pub fn association_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }
}

/// Create an empty database for a new run.
pub fn new_database() -> Database {
    Database::new()
}

/// Reset `database` before an independent run.
pub fn clear_database(database: &mut Database) {
    database.clear();
}

/// Record `assignment` for `fingerprints` in `database`.
pub fn update_database(
    database: &mut Database,
    assignment: &Assignment,
    fingerprints: &[Fingerprint],
    k: usize,
) -> DedupResult<usize> {
    database.update(assignment, fingerprints, k)
}
