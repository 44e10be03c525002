//! Run-scoped dedup pipeline: encode → fingerprint → match → solve → update

use crate::assign::{score_assignment, solve, AssignmentPolicy};
use crate::database::{BucketId, Database};
use crate::erasure::{ErasureCoder, ErasureParams, Share};
use crate::error::{DedupError, DedupResult};
use crate::fingerprint::{Fingerprint, Fingerprinter, PieceLengthTable, DEFAULT_PIECE_LENGTH};
use crate::matrix::build_matrix;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// What a matrix row stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingUnit {
    /// Each file is erasure-coded and every share is routed independently.
    #[default]
    Share,
    /// Whole files are routed without erasure coding.
    File,
}

impl std::fmt::Display for RoutingUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingUnit::Share => f.write_str("share"),
            RoutingUnit::File => f.write_str("file"),
        }
    }
}

impl std::str::FromStr for RoutingUnit {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "share" => Ok(RoutingUnit::Share),
            "file" => Ok(RoutingUnit::File),
            other => Err(DedupError::InvalidParameters(format!(
                "unknown routing unit: {other}"
            ))),
        }
    }
}

/// Configuration for one dedup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Erasure-code rate (used when routing shares)
    pub erasure: ErasureParams,
    /// Number of buckets (K)
    pub buckets: usize,
    /// Fingerprint piece length in bytes
    pub piece_length: usize,
    /// Matching policy
    pub policy: AssignmentPolicy,
    /// Row granularity
    pub unit: RoutingUnit,
    /// Decode each file from its last T shares and compare before scoring
    pub verify_reconstruction: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            erasure: ErasureParams::two_of_three(),
            buckets: 3,
            piece_length: DEFAULT_PIECE_LENGTH,
            policy: AssignmentPolicy::Optimal,
            unit: RoutingUnit::Share,
            verify_reconstruction: false,
        }
    }
}

/// Result of processing one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Real matrix rows (shares or files)
    pub rows: usize,
    /// Bytes fingerprinted in this batch
    pub total_bytes: u64,
    /// Bytes already present in the chosen buckets
    pub score: u64,
    /// Bucket chosen for each row
    pub buckets: Vec<BucketId>,
}

/// Cumulative statistics for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Files processed
    pub files: usize,
    /// Batches processed
    pub batches: usize,
    /// Rows matched (shares or files)
    pub rows: usize,
    /// Bytes fingerprinted
    pub total_bytes: u64,
    /// Bytes found in their assigned bucket
    pub dedup_bytes: u64,
}

impl RunStats {
    /// Fraction of fingerprinted bytes that deduplicated (0.0 for an empty run)
    pub fn rate(&self) -> f64 {
        if self.total_bytes > 0 {
            self.dedup_bytes as f64 / self.total_bytes as f64
        } else {
            0.0
        }
    }
}

/// One independent run: owns its Database, piece-length table and statistics.
///
/// Batches must be fed in order; each batch sees the Database updates of all
/// earlier batches. A failed batch leaves the run untouched.
pub struct DedupRun {
    config: RunConfig,
    coder: Option<ErasureCoder>,
    fingerprinter: Fingerprinter,
    database: Database,
    lengths: PieceLengthTable,
    stats: RunStats,
}

impl DedupRun {
    /// Validate `config` and start an empty run
    pub fn new(config: RunConfig) -> DedupResult<Self> {
        if config.buckets == 0 {
            return Err(DedupError::InvalidParameters(
                "bucket count must be positive".to_string(),
            ));
        }
        let fingerprinter = Fingerprinter::new(config.piece_length)?;
        let coder = match config.unit {
            RoutingUnit::Share => Some(ErasureCoder::new(config.erasure)?),
            RoutingUnit::File => None,
        };
        Ok(Self {
            config,
            coder,
            fingerprinter,
            database: Database::new(),
            lengths: PieceLengthTable::new(),
            stats: RunStats::default(),
        })
    }

    /// Run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The run's deduplication database
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Known piece lengths
    pub fn lengths(&self) -> &PieceLengthTable {
        &self.lengths
    }

    /// Statistics so far
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Drop all state so the run can start over independently
    pub fn reset(&mut self) {
        self.database.clear();
        self.lengths.clear();
        self.stats = RunStats::default();
    }

    /// Process one file on its own.
    pub fn process_file<R: Rng + ?Sized>(
        &mut self,
        data: &[u8],
        rng: &mut R,
    ) -> DedupResult<BatchOutcome> {
        self.process_batch(&[data], rng)
    }

    /// Route one batch of files and record the result.
    ///
    /// Empty batches are a no-op.
    #[instrument(skip(self, files, rng), fields(files = files.len(), unit = %self.config.unit))]
    pub fn process_batch<F, R>(&mut self, files: &[F], rng: &mut R) -> DedupResult<BatchOutcome>
    where
        F: AsRef<[u8]>,
        R: Rng + ?Sized,
    {
        if files.is_empty() {
            return Ok(BatchOutcome {
                rows: 0,
                total_bytes: 0,
                score: 0,
                buckets: Vec::new(),
            });
        }

        // Fresh lengths are staged so a failing batch changes nothing.
        let mut staged = PieceLengthTable::new();
        let mut fingerprints: Vec<Fingerprint> = Vec::new();
        let mut total_bytes = 0u64;

        for file in files {
            let file = file.as_ref();
            match &self.coder {
                Some(coder) => {
                    let shares = coder.encode(file)?;
                    if self.config.verify_reconstruction {
                        verify(coder, file, &shares)?;
                    }
                    for share in &shares {
                        let (fp, len) = self.fingerprinter.fingerprint(share, &mut staged);
                        total_bytes += len as u64;
                        fingerprints.push(fp);
                    }
                }
                None => {
                    let (fp, len) = self.fingerprinter.fingerprint(file, &mut staged);
                    total_bytes += len as u64;
                    fingerprints.push(fp);
                }
            }
        }

        let k = self.config.buckets;
        let matrix = build_matrix(&fingerprints, &self.database, &self.lengths, k)?;
        let assignment = solve(&matrix, self.config.policy, rng)?;
        let score = score_assignment(&matrix, &assignment)?;
        self.database.update(&assignment, &fingerprints, k)?;
        self.lengths.merge(staged);

        self.stats.files += files.len();
        self.stats.batches += 1;
        self.stats.rows += fingerprints.len();
        self.stats.total_bytes += total_bytes;
        self.stats.dedup_bytes += score;

        debug!(
            rows = fingerprints.len(),
            total_bytes,
            score,
            rate = self.stats.rate(),
            "processed batch"
        );

        Ok(BatchOutcome {
            rows: fingerprints.len(),
            total_bytes,
            score,
            buckets: assignment.buckets(fingerprints.len()),
        })
    }
}

/// Decode from the last T shares and compare with the original.
fn verify(coder: &ErasureCoder, original: &[u8], shares: &[Share]) -> DedupResult<()> {
    let params = coder.params();
    let indices: Vec<usize> = (params.total - params.threshold..params.total).collect();
    let decoded = coder.decode(&indices, &shares[params.total - params.threshold..])?;
    if decoded != original {
        return Err(DedupError::ReconstructionMismatch {
            expected: original.len(),
            decoded: decoded.len(),
        });
    }
    Ok(())
}
