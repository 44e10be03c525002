#![warn(missing_docs)]

//! ecdedup core: deduplication-aware routing of erasure-coded shares
//!
//! Batch path: Data → Pad (PKCS#7) → Encode (Reed-Solomon) → Fingerprint (BLAKE3)
//! → Similarity matrix → Assignment (Hungarian) → Database update
//!
//! Nothing here performs I/O or spawns threads. Run-scoped state ([`Database`],
//! [`PieceLengthTable`]) is passed explicitly or owned by a [`DedupRun`].

pub mod assign;
pub mod database;
pub mod erasure;
pub mod error;
pub mod fingerprint;
pub mod matrix;
pub mod padding;
pub mod pipeline;

pub use assign::{score_assignment, solve, Assignment, AssignmentPolicy};
pub use database::{clear_database, new_database, update_database, BucketId, Database};
pub use erasure::{decode, encode, ErasureCoder, ErasureParams, Share};
pub use error::{DedupError, DedupResult};
pub use fingerprint::{
    blake3_digest, fingerprint, Digest, Fingerprint, Fingerprinter, Piece, PieceLengthTable,
};
pub use matrix::{build_matrix, SimilarityMatrix};
pub use padding::PaddingCodec;
pub use pipeline::{BatchOutcome, DedupRun, RoutingUnit, RunConfig, RunStats};
