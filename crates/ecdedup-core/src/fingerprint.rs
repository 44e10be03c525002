//! Content fingerprinting: fixed-size pieces hashed with BLAKE3

use crate::error::{DedupError, DedupResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Piece length used by the reference benchmarks.
pub const DEFAULT_PIECE_LENGTH: usize = 1024;

/// Content address of a piece: the raw BLAKE3 output, keyed on in the Database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Hash `data` into a digest.
    pub fn of(data: &[u8]) -> Self {
        blake3::hash(data).into()
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Digest(hash.into())
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Digest of a whole buffer.
pub fn blake3_digest(data: &[u8]) -> Digest {
    Digest::of(data)
}

/// One fingerprinted piece of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    /// Content digest.
    pub digest: Digest,
    /// Byte length of the piece.
    pub len: usize,
}

/// Ordered pieces covering one buffer end-to-end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pieces: Vec<Piece>,
}

impl Fingerprint {
    /// Pieces in buffer order.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Digests in buffer order.
    pub fn digests(&self) -> impl Iterator<Item = &Digest> + '_ {
        self.pieces.iter().map(|p| &p.digest)
    }

    /// Sum of piece lengths, equal to the fingerprinted buffer's length.
    pub fn total_len(&self) -> usize {
        self.pieces.iter().map(|p| p.len).sum()
    }

    /// Number of pieces.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// True for the fingerprint of an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

impl FromIterator<Piece> for Fingerprint {
    fn from_iter<I: IntoIterator<Item = Piece>>(iter: I) -> Self {
        Self {
            pieces: iter.into_iter().collect(),
        }
    }
}

/// Side table remembering the byte length behind each digest.
///
/// First writer wins: distinct content with equal digests is assumed not to occur.
#[derive(Debug, Clone, Default)]
pub struct PieceLengthTable {
    lengths: HashMap<Digest, usize>,
}

impl PieceLengthTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `len` for `digest` unless a length is already known.
    pub fn record(&mut self, digest: Digest, len: usize) {
        self.lengths.entry(digest).or_insert(len);
    }

    /// Known length for `digest`.
    pub fn get(&self, digest: &Digest) -> Option<usize> {
        self.lengths.get(digest).copied()
    }

    /// Fold another table in, keeping existing entries.
    pub fn merge(&mut self, other: PieceLengthTable) {
        for (digest, len) in other.lengths {
            self.record(digest, len);
        }
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.lengths.clear();
    }

    /// Number of distinct digests
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

/// Splits buffers into fixed-size pieces and fingerprints them.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    piece_length: usize,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self {
            piece_length: DEFAULT_PIECE_LENGTH,
        }
    }
}

impl Fingerprinter {
    /// Create a fingerprinter; `piece_length` must be positive.
    pub fn new(piece_length: usize) -> DedupResult<Self> {
        if piece_length == 0 {
            return Err(DedupError::InvalidParameters(
                "piece length must be positive".to_string(),
            ));
        }
        Ok(Self { piece_length })
    }

    /// Configured piece length
    pub fn piece_length(&self) -> usize {
        self.piece_length
    }

    /// Fingerprint `data`, recording each piece's length in `lengths`.
    /// Returns the fingerprint and the number of bytes covered.
    pub fn fingerprint(&self, data: &[u8], lengths: &mut PieceLengthTable) -> (Fingerprint, usize) {
        let fingerprint: Fingerprint = data
            .chunks(self.piece_length)
            .map(|piece| {
                let digest = blake3_digest(piece);
                lengths.record(digest, piece.len());
                Piece {
                    digest,
                    len: piece.len(),
                }
            })
            .collect();
        trace!(
            bytes = data.len(),
            pieces = fingerprint.len(),
            piece_length = self.piece_length,
            "fingerprinted buffer"
        );
        (fingerprint, data.len())
    }
}

/// Fingerprint `data` with pieces of `piece_length` bytes.
pub fn fingerprint(
    data: &[u8],
    piece_length: usize,
    lengths: &mut PieceLengthTable,
) -> DedupResult<(Fingerprint, usize)> {
    Ok(Fingerprinter::new(piece_length)?.fingerprint(data, lengths))
}
