//! PKCS#7-style padding (RFC 2315, section 10.3, note 2).
//!
//! Every padded buffer ends with `p` copies of the byte `p`, so the pad length is
//! always recoverable from the trailing byte. Aligned input gains a full block.

use crate::error::{DedupError, DedupResult};

/// Smallest accepted block size.
pub const MIN_BLOCK_SIZE: usize = 2;
/// Largest accepted block size (the pad length must fit in one byte).
pub const MAX_BLOCK_SIZE: usize = 255;

/// Reversible padding codec for a fixed block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingCodec {
    block_size: u8,
}

impl PaddingCodec {
    /// Create a codec; `block_size` must lie in `2..=255`.
    pub fn new(block_size: usize) -> DedupResult<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(DedupError::InvalidBlockSize { block_size });
        }
        Ok(Self {
            block_size: block_size as u8,
        })
    }

    /// Block size this codec aligns to.
    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    /// Number of pad bytes `pad` appends to a buffer of `len` bytes.
    pub fn pad_len(&self, len: usize) -> usize {
        let block = self.block_size();
        block - (len % block)
    }

    /// Append `p` bytes of value `p`; the result is a non-empty multiple of the block size.
    pub fn pad(&self, data: &[u8]) -> Vec<u8> {
        let amount = self.pad_len(data.len());
        let mut padded = Vec::with_capacity(data.len() + amount);
        padded.extend_from_slice(data);
        padded.resize(data.len() + amount, amount as u8);
        padded
    }

    /// Strip the padding added by [`pad`](Self::pad).
    ///
    /// Only meaningful for buffers produced by `pad` with the same block size.
    /// Other input is not validated; it never panics and yields a truncated slice.
    pub fn unpad<'a>(&self, padded: &'a [u8]) -> &'a [u8] {
        match padded.last() {
            Some(&amount) => &padded[..padded.len().saturating_sub(amount as usize)],
            None => padded,
        }
    }
}
