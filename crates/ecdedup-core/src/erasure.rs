//! Systematic Reed-Solomon coding over GF(2^8) with PKCS#7 padding.
//!
//! A buffer is padded with block size `T`, split into `T` equal data shares and
//! extended with `N - T` parity shares. Any `T` of the `N` shares reconstruct
//! the original buffer byte-for-byte.

use crate::error::{DedupError, DedupResult};
use crate::padding::{PaddingCodec, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use bytes::Bytes;
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One erasure-coded fragment of a buffer.
pub type Share = Bytes;

/// Erasure-code rate: any `threshold` of `total` shares reconstruct the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErasureParams {
    /// Shares needed to reconstruct (T); doubles as the padding block size.
    pub threshold: usize,
    /// Shares produced per buffer (N).
    pub total: usize,
}

impl ErasureParams {
    /// Validated parameters; requires `2 <= threshold <= total <= 255`.
    pub fn new(threshold: usize, total: usize) -> DedupResult<Self> {
        let params = Self { threshold, total };
        params.validate()?;
        Ok(params)
    }

    /// 2-of-3, the rate used by the reference benchmark.
    pub fn two_of_three() -> Self {
        Self {
            threshold: 2,
            total: 3,
        }
    }

    /// Check the bounds imposed by the padding block size and GF(2^8).
    pub fn validate(&self) -> DedupResult<()> {
        if self.threshold < MIN_BLOCK_SIZE {
            return Err(DedupError::InvalidParameters(format!(
                "threshold {} is below {}",
                self.threshold, MIN_BLOCK_SIZE
            )));
        }
        if self.threshold > self.total {
            return Err(DedupError::InvalidParameters(format!(
                "threshold {} exceeds total shares {}",
                self.threshold, self.total
            )));
        }
        if self.total > MAX_BLOCK_SIZE {
            return Err(DedupError::InvalidParameters(format!(
                "total shares {} exceeds {}",
                self.total, MAX_BLOCK_SIZE
            )));
        }
        Ok(())
    }

    /// Number of parity shares (N - T).
    pub fn parity(&self) -> usize {
        self.total - self.threshold
    }

    /// Raw bytes stored per byte of padded input (N / T).
    pub fn storage_overhead(&self) -> f64 {
        self.total as f64 / self.threshold as f64
    }
}

impl Default for ErasureParams {
    fn default() -> Self {
        Self::two_of_three()
    }
}

/// Reusable encoder/decoder for one `(T, N)` rate.
#[derive(Debug, Clone)]
pub struct ErasureCoder {
    params: ErasureParams,
    codec: PaddingCodec,
    /// `None` when `T == N`: the shares are the data shares and nothing is coded.
    rs: Option<ReedSolomon>,
}

impl ErasureCoder {
    /// Build a coder for the given rate.
    pub fn new(params: ErasureParams) -> DedupResult<Self> {
        params.validate()?;
        let codec = PaddingCodec::new(params.threshold)?;
        let rs = match params.parity() {
            0 => None,
            parity => Some(ReedSolomon::new(params.threshold, parity)?),
        };
        Ok(Self { params, codec, rs })
    }

    /// The coder's rate.
    pub fn params(&self) -> ErasureParams {
        self.params
    }

    /// Pad `data` and encode it into `N` shares of equal length.
    ///
    /// Shares `0..T` hold the padded data in order, `T..N` hold parity.
    pub fn encode(&self, data: &[u8]) -> DedupResult<Vec<Share>> {
        let padded = self.codec.pad(data);
        let share_len = padded.len() / self.params.threshold;

        let mut shards: Vec<Vec<u8>> = padded
            .chunks_exact(share_len)
            .map(|c| c.to_vec())
            .collect();
        debug_assert_eq!(shards.len(), self.params.threshold);
        shards.resize(self.params.total, vec![0u8; share_len]);

        if let Some(rs) = &self.rs {
            rs.encode(&mut shards)?;
        }

        debug!(
            t = self.params.threshold,
            n = self.params.total,
            input_len = data.len(),
            share_len,
            "encoded buffer into shares"
        );

        Ok(shards.into_iter().map(Bytes::from).collect())
    }

    /// Reconstruct the original buffer from at least `T` shares.
    ///
    /// `indices[i]` is the position (in `0..N`) of `shares[i]` in the encoding.
    /// Repeating an index with identical content is tolerated; it still counts once.
    pub fn decode<S: AsRef<[u8]>>(&self, indices: &[usize], shares: &[S]) -> DedupResult<Vec<u8>> {
        let t = self.params.threshold;
        let n = self.params.total;

        if indices.len() != shares.len() {
            return Err(DedupError::MalformedShares(format!(
                "{} indices supplied for {} shares",
                indices.len(),
                shares.len()
            )));
        }

        let mut slots: Vec<Option<Vec<u8>>> = vec![None; n];
        let mut share_len: Option<usize> = None;
        let mut distinct = 0usize;

        for (&index, share) in indices.iter().zip(shares) {
            let share = share.as_ref();
            if index >= n {
                return Err(DedupError::MalformedShares(format!(
                    "share index {index} out of range for {n} shares"
                )));
            }
            match share_len {
                None if share.is_empty() => {
                    return Err(DedupError::MalformedShares("empty share".to_string()));
                }
                None => share_len = Some(share.len()),
                Some(len) if len != share.len() => {
                    return Err(DedupError::MalformedShares(format!(
                        "share {index} has length {}, expected {len}",
                        share.len()
                    )));
                }
                Some(_) => {}
            }
            match &slots[index] {
                Some(existing) if existing.as_slice() != share => {
                    return Err(DedupError::MalformedShares(format!(
                        "conflicting contents for share {index}"
                    )));
                }
                Some(_) => {}
                None => {
                    slots[index] = Some(share.to_vec());
                    distinct += 1;
                }
            }
        }

        if distinct < t {
            return Err(DedupError::InsufficientShares {
                needed: t,
                got: distinct,
            });
        }

        if let Some(rs) = &self.rs {
            rs.reconstruct_data(&mut slots[..])?;
        }

        let mut padded = Vec::with_capacity(t * share_len.unwrap_or(0));
        for slot in slots.iter().take(t) {
            match slot {
                Some(data) => padded.extend_from_slice(data),
                None => {
                    return Err(DedupError::InsufficientShares {
                        needed: t,
                        got: distinct,
                    })
                }
            }
        }

        debug!(t, n, supplied = distinct, padded_len = padded.len(), "decoded shares");

        Ok(self.codec.unpad(&padded).to_vec())
    }
}

/// Encode `data` into `n` shares, any `t` of which reconstruct it.
pub fn encode(data: &[u8], t: usize, n: usize) -> DedupResult<Vec<Share>> {
    ErasureCoder::new(ErasureParams::new(t, n)?)?.encode(data)
}

/// Decode a buffer from the shares at `indices` of a `(t, n)` encoding.
pub fn decode<S: AsRef<[u8]>>(
    indices: &[usize],
    shares: &[S],
    t: usize,
    n: usize,
) -> DedupResult<Vec<u8>> {
    ErasureCoder::new(ErasureParams::new(t, n)?)?.decode(indices, shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn subset(shares: &[Share], keep: &[usize]) -> Vec<Share> {
        keep.iter().map(|&i| shares[i].clone()).collect()
    }

    #[test]
    fn decode_from_parity_pair() {
        let shares = encode(b"abcde00000", 2, 3).unwrap();
        assert_eq!(shares.len(), 3);
        let decoded = decode(&[1, 2], &shares[1..3], 2, 3).unwrap();
        assert_eq!(decoded, b"abcde00000");
    }

    #[test]
    fn shares_have_padded_length() {
        // 10 bytes + full block of 2 = 12, split across T=2.
        let shares = encode(b"abcdeabcde", 2, 3).unwrap();
        for share in &shares {
            assert_eq!(share.len(), 6);
        }
        // Systematic: data shares are the padded input.
        assert_eq!(&shares[0][..], b"abcdea");
        assert_eq!(&shares[1][..], b"bcde\x02\x02");
    }

    #[test]
    fn every_two_of_four_reconstructs() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let shares = encode(&data, 2, 4).unwrap();
        for a in 0..4 {
            for b in (a + 1)..4 {
                let decoded = decode(&[a, b], &subset(&shares, &[a, b]), 2, 4).unwrap();
                assert_eq!(decoded, data, "failed with shares {a},{b}");
            }
        }
    }

    #[test]
    fn threshold_equal_total_has_no_parity() {
        let shares = encode(b"hello", 3, 3).unwrap();
        assert_eq!(shares.len(), 3);
        let decoded = decode(&[2, 0, 1], &subset(&shares, &[2, 0, 1]), 3, 3).unwrap();
        assert_eq!(decoded, b"hello");
        assert!(matches!(
            decode(&[0, 1], &subset(&shares, &[0, 1]), 3, 3),
            Err(DedupError::InsufficientShares { needed: 3, got: 2 })
        ));
    }

    #[test]
    fn empty_buffer_roundtrips() {
        let shares = encode(b"", 2, 3).unwrap();
        assert!(shares.iter().all(|s| s.len() == 1));
        assert!(decode(&[0, 2], &subset(&shares, &[0, 2]), 2, 3).unwrap().is_empty());
    }

    #[test]
    fn too_few_shares_errors() {
        let shares = encode(b"some data", 3, 5).unwrap();
        let result = decode(&[0, 4], &subset(&shares, &[0, 4]), 3, 5);
        assert!(matches!(
            result,
            Err(DedupError::InsufficientShares { needed: 3, got: 2 })
        ));
    }

    #[test]
    fn duplicate_index_counts_once() {
        let shares = encode(b"some data", 2, 3).unwrap();
        let result = decode(&[1, 1], &subset(&shares, &[1, 1]), 2, 3);
        assert!(matches!(result, Err(DedupError::InsufficientShares { .. })));
    }

    #[test]
    fn inconsistent_lengths_are_malformed() {
        let shares = encode(b"some data", 2, 3).unwrap();
        let short = shares[1].slice(1..);
        let result = decode(&[0, 1], &[shares[0].clone(), short], 2, 3);
        assert!(matches!(result, Err(DedupError::MalformedShares(_))));
    }

    #[test]
    fn out_of_range_index_is_malformed() {
        let shares = encode(b"some data", 2, 3).unwrap();
        let result = decode(&[0, 3], &subset(&shares, &[0, 1]), 2, 3);
        assert!(matches!(result, Err(DedupError::MalformedShares(_))));
    }

    #[test]
    fn mismatched_index_count_is_malformed() {
        let shares = encode(b"some data", 2, 3).unwrap();
        let result = decode(&[0, 1, 2], &subset(&shares, &[0, 1]), 2, 3);
        assert!(matches!(result, Err(DedupError::MalformedShares(_))));
    }

    #[test]
    fn invalid_rates_rejected() {
        assert!(matches!(encode(b"x", 1, 3), Err(DedupError::InvalidParameters(_))));
        assert!(matches!(encode(b"x", 4, 3), Err(DedupError::InvalidParameters(_))));
        assert!(matches!(encode(b"x", 2, 256), Err(DedupError::InvalidParameters(_))));
    }

    #[test]
    fn params_overhead() {
        let params = ErasureParams::new(2, 3).unwrap();
        assert_eq!(params.parity(), 1);
        assert!((params.storage_overhead() - 1.5).abs() < f64::EPSILON);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_any_threshold_subset_reconstructs(
            data in prop::collection::vec(any::<u8>(), 0..4096),
            t in 2usize..6,
            extra in 0usize..4,
            seed in any::<u64>(),
        ) {
            let n = t + extra;
            let coder = ErasureCoder::new(ErasureParams::new(t, n).unwrap()).unwrap();
            let shares = coder.encode(&data).unwrap();
            prop_assert_eq!(shares.len(), n);

            // Rotate a window of T indices through the N positions.
            let start = (seed % n as u64) as usize;
            let keep: Vec<usize> = (0..t).map(|i| (start + i) % n).collect();
            let decoded = coder.decode(&keep, &subset(&shares, &keep)).unwrap();
            prop_assert_eq!(decoded, data);
        }
    }
}
