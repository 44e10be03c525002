//! Property-based tests spanning the coder, fingerprinter, matrix and solver

use ecdedup_core::{
    build_matrix, decode, encode, fingerprint, score_assignment, solve, update_database,
    AssignmentPolicy, Database, DedupResult, Fingerprint, PieceLengthTable,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Generates random byte vectors up to `max_size` bytes
pub fn arb_data(max_size: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..max_size)
}

/// Generates erasure rates `(T, N)` with `2 <= T <= N <= 10`
pub fn arb_rate() -> impl Strategy<Value = (usize, usize)> {
    (2usize..=10).prop_flat_map(|n| (2usize..=n, Just(n)))
}

/// Push each file through encode → fingerprint → match → solve → update using
/// the free-function interface, one file per batch.
/// Returns `(total_bytes, score)` summed over all files.
pub fn full_pipeline_score(
    files: &[Vec<u8>],
    t: usize,
    n: usize,
    k: usize,
    piece_length: usize,
    policy: AssignmentPolicy,
) -> DedupResult<(u64, u64)> {
    let mut database = Database::new();
    let mut lengths = PieceLengthTable::new();
    let mut rng = StdRng::seed_from_u64(0);
    let mut total = 0u64;
    let mut score = 0u64;

    for file in files {
        let shares = encode(file, t, n)?;
        let mut fingerprints: Vec<Fingerprint> = Vec::with_capacity(shares.len());
        for share in &shares {
            let (fp, len) = fingerprint(share, piece_length, &mut lengths)?;
            total += len as u64;
            fingerprints.push(fp);
        }
        let matrix = build_matrix(&fingerprints, &database, &lengths, k)?;
        let assignment = solve(&matrix, policy, &mut rng)?;
        score += score_assignment(&matrix, &assignment)?;
        update_database(&mut database, &assignment, &fingerprints, k)?;
    }
    Ok((total, score))
}

/// Indices selected by `mask`, topped up from the front until at least `t` are present.
#[cfg(test)]
fn select_indices(mask: u16, t: usize, n: usize) -> Vec<usize> {
    let mut keep: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
    let mut next = 0;
    while keep.len() < t {
        if !keep.contains(&next) {
            keep.push(next);
        }
        next += 1;
    }
    keep
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_erasure_any_subset((t, n) in arb_rate(), data in arb_data(8192), mask in any::<u16>()) {
        let shares = encode(&data, t, n).unwrap();
        prop_assert_eq!(shares.len(), n);
        let keep = select_indices(mask, t, n);
        let chosen: Vec<_> = keep.iter().map(|&i| shares[i].clone()).collect();
        prop_assert_eq!(decode(&keep, &chosen, t, n).unwrap(), data);
    }

    #[test]
    fn prop_share_fingerprints_cover_shares((t, n) in arb_rate(), data in arb_data(8192), piece in 1usize..600) {
        let mut lengths = PieceLengthTable::new();
        for share in encode(&data, t, n).unwrap() {
            let (fp, len) = fingerprint(&share, piece, &mut lengths).unwrap();
            prop_assert_eq!(len, share.len());
            prop_assert_eq!(fp.total_len(), share.len());
        }
    }

    #[test]
    fn prop_policies_yield_bijections(
        rows in 1usize..9,
        k in 1usize..5,
        scores in prop::collection::vec(0u64..1000, 40),
        seed in any::<u64>(),
    ) {
        let base: Vec<u64> = (0..rows * k).map(|i| scores[i % scores.len()]).collect();
        let matrix = ecdedup_core::SimilarityMatrix::from_scores(base, k).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let optimal = solve(&matrix, AssignmentPolicy::Optimal, &mut rng).unwrap();
        let canonical = solve(&matrix, AssignmentPolicy::Canonical, &mut rng).unwrap();
        let random = solve(&matrix, AssignmentPolicy::Random, &mut rng).unwrap();
        for assignment in [&optimal, &canonical, &random] {
            prop_assert_eq!(assignment.len(), matrix.columns());
            prop_assert!(assignment.is_permutation());
        }
        let best = score_assignment(&matrix, &optimal).unwrap();
        prop_assert!(best >= score_assignment(&matrix, &canonical).unwrap());
        prop_assert!(best >= score_assignment(&matrix, &random).unwrap());
    }

    #[test]
    fn prop_update_idempotent(files in prop::collection::vec(arb_data(3000), 1..5), k in 1usize..4) {
        let mut lengths = PieceLengthTable::new();
        let fingerprints: Vec<Fingerprint> = files
            .iter()
            .map(|f| fingerprint(f, 256, &mut lengths).unwrap().0)
            .collect();
        let mut database = Database::new();
        let matrix = build_matrix(&fingerprints, &database, &lengths, k).unwrap();
        let assignment = solve(&matrix, AssignmentPolicy::Optimal, &mut StdRng::seed_from_u64(1)).unwrap();
        update_database(&mut database, &assignment, &fingerprints, k).unwrap();
        let pairs = database.association_count();
        let added = update_database(&mut database, &assignment, &fingerprints, k).unwrap();
        prop_assert_eq!(added, 0);
        prop_assert_eq!(database.association_count(), pairs);
    }

    #[test]
    fn prop_rate_monotone_under_duplicates(
        files in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..4000), 1..4),
        dups in 1usize..4,
    ) {
        let mut corpus = files.clone();
        let mut previous = {
            let (total, score) = full_pipeline_score(&corpus, 2, 3, 3, 512, AssignmentPolicy::Optimal).unwrap();
            score as f64 / total as f64
        };
        for i in 0..dups {
            corpus.push(files[i % files.len()].clone());
            let (total, score) = full_pipeline_score(&corpus, 2, 3, 3, 512, AssignmentPolicy::Optimal).unwrap();
            let rate = score as f64 / total as f64;
            prop_assert!(rate + 1e-12 >= previous, "rate fell from {} to {}", previous, rate);
            previous = rate;
        }
    }
}

#[test]
fn select_indices_tops_up() {
    assert_eq!(select_indices(0, 2, 3), vec![0, 1]);
    assert_eq!(select_indices(0b100, 2, 3), vec![2, 0]);
    assert_eq!(select_indices(0b111, 2, 3), vec![0, 1, 2]);
}
