//! End-to-end dedup scenarios across core and driver

use crate::proptest_core::full_pipeline_score;
use ecdedup_bench::{run, run_sweep, BenchConfig, Corpus, SweepGrid};
use ecdedup_core::{
    AssignmentPolicy, DedupRun, ErasureParams, RoutingUnit, RunConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

#[test]
fn test_identical_files_single_bucket() {
    let file = noise(10_000, 1);
    let (first_total, first_score) =
        full_pipeline_score(&[file.clone()], 2, 3, 1, 1024, AssignmentPolicy::Optimal).unwrap();
    assert_eq!(first_score, 0);

    let (total, score) =
        full_pipeline_score(&[file.clone(), file], 2, 3, 1, 1024, AssignmentPolicy::Optimal)
            .unwrap();
    let second_total = total - first_total;
    assert!(score > 0);
    assert_eq!(score, second_total);
}

#[test]
fn test_files_differing_in_every_byte() {
    let a = noise(4000, 2);
    let b: Vec<u8> = a.iter().map(|byte| !byte).collect();
    let (_, score) =
        full_pipeline_score(&[a, b], 2, 3, 1, 1024, AssignmentPolicy::Optimal).unwrap();
    assert_eq!(score, 0);
}

#[test]
fn test_abcde_reconstructs_from_parity() {
    let shares = ecdedup_core::encode(b"abcde00000", 2, 3).unwrap();
    let decoded = ecdedup_core::decode(&[1, 2], &shares[1..3], 2, 3).unwrap();
    assert_eq!(decoded, b"abcde00000");
}

#[test]
fn test_runs_are_independent() {
    let file = noise(6000, 3);
    let config = RunConfig {
        buckets: 2,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(0);

    let mut warm = DedupRun::new(config.clone()).unwrap();
    warm.process_file(&file, &mut rng).unwrap();

    let mut cold = DedupRun::new(config).unwrap();
    let outcome = cold.process_file(&file, &mut rng).unwrap();
    assert_eq!(outcome.score, 0);
    assert!(cold.database().len() > 0);

    let again = warm.process_file(&file, &mut rng).unwrap();
    assert_eq!(again.score, again.total_bytes);
}

#[test]
fn test_optimal_beats_canonical_on_shifted_routing() {
    // Both files are fully duplicated, but canonical routing ignores the matrix.
    let files = vec![noise(5000, 4), noise(5000, 5)];
    let config = |policy| RunConfig {
        erasure: ErasureParams::new(2, 4).unwrap(),
        buckets: 4,
        policy,
        unit: RoutingUnit::File,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(9);

    let mut optimal = DedupRun::new(config(AssignmentPolicy::Optimal)).unwrap();
    optimal.process_batch(&files, &mut rng).unwrap();
    let reversed: Vec<Vec<u8>> = files.iter().rev().cloned().collect();
    let best = optimal.process_batch(&reversed, &mut rng).unwrap();
    assert_eq!(best.score, best.total_bytes);

    let mut canonical = DedupRun::new(config(AssignmentPolicy::Canonical)).unwrap();
    canonical.process_batch(&files, &mut rng).unwrap();
    let naive = canonical.process_batch(&reversed, &mut rng).unwrap();
    assert_eq!(naive.score, 0);
}

#[test]
fn test_driver_matches_core_stats() {
    let file = noise(7000, 6);
    let corpus = Corpus::from_buffers(vec![file.clone(), noise(3000, 7), file]);
    let report = run(&corpus, &BenchConfig::default()).unwrap();

    let mut dedup = DedupRun::new(BenchConfig::default().run_config().unwrap()).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    for f in corpus.files() {
        dedup.process_file(&f.data, &mut rng).unwrap();
    }
    assert_eq!(report.total_bytes, dedup.stats().total_bytes);
    assert_eq!(report.dedup_bytes, dedup.stats().dedup_bytes);
}

#[tokio::test]
async fn test_sweep_workers_do_not_share_state() {
    let file = noise(4096, 8);
    let corpus = Arc::new(Corpus::from_buffers(vec![file.clone(), file]));
    let base = BenchConfig {
        workers: 3,
        ..Default::default()
    };
    // Same rate repeated across the grid: every point must see only its own run.
    let grid = SweepGrid {
        n_min: 3,
        n_max: 3,
        buckets: Some(3),
    };
    let reports = run_sweep(corpus.clone(), &base, &grid).await.unwrap();
    let single = run(&corpus, &BenchConfig { threshold: 2, total: 3, ..base.clone() }).unwrap();
    assert_eq!(reports[0].dedup_bytes, single.dedup_bytes);
    assert!((reports[0].rate - 0.5).abs() < 1e-9);
}
