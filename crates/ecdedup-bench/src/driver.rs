//! A single benchmark run over a corpus.

use crate::config::BenchConfig;
use crate::corpus::Corpus;
use ecdedup_core::{AssignmentPolicy, DedupRun, RoutingUnit};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Summary of one run, one CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub threshold: usize,
    pub total: usize,
    pub buckets: usize,
    pub policy: AssignmentPolicy,
    pub unit: RoutingUnit,
    pub piece_length: usize,
    pub files: usize,
    pub batches: usize,
    pub total_bytes: u64,
    pub dedup_bytes: u64,
    pub rate: f64,
    pub elapsed_ms: u64,
}

/// Feed the whole corpus through a fresh run, in batches of random size.
///
/// Batch sizes are drawn uniformly from `batch_min..=batch_max` with an RNG
/// seeded from the config; the same RNG drives the random policy.
pub fn run(corpus: &Corpus, config: &BenchConfig) -> anyhow::Result<RunReport> {
    config.validate()?;
    let run_config = config.run_config()?;
    let mut dedup = DedupRun::new(run_config)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let started = Instant::now();

    let files = corpus.files();
    let mut idx = 0;
    while idx < files.len() {
        let size = rng.gen_range(config.batch_min..=config.batch_max);
        let end = (idx + size).min(files.len());
        let batch: Vec<&[u8]> = files[idx..end].iter().map(|f| f.data.as_ref()).collect();
        let outcome = dedup.process_batch(&batch, &mut rng)?;
        debug!(
            first = %files[idx].path.display(),
            files = batch.len(),
            score = outcome.score,
            "batch done"
        );
        idx = end;
    }

    let stats = dedup.stats();
    let report = RunReport {
        threshold: config.threshold,
        total: config.total,
        buckets: config.bucket_count(),
        policy: config.policy,
        unit: config.unit,
        piece_length: config.piece_length,
        files: stats.files,
        batches: stats.batches,
        total_bytes: stats.total_bytes,
        dedup_bytes: stats.dedup_bytes,
        rate: stats.rate(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        t = report.threshold,
        n = report.total,
        k = report.buckets,
        rate = report.rate,
        "run finished"
    );
    Ok(report)
}
