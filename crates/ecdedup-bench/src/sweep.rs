//! Parameter sweeps: independent runs on a bounded pool of blocking workers.
//!
//! Each grid point builds its own `DedupRun`, so no Database is ever shared
//! between workers. Only the corpus is shared, read-only.

use crate::config::BenchConfig;
use crate::corpus::Corpus;
use crate::driver::{self, RunReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Erasure-rate grid: `N` in `n_min..=n_max`, `T` in `2..=N`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepGrid {
    pub n_min: usize,
    pub n_max: usize,
    /// Fixed bucket count; `None` uses `K = N`.
    pub buckets: Option<usize>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            n_min: 3,
            n_max: 8,
            buckets: None,
        }
    }
}

impl SweepGrid {
    /// Grid over `n_min..=n_max` that keeps the config's bucket count, if any.
    pub fn from_config(n_min: usize, n_max: usize, config: &BenchConfig) -> Self {
        Self {
            n_min,
            n_max,
            buckets: config.buckets,
        }
    }

    /// `(T, N, K)` points in sweep order.
    pub fn points(&self) -> Vec<(usize, usize, usize)> {
        let mut points = Vec::new();
        for n in self.n_min..=self.n_max {
            for t in 2..=n {
                points.push((t, n, self.buckets.unwrap_or(n)));
            }
        }
        points
    }
}

/// Run every grid point with `base` as the template, at most `base.workers` at once.
/// Reports come back in grid order.
pub async fn run_sweep(
    corpus: Arc<Corpus>,
    base: &BenchConfig,
    grid: &SweepGrid,
) -> anyhow::Result<Vec<RunReport>> {
    let points = grid.points();
    if points.is_empty() {
        anyhow::bail!("Empty sweep grid: n {}..={}", grid.n_min, grid.n_max);
    }
    info!(points = points.len(), workers = base.workers, "starting sweep");

    let semaphore = Arc::new(Semaphore::new(base.workers.max(1)));
    let mut tasks = JoinSet::new();

    for (index, (threshold, total, buckets)) in points.into_iter().enumerate() {
        let config = BenchConfig {
            threshold,
            total,
            buckets: Some(buckets),
            ..base.clone()
        };
        config.validate()?;
        let corpus = corpus.clone();
        let permit = semaphore.clone().acquire_owned().await?;
        tasks.spawn_blocking(move || {
            let _permit = permit;
            debug!(t = threshold, n = total, k = buckets, "sweep point started");
            driver::run(&corpus, &config).map(|report| (index, report))
        });
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        reports.push(joined??);
    }
    reports.sort_by_key(|(index, _)| *index);
    Ok(reports.into_iter().map(|(_, report)| report).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_covers_all_rates() {
        let grid = SweepGrid {
            n_min: 3,
            n_max: 4,
            buckets: None,
        };
        assert_eq!(
            grid.points(),
            vec![(2, 3, 3), (3, 3, 3), (2, 4, 4), (3, 4, 4), (4, 4, 4)]
        );
    }

    #[test]
    fn fixed_buckets_override() {
        let grid = SweepGrid {
            n_min: 3,
            n_max: 3,
            buckets: Some(5),
        };
        assert!(grid.points().iter().all(|&(_, _, k)| k == 5));
    }

    #[tokio::test]
    async fn sweep_reports_in_grid_order() {
        let file: Vec<u8> = (0..6000u32).map(|i| (i * 13 % 256) as u8).collect();
        let corpus = Arc::new(Corpus::from_buffers(vec![file.clone(), file]));
        let base = BenchConfig {
            workers: 2,
            ..Default::default()
        };
        let grid = SweepGrid {
            n_min: 3,
            n_max: 4,
            buckets: None,
        };
        let reports = run_sweep(corpus, &base, &grid).await.unwrap();
        let rates: Vec<(usize, usize)> = reports.iter().map(|r| (r.threshold, r.total)).collect();
        assert_eq!(rates, vec![(2, 3), (3, 3), (2, 4), (3, 4), (4, 4)]);
        for report in &reports {
            assert_eq!(report.files, 2);
            assert!(report.rate > 0.0);
        }
    }

    #[tokio::test]
    async fn empty_grid_errors() {
        let grid = SweepGrid {
            n_min: 5,
            n_max: 4,
            buckets: None,
        };
        let result = run_sweep(Arc::new(Corpus::default()), &BenchConfig::default(), &grid).await;
        assert!(result.is_err());
    }
}
