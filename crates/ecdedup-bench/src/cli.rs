use crate::config::BenchConfig;
use crate::corpus::Corpus;
use crate::driver;
use crate::report::{print_reports, write_csv};
use crate::sweep::{run_sweep, SweepGrid};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ecdedup_core::{AssignmentPolicy, RoutingUnit};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ecdedup-bench")]
#[command(about = "Deduplication benchmark for erasure-coded shares", long_about = None)]
pub struct Cli {
    #[arg(short, long, env = "ECDEDUP_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub csv: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Run {
        root: Option<PathBuf>,
        #[command(flatten)]
        opts: RunOpts,
    },
    Sweep {
        root: Option<PathBuf>,
        #[arg(long, default_value = "3")]
        n_min: usize,
        #[arg(long, default_value = "8")]
        n_max: usize,
        #[command(flatten)]
        opts: RunOpts,
    },
}

#[derive(Args, Clone, Default)]
pub struct RunOpts {
    #[arg(short = 't', long)]
    pub threshold: Option<usize>,
    #[arg(short = 'n', long)]
    pub total: Option<usize>,
    #[arg(short = 'k', long)]
    pub buckets: Option<usize>,
    #[arg(long)]
    pub piece_length: Option<usize>,
    #[arg(long)]
    pub batch_min: Option<usize>,
    #[arg(long)]
    pub batch_max: Option<usize>,
    #[arg(long)]
    pub policy: Option<AssignmentPolicy>,
    #[arg(long)]
    pub unit: Option<RoutingUnit>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(short, long)]
    pub workers: Option<usize>,
    #[arg(long)]
    pub verify: bool,
}

impl RunOpts {
    /// Overlay command-line values on a loaded config.
    pub fn apply(&self, config: &mut BenchConfig) {
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(total) = self.total {
            config.total = total;
        }
        if let Some(buckets) = self.buckets {
            config.buckets = Some(buckets);
        }
        if let Some(piece_length) = self.piece_length {
            config.piece_length = piece_length;
        }
        if let Some(batch_min) = self.batch_min {
            config.batch_min = batch_min;
        }
        if let Some(batch_max) = self.batch_max {
            config.batch_max = batch_max;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(unit) = self.unit {
            config.unit = unit;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.verify {
            config.verify = true;
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };
        if let Some(csv) = &self.csv {
            config.csv_path = Some(csv.clone());
        }

        let (root, opts) = match &self.command {
            Command::Run { root, opts } | Command::Sweep { root, opts, .. } => (root, opts),
        };
        if let Some(root) = root {
            config.root = root.clone();
        }
        opts.apply(&mut config);
        config.validate()?;

        let root = config.root.clone();
        let corpus = Arc::new(tokio::task::spawn_blocking(move || Corpus::load(&root)).await??);
        if corpus.is_empty() {
            tracing::warn!("No files found under {}", config.root.display());
        }

        let reports = match self.command {
            Command::Run { .. } => {
                let run_corpus = corpus.clone();
                let run_config = config.clone();
                let report =
                    tokio::task::spawn_blocking(move || driver::run(&run_corpus, &run_config))
                        .await??;
                vec![report]
            }
            Command::Sweep { n_min, n_max, .. } => {
                let grid = SweepGrid::from_config(n_min, n_max, &config);
                run_sweep(corpus, &config, &grid).await?
            }
        };

        print_reports(&reports);
        if let Some(path) = &config.csv_path {
            write_csv(path, &reports)?;
        }
        Ok(())
    }
}
