use ecdedup_core::{AssignmentPolicy, ErasureParams, RoutingUnit, RunConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub root: PathBuf,
    pub threshold: usize,
    pub total: usize,
    /// Bucket count `K`; unset means `K = N`.
    pub buckets: Option<usize>,
    pub piece_length: usize,
    pub batch_min: usize,
    pub batch_max: usize,
    pub policy: AssignmentPolicy,
    pub unit: RoutingUnit,
    pub seed: u64,
    pub workers: usize,
    pub verify: bool,
    pub csv_path: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            threshold: 2,
            total: 3,
            buckets: None,
            piece_length: 1024,
            batch_min: 1,
            batch_max: 1,
            policy: AssignmentPolicy::Optimal,
            unit: RoutingUnit::Share,
            seed: 42,
            workers: 4,
            verify: false,
            csv_path: None,
        }
    }
}

impl BenchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: BenchConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: BenchConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_min == 0 || self.batch_min > self.batch_max {
            anyhow::bail!(
                "Invalid batch range: {}..={}",
                self.batch_min,
                self.batch_max
            );
        }
        if self.workers == 0 {
            anyhow::bail!("Worker count must be positive");
        }
        self.run_config()?;
        Ok(())
    }

    /// Effective `K`.
    pub fn bucket_count(&self) -> usize {
        self.buckets.unwrap_or(self.total)
    }

    /// Core run parameters for this configuration.
    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let erasure = ErasureParams::new(self.threshold, self.total)?;
        if self.buckets == Some(0) {
            anyhow::bail!("Bucket count must be positive");
        }
        if self.piece_length == 0 {
            anyhow::bail!("Piece length must be positive");
        }
        Ok(RunConfig {
            erasure,
            buckets: self.bucket_count(),
            piece_length: self.piece_length,
            policy: self.policy,
            unit: self.unit,
            verify_reconstruction: self.verify,
        })
    }
}
