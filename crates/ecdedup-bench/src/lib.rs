//! ecdedup benchmark driver
//!
//! Loads a corpus once, runs it through independent `DedupRun`s (one per
//! parameter point) and reports dedup rates on the console and as CSV.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod driver;
pub mod report;
pub mod sweep;

pub use config::BenchConfig;
pub use corpus::{Corpus, CorpusFile};
pub use driver::{run, RunReport};
pub use sweep::{run_sweep, SweepGrid};
