//! ecdedup test & validation suites
//!
//! Property-based checks that span several core modules, plus end-to-end
//! scenarios driving the full encode → fingerprint → match → update path.

pub mod proptest_core;

#[cfg(test)]
mod pipeline_integration;

pub use proptest_core::{arb_data, arb_rate, full_pipeline_score};
