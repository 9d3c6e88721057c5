//! Stress and inspection tooling for the value-profiling store.
//!
//! This crate provides:
//! - Stress runs: drive a private store from many threads and check the
//!   per-site capacity and arena bounds invariants afterwards
//! - Bucket tables: the memop size buckets as contiguous ranges
//! - Structured JSONL logging and artifact indexes for run evidence

#![forbid(unsafe_code)]

pub mod buckets;
pub mod error;
pub mod stress;
pub mod structured_log;

pub use buckets::{BucketRange, memop_bucket_table};
pub use error::HarnessError;
pub use stress::{StressConfig, StressReport, run_stress};
