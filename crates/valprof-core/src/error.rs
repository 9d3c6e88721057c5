//! Error types for the counter store.
//!
//! None of these ever reach instrumented code: the recording entry points
//! swallow them and bump a telemetry counter instead.

use thiserror::Error;

/// Failure to hand out a new value record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// Every slot of the backing region is in use.
    #[error("value node arena exhausted ({capacity} slots)")]
    Exhausted { capacity: usize },
}

/// Invalid configuration input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key}: '{raw}' is not a number")]
    InvalidNumber { key: &'static str, raw: String },
    #[error("{key}: {value} outside {min}..={max}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}
