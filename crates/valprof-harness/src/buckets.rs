//! Memop bucket table.

use serde::Serialize;
use valprof_core::bucket::MEMOP_LAST_BUCKET;
use valprof_core::memop_rep_value;

/// Sizes `first..=last` all share representative `rep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketRange {
    pub first: u64,
    pub last: u64,
    pub rep: u64,
}

/// Collapse sizes `0..=max` into runs with the same representative value.
///
/// Every size from `MEMOP_LAST_BUCKET` up shares one bucket, so only the
/// sizes below it are walked.
#[must_use]
pub fn memop_bucket_table(max: u64) -> Vec<BucketRange> {
    let mut table: Vec<BucketRange> = Vec::new();
    for size in 0..=max.min(MEMOP_LAST_BUCKET) {
        let rep = memop_rep_value(size);
        match table.last_mut() {
            Some(range) if range.rep == rep => range.last = size,
            _ => table.push(BucketRange {
                first: size,
                last: size,
                rep,
            }),
        }
    }
    if let Some(last) = table.last_mut() {
        last.last = max;
    }
    table
}
