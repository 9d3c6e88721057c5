//! Cardinality reduction ahead of recording.
//!
//! Sites that observe a wide numeric domain (lengths, sizes, loop trip
//! counts) would churn through their K slots. These front ends collapse raw
//! values onto a small set of representative buckets first.

/// Raw sentinel meaning "no large-value bucket configured".
pub const NO_LARGE_VALUE: i64 = i64::MIN;

/// Sizes up to this are tracked exactly by `memop_rep_value`.
pub const MEMOP_EXACT_LIMIT: u64 = 8;

/// Every size at or above this collapses to it.
pub const MEMOP_LAST_BUCKET: u64 = 513;

/// Range bucketing parameters for one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub precise_start: i64,
    pub precise_last: i64,
    pub large_value: Option<i64>,
}

impl RangeSpec {
    #[must_use]
    pub const fn new(precise_start: i64, precise_last: i64, large_value: Option<i64>) -> Self {
        Self {
            precise_start,
            precise_last,
            large_value,
        }
    }

    /// Decode the raw instrumentation arguments, where `NO_LARGE_VALUE`
    /// disables the large bucket.
    #[must_use]
    pub const fn from_raw(precise_start: i64, precise_last: i64, large_value: i64) -> Self {
        let large_value = if large_value == NO_LARGE_VALUE {
            None
        } else {
            Some(large_value)
        };
        Self::new(precise_start, precise_last, large_value)
    }

    /// Bucket used for values outside the precise range.
    #[must_use]
    pub const fn overflow_bucket(&self) -> u64 {
        self.precise_last.wrapping_add(1) as u64
    }

    /// Representative value for `value`, compared as signed.
    #[must_use]
    pub const fn bucket(&self, value: u64) -> u64 {
        let signed = value as i64;
        if let Some(large) = self.large_value {
            if signed >= large {
                return large as u64;
            }
        }
        if signed < self.precise_start || signed > self.precise_last {
            return self.overflow_bucket();
        }
        value
    }
}

/// Representative value of a memory-operation size.
///
/// `0..=8` are exact, `513..` collapse to 513, powers of two are exact and
/// anything else maps to the previous power of two plus one.
#[must_use]
pub const fn memop_rep_value(size: u64) -> u64 {
    if size <= MEMOP_EXACT_LIMIT {
        return size;
    }
    if size >= MEMOP_LAST_BUCKET {
        return MEMOP_LAST_BUCKET;
    }
    if size.count_ones() == 1 {
        return size;
    }
    (1 << highest_set_bit(size)) + 1
}

/// Position of the most significant set bit. `size` must be non-zero.
const fn highest_set_bit(size: u64) -> u32 {
    u64::BITS - size.leading_zeros() - 1
}
