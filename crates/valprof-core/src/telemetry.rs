//! Store telemetry counters.
//!
//! The recording path never reports failures to its caller, so these
//! counters are the only trace of dropped observations. Hits are not
//! counted: the hit path touches nothing but the matched record. All
//! updates are relaxed; a snapshot is a best-effort view.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// What happened to one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Matched an existing record and bumped its count.
    Hit,
    /// Linked a fresh record.
    Inserted,
    /// Site full; the minimum record lost one count but stayed.
    Decayed,
    /// Site full; the minimum record was overwritten by the new value.
    Evicted,
    /// Site descriptor or value table missing, or store disabled.
    DroppedAbsent,
    /// Arena has no free slot.
    DroppedExhausted,
}

/// Relaxed counters for every outcome that leaves the hit path.
#[derive(Debug, Default)]
pub struct StoreStats {
    pub inserts: AtomicU64,
    pub decays: AtomicU64,
    pub evictions: AtomicU64,
    pub dropped_absent: AtomicU64,
    pub dropped_exhausted: AtomicU64,
}

impl StoreStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inserts: AtomicU64::new(0),
            decays: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            dropped_absent: AtomicU64::new(0),
            dropped_exhausted: AtomicU64::new(0),
        }
    }

    /// Count `outcome`. A hit is a no-op.
    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Hit => return,
            Outcome::Inserted => &self.inserts,
            Outcome::Decayed => &self.decays,
            Outcome::Evicted => &self.evictions,
            Outcome::DroppedAbsent => &self.dropped_absent,
            Outcome::DroppedExhausted => &self.dropped_exhausted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            decays: self.decays.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            dropped_absent: self.dropped_absent.load(Ordering::Relaxed),
            dropped_exhausted: self.dropped_exhausted.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.inserts,
            &self.decays,
            &self.evictions,
            &self.dropped_absent,
            &self.dropped_exhausted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of `StoreStats`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub inserts: u64,
    pub decays: u64,
    pub evictions: u64,
    pub dropped_absent: u64,
    pub dropped_exhausted: u64,
}

impl StatsSnapshot {
    /// Observations that left no trace in any list.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped_absent + self.dropped_exhausted
    }

    /// Observations that missed the hit path.
    #[must_use]
    pub const fn slow_path(&self) -> u64 {
        self.inserts + self.decays + self.evictions + self.dropped()
    }

    /// Hits implied by `issued` total observations.
    #[must_use]
    pub const fn hits_of(&self, issued: u64) -> u64 {
        issued.saturating_sub(self.slow_path())
    }
}
