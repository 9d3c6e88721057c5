//! Multi-threaded stress runs against a private store.
//!
//! Every run owns its store and head table, so runs never touch the global
//! store and can execute side by side.

use std::time::Instant;

use serde::Serialize;
use valprof_core::{
    HeadSlot, SiteDescriptor, StatsSnapshot, Store, StoreConfig,
    config::{MAX_VALUES_PER_SITE_LIMIT, NODE_CAPACITY_LIMIT},
};

use crate::error::HarnessError;

const MAX_THREADS: usize = 256;

/// Share of observations drawn from the hot value set, out of 8.
const HOT_EIGHTHS: u64 = 6;

#[derive(Debug, Clone, Serialize)]
pub struct StressConfig {
    pub threads: usize,
    pub sites: usize,
    /// Distinct values drawn per site.
    pub values: u64,
    pub iterations: u64,
    pub nodes: usize,
    pub max_per_site: usize,
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            sites: 16,
            values: 64,
            iterations: 100_000,
            nodes: 1024,
            max_per_site: 16,
            seed: 0x5EED,
        }
    }
}

impl StressConfig {
    pub fn validate(&self) -> Result<(), HarnessError> {
        let invalid = |name: &'static str, reason: String| {
            Err(HarnessError::InvalidArgument { name, reason })
        };
        if self.threads == 0 || self.threads > MAX_THREADS {
            return invalid("threads", format!("{} not in 1..={MAX_THREADS}", self.threads));
        }
        if self.sites == 0 || u32::try_from(self.sites).is_err() {
            return invalid("sites", format!("{} not addressable by a u32 index", self.sites));
        }
        if self.values == 0 {
            return invalid("values", "must be at least 1".to_string());
        }
        if self.nodes == 0 || self.nodes > NODE_CAPACITY_LIMIT {
            return invalid("nodes", format!("{} not in 1..={NODE_CAPACITY_LIMIT}", self.nodes));
        }
        if self.max_per_site == 0 || self.max_per_site > MAX_VALUES_PER_SITE_LIMIT {
            return invalid(
                "max_per_site",
                format!("{} not in 1..={MAX_VALUES_PER_SITE_LIMIT}", self.max_per_site),
            );
        }
        Ok(())
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_node_capacity(self.nodes)
            .with_max_values_per_site(self.max_per_site)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub config: StressConfig,
    /// Observations the driver issued.
    pub issued: u64,
    /// Hits implied by `issued` and the slow-path counters.
    pub hits: u64,
    pub stats: StatsSnapshot,
    pub allocated: usize,
    pub arena_capacity: usize,
    pub max_site_len: usize,
    pub linked_records: usize,
    pub violations: Vec<String>,
    pub duration_ms: u64,
}

impl StressReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift.
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

/// Drive a fresh store with `config.threads` observers, then audit it.
pub fn run_stress(config: &StressConfig) -> Result<StressReport, HarnessError> {
    config.validate()?;

    let store = Store::new(config.store_config());
    let table: Vec<HeadSlot> = (0..config.sites).map(|_| HeadSlot::new()).collect();
    let sites = config.sites as u64;
    // A hot set smaller than the per-site cap should always stay resident.
    let hot = config.values.min((config.max_per_site as u64 / 2).max(1));

    let started = Instant::now();
    std::thread::scope(|scope| {
        for t in 0..config.threads as u64 {
            let store = &store;
            let site = SiteDescriptor::new(&table);
            let seed = config.seed ^ (t + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            scope.spawn(move || {
                let mut rng = XorShift64::new(seed);
                for _ in 0..config.iterations {
                    let index = rng.below(sites) as u32;
                    let value = if rng.below(8) < HOT_EIGHTHS {
                        rng.below(hot)
                    } else {
                        rng.below(config.values)
                    };
                    store.record_target(Some(&site), index, value);
                }
            });
        }
    });
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(audit(config, &store, &table, duration_ms))
}

fn audit(config: &StressConfig, store: &Store, table: &[HeadSlot], duration_ms: u64) -> StressReport {
    let site = SiteDescriptor::new(table);
    let guard = store.lock_export();
    let mut violations = Vec::new();
    let mut linked_records = 0;
    let mut max_site_len = 0;

    for index in 0..config.sites as u32 {
        let records = guard.site_records(&site, index);
        if records.len() > config.max_per_site {
            violations.push(format!(
                "site {index} holds {} records, cap {}",
                records.len(),
                config.max_per_site
            ));
        }
        if let Some(record) = records.iter().find(|r| r.value >= config.values) {
            violations.push(format!("site {index} recorded foreign value {}", record.value));
        }
        max_site_len = max_site_len.max(records.len());
        linked_records += records.len();
    }

    let allocated = guard.allocated();
    drop(guard);
    let arena_capacity = store.arena().capacity();
    if allocated > arena_capacity {
        violations.push(format!("cursor {allocated} past capacity {arena_capacity}"));
    }
    if linked_records != allocated {
        violations.push(format!(
            "{linked_records} linked records for {allocated} allocated slots"
        ));
    }

    let stats = store.stats();
    let issued = config.threads as u64 * config.iterations;
    if stats.slow_path() > issued {
        violations.push(format!(
            "{} slow-path outcomes for {issued} issued observations",
            stats.slow_path()
        ));
    }
    if stats.inserts != allocated as u64 {
        violations.push(format!(
            "{} inserts counted for {allocated} allocated slots",
            stats.inserts
        ));
    }
    if stats.dropped_absent != 0 {
        violations.push(format!("{} observations dropped as absent", stats.dropped_absent));
    }

    StressReport {
        config: config.clone(),
        issued,
        hits: stats.hits_of(issued),
        stats,
        allocated,
        arena_capacity,
        max_site_len,
        linked_records,
        violations,
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StressConfig {
        StressConfig {
            threads: 2,
            sites: 4,
            values: 12,
            iterations: 2_000,
            nodes: 64,
            max_per_site: 4,
            seed: 7,
        }
    }

    #[test]
    fn rejects_out_of_range_arguments() {
        let cases = [
            StressConfig { threads: 0, ..small() },
            StressConfig { sites: 0, ..small() },
            StressConfig { values: 0, ..small() },
            StressConfig { nodes: 0, ..small() },
            StressConfig { nodes: NODE_CAPACITY_LIMIT + 1, ..small() },
            StressConfig { max_per_site: 256, ..small() },
        ];
        for config in cases {
            assert!(matches!(
                run_stress(&config),
                Err(HarnessError::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn small_run_is_clean() {
        let report = run_stress(&small()).unwrap();
        assert!(report.passed(), "{:?}", report.violations);
        assert_eq!(report.issued, 4_000);
        assert_eq!(report.hits + report.stats.slow_path(), 4_000);
        assert!(report.max_site_len <= 4);
        assert_eq!(report.linked_records, report.allocated);
    }

    #[test]
    fn tiny_arena_drops_instead_of_overrunning() {
        let report = run_stress(&StressConfig {
            nodes: 3,
            ..small()
        })
        .unwrap();
        assert!(report.passed(), "{:?}", report.violations);
        assert_eq!(report.allocated, 3);
        assert!(report.stats.dropped_exhausted > 0);
    }

    #[test]
    fn zero_seed_still_generates() {
        let mut rng = XorShift64::new(0);
        assert_ne!(rng.next_u64(), 0);
    }
}
