//! The value-profiling counter store.
//!
//! Hot path per observation:
//! 1. Resolve the site's head slot; a missing table drops the observation.
//! 2. Scan the list. A match bumps its count with no lock held.
//! 3. A full list decays its first minimum-count record, and evicts it only
//!    once that count is already zero.
//! 4. Otherwise take the allocation lock, re-walk the list, allocate a slot,
//!    initialize it and link it at the tail.
//!
//! Only step 4 is serialized. Count updates elsewhere are relaxed
//! load/store pairs and may lose increments under contention.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::arena::{AllocCursor, NodeArena, ValueNode};
use crate::bucket::{RangeSpec, memop_rep_value};
use crate::config::{StoreConfig, StoreMode};
use crate::site::{HeadSlot, Scan, SiteDescriptor, ValueList};
use crate::telemetry::{Outcome, StatsSnapshot, StoreStats};

/// `(value, count)` pair as seen by readers of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRecord {
    pub value: u64,
    pub count: u64,
}

impl From<&ValueNode> for ValueRecord {
    fn from(node: &ValueNode) -> Self {
        Self {
            value: node.value(),
            count: node.count(),
        }
    }
}

/// Process-lifetime owner of the arena and the allocation lock.
#[derive(Debug)]
pub struct Store {
    arena: NodeArena,
    /// The store-wide allocation lock. Guards the cursor and every change
    /// to list topology.
    cursor: Mutex<AllocCursor>,
    max_values_per_site: usize,
    mode: StoreMode,
    stats: StoreStats,
}

impl Store {
    /// Reserve an owned arena sized by `config`.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self::with_arena(config, NodeArena::with_capacity(config.node_capacity))
    }

    /// Use a caller-provided region; `config.node_capacity` is ignored.
    #[must_use]
    pub fn with_region(config: StoreConfig, region: &'static [ValueNode]) -> Self {
        Self::with_arena(config, NodeArena::from_region(region))
    }

    fn with_arena(config: StoreConfig, arena: NodeArena) -> Self {
        let config = config.with_max_values_per_site(config.max_values_per_site);
        Self {
            arena,
            cursor: Mutex::new(AllocCursor::new()),
            max_values_per_site: config.max_values_per_site,
            mode: config.mode,
            stats: StoreStats::new(),
        }
    }

    #[must_use]
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    #[must_use]
    pub const fn max_values_per_site(&self) -> usize {
        self.max_values_per_site
    }

    #[must_use]
    pub const fn mode(&self) -> StoreMode {
        self.mode
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Arena slots handed out so far. Takes the allocation lock.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.cursor.lock().allocated()
    }

    /// Record `value` at `(site, index)`. Never fails from the caller's view.
    pub fn record_target(&self, site: Option<&SiteDescriptor<'_>>, index: u32, value: u64) {
        let _ = self.observe(site, index, value);
    }

    /// Record `value` after range bucketing.
    pub fn record_range(
        &self,
        site: Option<&SiteDescriptor<'_>>,
        index: u32,
        value: u64,
        range: RangeSpec,
    ) {
        self.record_target(site, index, range.bucket(value));
    }

    /// Record a memory-operation size after power-of-two bucketing.
    pub fn record_memop(&self, site: Option<&SiteDescriptor<'_>>, index: u32, size: u64) {
        self.record_target(site, index, memop_rep_value(size));
    }

    /// Same as `record_target`, reporting what happened.
    ///
    /// A disabled store returns `DroppedAbsent` without touching any counter.
    pub fn observe(&self, site: Option<&SiteDescriptor<'_>>, index: u32, value: u64) -> Outcome {
        if !self.mode.records() {
            return Outcome::DroppedAbsent;
        }
        let outcome = self.update(site, index, value);
        self.stats.record(outcome);
        outcome
    }

    fn update(&self, site: Option<&SiteDescriptor<'_>>, index: u32, value: u64) -> Outcome {
        let Some(head) = site.and_then(|site| site.head(index)) else {
            return Outcome::DroppedAbsent;
        };
        let list = ValueList::new(&self.arena, head);

        match list.scan(value) {
            Scan::Hit(node) => {
                node.bump();
                Outcome::Hit
            }
            Scan::Miss { len, min, .. } if len >= self.max_values_per_site => {
                decay_or_evict(min, value)
            }
            Scan::Miss { .. } => self.insert(&list, value),
        }
    }

    fn insert(&self, list: &ValueList<'_>, value: u64) -> Outcome {
        let mut cursor = self.cursor.lock();

        // Another thread may have linked this value or filled the site while
        // we waited.
        let tail = match list.scan(value) {
            Scan::Hit(node) => {
                node.bump();
                return Outcome::Hit;
            }
            Scan::Miss { len, min, .. } if len >= self.max_values_per_site => {
                return decay_or_evict(min, value);
            }
            Scan::Miss { tail, .. } => tail,
        };

        let Ok(link) = cursor.allocate_next(&self.arena) else {
            return Outcome::DroppedExhausted;
        };
        let Some(node) = self.arena.get(link) else {
            return Outcome::DroppedExhausted;
        };
        node.clear();
        node.install(value, 1);
        list.append(tail, link);
        Outcome::Inserted
    }

    /// Records at `(site, index)` in insertion order, read without the lock.
    #[must_use]
    pub fn site_records(&self, site: &SiteDescriptor<'_>, index: u32) -> Vec<ValueRecord> {
        site.head(index)
            .map(|head| collect_records(&self.arena, head))
            .unwrap_or_default()
    }

    /// Hold the allocation lock so list topology stays fixed while a
    /// serializer walks the sites.
    pub fn lock_export(&self) -> ExportGuard<'_> {
        ExportGuard {
            arena: &self.arena,
            cursor: self.cursor.lock(),
        }
    }

    /// Take the allocation lock without a guard, for callers across an FFI
    /// boundary. Must be paired with `unlock_raw`.
    pub fn lock_raw(&self) {
        std::mem::forget(self.cursor.lock());
    }

    /// Release a lock taken by `lock_raw`.
    ///
    /// # Safety
    ///
    /// The lock must currently be held through a prior `lock_raw` call whose
    /// guard has not been released yet.
    pub unsafe fn unlock_raw(&self) {
        // SAFETY: caller guarantees the lock is held by a forgotten guard.
        unsafe { self.cursor.force_unlock() };
    }

    /// Start a fresh profiling round.
    ///
    /// Clears every head in `tables`, zeroes all arena records, rewinds the
    /// allocation cursor and the telemetry. `tables` must cover every site
    /// that recorded into this store; a head left out would keep pointing at
    /// recycled records.
    pub fn reset<'t, I>(&self, tables: I)
    where
        I: IntoIterator<Item = &'t [HeadSlot]>,
    {
        let mut cursor = self.cursor.lock();
        for table in tables {
            for head in table {
                head.clear();
            }
        }
        self.arena.clear_all();
        cursor.rewind();
        self.stats.reset();
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Full list: lose one count on the minimum record, or replace it when its
/// count has already reached zero.
fn decay_or_evict(min: Option<&ValueNode>, value: u64) -> Outcome {
    let Some(min) = min else {
        return Outcome::DroppedAbsent;
    };
    match min.count() {
        0 => {
            min.install(value, 1);
            Outcome::Evicted
        }
        count => {
            min.set_count(count - 1);
            Outcome::Decayed
        }
    }
}

fn collect_records(arena: &NodeArena, head: &HeadSlot) -> Vec<ValueRecord> {
    ValueList::new(arena, head)
        .records()
        .map(ValueRecord::from)
        .collect()
}

/// Allocation lock held for export.
pub struct ExportGuard<'a> {
    arena: &'a NodeArena,
    cursor: MutexGuard<'a, AllocCursor>,
}

impl ExportGuard<'_> {
    #[must_use]
    pub fn site_records(&self, site: &SiteDescriptor<'_>, index: u32) -> Vec<ValueRecord> {
        site.head(index)
            .map(|head| collect_records(self.arena, head))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn allocated(&self) -> usize {
        self.cursor.allocated()
    }
}

// Install state: 0=uninstalled, 1=ready, 255=installing.
// Installation builds the store before publishing it, and recording only ever
// reads the published store. An observation made while the arena is being
// reserved (an instrumented allocator, say) is dropped instead of re-entering
// the installer.
static GLOBAL_STORE: OnceLock<Store> = OnceLock::new();
static GLOBAL_STATE: AtomicU8 = AtomicU8::new(GLOBAL_UNINSTALLED);
static DROPPED_BEFORE_INIT: AtomicU64 = AtomicU64::new(0);

const GLOBAL_UNINSTALLED: u8 = 0;
const GLOBAL_READY: u8 = 1;
const GLOBAL_INSTALLING: u8 = 255;

fn install_global(build: impl FnOnce() -> Store) -> Option<&'static Store> {
    match GLOBAL_STATE.compare_exchange(
        GLOBAL_UNINSTALLED,
        GLOBAL_INSTALLING,
        Ordering::SeqCst,
        Ordering::Acquire,
    ) {
        Ok(_) => {}
        Err(GLOBAL_READY) => return GLOBAL_STORE.get(),
        // Another installer (or this one, re-entered) is still running.
        Err(_) => return None,
    }
    let store = build();
    let _ = GLOBAL_STORE.set(store);
    GLOBAL_STATE.store(GLOBAL_READY, Ordering::Release);
    GLOBAL_STORE.get()
}

/// Install the process-wide store with an owned arena sized by `config`.
///
/// Call once before instrumented code runs. Returns the installed store, the
/// one installed earlier, or `None` while another installation is underway.
pub fn init_global(config: StoreConfig) -> Option<&'static Store> {
    install_global(|| Store::new(config))
}

/// Install the process-wide store over a caller-provided region.
pub fn init_global_with_region(
    config: StoreConfig,
    region: &'static [ValueNode],
) -> Option<&'static Store> {
    install_global(|| Store::with_region(config, region))
}

/// Install the process-wide store from the environment. Invalid
/// configuration falls back to defaults.
pub fn init_global_from_env() -> Option<&'static Store> {
    init_global(StoreConfig::from_env().unwrap_or_default())
}

/// The installed process-wide store, if any. Never blocks or allocates.
#[must_use]
pub fn global_store() -> Option<&'static Store> {
    GLOBAL_STORE.get()
}

/// Observations the free recording functions dropped because no store was
/// installed yet.
#[must_use]
pub fn dropped_before_init() -> u64 {
    DROPPED_BEFORE_INIT.load(Ordering::Relaxed)
}

fn with_global(record: impl FnOnce(&Store)) {
    match GLOBAL_STORE.get() {
        Some(store) => record(store),
        None => {
            DROPPED_BEFORE_INIT.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Record `value` at `(site, index)` in the process-wide store.
pub fn instrument_target(site: Option<&SiteDescriptor<'_>>, index: u32, value: u64) {
    with_global(|store| store.record_target(site, index, value));
}

/// Range-bucketed variant of `instrument_target`.
pub fn instrument_range(
    site: Option<&SiteDescriptor<'_>>,
    index: u32,
    value: u64,
    precise_start: i64,
    precise_last: i64,
    large_value: i64,
) {
    let range = RangeSpec::from_raw(precise_start, precise_last, large_value);
    with_global(|store| store.record_range(site, index, value, range));
}

/// Size-bucketed variant of `instrument_target`.
pub fn instrument_memop(site: Option<&SiteDescriptor<'_>>, index: u32, size: u64) {
    with_global(|store| store.record_memop(site, index, size));
}
