//! Bounded-memory value-profiling counter store.
//!
//! For each instrumentation site the store keeps up to K distinct observed
//! values with approximate counts, drawn from one fixed arena shared by the
//! whole program. Recording never allocates after initialization, never
//! blocks beyond one short critical section, and never reports failure to
//! the instrumented caller. The process-wide store is installed explicitly
//! with `init_global*` before instrumented code runs.

pub mod arena;
pub mod bucket;
pub mod config;
pub mod error;
pub mod site;
pub mod store;
pub mod telemetry;

pub use arena::{AllocCursor, MAX_NODES, NodeArena, NodeLink, ValueNode};
pub use bucket::{NO_LARGE_VALUE, RangeSpec, memop_rep_value};
pub use config::{StoreConfig, StoreMode};
pub use error::{ArenaError, ConfigError};
pub use site::{HeadSlot, Records, SiteDescriptor, ValueList};
pub use store::{
    ExportGuard, Store, ValueRecord, dropped_before_init, global_store, init_global,
    init_global_from_env, init_global_with_region, instrument_memop, instrument_range,
    instrument_target,
};
pub use telemetry::{Outcome, StatsSnapshot, StoreStats};
