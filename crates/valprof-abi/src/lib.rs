//! C ABI surface of the value-profiling store.
//!
//! The embedder calls `valprof_runtime_init` once before instrumented code
//! runs. Instrumented code then calls the `valprof_instrument_*` symbols with
//! a pointer to its per-function `ValueProfData`. Every entry point swallows
//! failure: a missing store, a null descriptor, a missing head table, an
//! out-of-range index or an exhausted arena all turn the observation into a
//! no-op.
//!
//! The symbols live in their own namespace. `ValueProfData` is not LLVM's
//! `__llvm_profile_data`, so this runtime must not be linked against objects
//! built with `-fprofile-generate`.
#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_int, c_ulong, c_void};

use valprof_core::{
    HeadSlot, SiteDescriptor, global_store, init_global_from_env, instrument_memop,
    instrument_range, instrument_target,
};

/// `prf_lock` flag: the export lock is held and `prf_unlock` must release it.
pub const PRF_LOCKED: c_ulong = 1;

/// Per-function value profiling descriptor laid out by the instrumentation.
///
/// ```c
/// struct valprof_data {
///     const uint32_t *values;   /* num_value_sites head slots, 0 = empty */
///     uint32_t num_value_sites;
/// };
/// ```
///
/// A head slot holds a record link: 0 for an empty list, otherwise the arena
/// index of the first record plus one. The program zero-initializes the
/// table and never writes it afterwards.
#[repr(C)]
#[derive(Debug)]
pub struct ValueProfData {
    pub values: *const HeadSlot,
    pub num_value_sites: u32,
}

/// Borrow the site behind `data`.
///
/// # Safety
///
/// `data` is null or points at a live `ValueProfData` whose `values` is null
/// or valid for `num_value_sites` slots for the lifetime `'a`.
unsafe fn site_from_raw<'a>(data: *const c_void) -> Option<SiteDescriptor<'a>> {
    // SAFETY: caller contract; null yields None.
    let data = unsafe { data.cast::<ValueProfData>().as_ref() }?;
    if data.values.is_null() {
        return Some(SiteDescriptor::uninitialized());
    }
    // SAFETY: caller contract on `values` / `num_value_sites`.
    let table = unsafe { std::slice::from_raw_parts(data.values, data.num_value_sites as usize) };
    Some(SiteDescriptor::new(table))
}

/// Record `target_value` at value site `index` of `data`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn valprof_instrument_target(
    target_value: u64,
    data: *mut c_void,
    index: u32,
) {
    // SAFETY: the instrumentation passes its own descriptor or null.
    let site = unsafe { site_from_raw(data.cast_const()) };
    instrument_target(site.as_ref(), index, target_value);
}

/// Record `target_value` after range bucketing. `large_value == i64::MIN`
/// disables the large-value bucket.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn valprof_instrument_range(
    target_value: u64,
    data: *mut c_void,
    index: u32,
    precise_start: i64,
    precise_last: i64,
    large_value: i64,
) {
    // SAFETY: the instrumentation passes its own descriptor or null.
    let site = unsafe { site_from_raw(data.cast_const()) };
    instrument_range(
        site.as_ref(),
        index,
        target_value,
        precise_start,
        precise_last,
        large_value,
    );
}

/// Record a memory-operation size after power-of-two bucketing.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn valprof_instrument_memop(
    target_value: u64,
    data: *mut c_void,
    index: u32,
) {
    // SAFETY: the instrumentation passes its own descriptor or null.
    let site = unsafe { site_from_raw(data.cast_const()) };
    instrument_memop(site.as_ref(), index, target_value);
}

/// Install the process-wide store from `VALPROF_*` environment variables.
///
/// Returns 0 once a store is installed, -1 while another installation is
/// still running. Observations made before a store exists are dropped.
#[unsafe(no_mangle)]
pub extern "C" fn valprof_runtime_init() -> c_int {
    match init_global_from_env() {
        Some(_) => 0,
        None => -1,
    }
}

/// Take the store-wide allocation lock for a serializer. Returns a flags word
/// to hand back to `prf_unlock`: `PRF_LOCKED`, or 0 when no store is
/// installed and nothing was locked.
#[unsafe(no_mangle)]
pub extern "C" fn prf_lock() -> c_ulong {
    match global_store() {
        Some(store) => {
            store.lock_raw();
            PRF_LOCKED
        }
        None => 0,
    }
}

/// Release the lock taken by `prf_lock`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn prf_unlock(flags: c_ulong) {
    if flags != PRF_LOCKED {
        return;
    }
    if let Some(store) = global_store() {
        // SAFETY: `PRF_LOCKED` is only returned after `lock_raw` on the
        // installed store, which is never replaced.
        unsafe { store.unlock_raw() };
    }
}
