//! Process resource sampling.
//!
//! Reading procfs is blocking, so per-event log lines use the value cached
//! by the last `sample_resident_memory` call instead of reading it each time.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::PROCESS_RESIDENT_MEMORY;

static LAST_RESIDENT_MEMORY: AtomicU64 = AtomicU64::new(0);

/// Resident set size of the current process in bytes.
///
/// Read from `/proc/self/status`; `None` on platforms without procfs.
pub fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

/// Read resident memory now and cache it for `last_resident_memory_bytes`
/// and the `rsx_process_resident_memory_bytes` gauge.
pub fn sample_resident_memory() -> Option<u64> {
    let bytes = resident_memory_bytes()?;
    LAST_RESIDENT_MEMORY.store(bytes, Ordering::Relaxed);
    PROCESS_RESIDENT_MEMORY.set(i64::try_from(bytes).unwrap_or(i64::MAX));
    Some(bytes)
}

/// Resident memory at the last sample; 0 before the first one.
pub fn last_resident_memory_bytes() -> u64 {
    LAST_RESIDENT_MEMORY.load(Ordering::Relaxed)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kib * 1024)
}
