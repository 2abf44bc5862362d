//! Heap-runaway watchdog.
//!
//! Samples resident set size every 50 ms and aborts the process the moment
//! it crosses the configured limit. Deliberately fail-fast: at full
//! parallelism a handful of pathological sites can balloon memory faster
//! than any graceful drain could react.

use std::time::Duration;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Start the watchdog thread. `limit_bytes` of 0 means the caller should
/// not have called this; the thread still starts but can never trip.
pub fn spawn(limit_bytes: u64) {
    std::thread::Builder::new()
        .name("heap-watchdog".to_string())
        .spawn(move || {
            loop {
                std::thread::sleep(SAMPLE_INTERVAL);
                if let Some(resident) = resident_bytes()
                    && limit_bytes > 0
                    && resident > limit_bytes
                {
                    tracing::error!(
                        resident_mb = resident / 1024 / 1024,
                        limit_mb = limit_bytes / 1024 / 1024,
                        "memory limit exceeded, aborting"
                    );
                    std::process::abort();
                }
            }
        })
        .expect("failed to spawn watchdog thread");
}

/// Resident set size of this process, from /proc/self/statm.
/// Returns None on platforms without procfs.
fn resident_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * page_size())
}

fn page_size() -> u64 {
    // procfs counts in pages; 4 KiB everywhere this tool is deployed.
    4096
}
