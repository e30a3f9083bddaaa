//! Normalizes raw cumulative runtime counters into usage metrics.
//!
//! CPU usage is a delta computation over two consecutive samples:
//!
//! ```text
//! cpu% = (cpu_delta / system_delta) * online_cpus * 100
//! ```
//!
//! Both functions are pure and total: any absent counter or non-positive delta
//! yields 0 rather than an error, which avoids spurious spikes or negative
//! readings when a stream restarts and the counter history is lost.

use crate::runtime::RawStatsSample;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Computes the CPU usage percentage from two consecutive raw samples.
///
/// Returns 0.0 until a second sample is available, or whenever either delta is
/// non-positive. The result is clamped to `[0, 100 * online_cpus]`;
/// `online_cpus` defaults to 1 if the runtime does not report it.
pub fn cpu_percent(prev: Option<&RawStatsSample>, cur: &RawStatsSample) -> f64 {
    let Some(prev) = prev else { return 0.0 };
    let (Some(prev_cpu), Some(prev_system)) = (prev.cpu_usage_ns, prev.system_usage_ns) else {
        return 0.0;
    };
    let (Some(cur_cpu), Some(cur_system)) = (cur.cpu_usage_ns, cur.system_usage_ns) else {
        return 0.0;
    };

    if cur_cpu <= prev_cpu || cur_system <= prev_system {
        return 0.0;
    }

    let cpu_delta = (cur_cpu - prev_cpu) as f64;
    let system_delta = (cur_system - prev_system) as f64;
    let online_cpus = cur.online_cpus.unwrap_or(1) as f64;

    ((cpu_delta / system_delta) * online_cpus * 100.0).min(online_cpus * 100.0)
}

/// Current memory usage in whole megabytes, or 0 if the runtime did not report
/// memory statistics.
pub fn memory_mb(cur: &RawStatsSample) -> u64 {
    cur.memory_usage_bytes.unwrap_or(0) / BYTES_PER_MB
}
