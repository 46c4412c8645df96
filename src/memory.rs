//! Memory use reporting, driven by the `dump-memory-profile` and
//! `memory-dump-interval` settings.
//!
//! The `simple` method logs the resident set size at debug level; `none`
//! turns reporting off. Periodic dumps (see
//! [`Context::dump_memory_profile_if_due`](crate::Context::dump_memory_profile_if_due))
//! are kept at least `memory-dump-interval` seconds apart.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMethod {
    Simple,
    None,
}

impl MemoryMethod {
    /// Unrecognized names count as `none`; the choice setting has already
    /// rejected them on the way in.
    pub fn from_setting(name: &str) -> Self {
        match name {
            "simple" => MemoryMethod::Simple,
            _ => MemoryMethod::None,
        }
    }
}

/// Resident set size of this process in KiB. `None` where
/// `/proc/self/status` is not available.
pub fn vmrss_kib() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vmrss(&status)
}

fn parse_vmrss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse().ok())
}

/// When the last dump happened.
#[derive(Debug, Default)]
pub struct MemoryDumps {
    last: Option<Instant>,
}

impl MemoryDumps {
    /// Log memory use, labelled with `msg`. Returns whether anything was
    /// logged.
    pub fn dump(&mut self, method: MemoryMethod, msg: &str, now: Instant) -> bool {
        if method == MemoryMethod::None {
            return false;
        }
        tracing::debug!(%msg, "dumping memory profile");
        match vmrss_kib() {
            Some(kib) => tracing::debug!(vmrss_kib = kib, "resident memory"),
            None => tracing::debug!("resident memory size not available"),
        }
        self.last = Some(now);
        true
    }

    /// Like [`dump`](Self::dump), but skipped when the previous dump was
    /// less than `interval` before `now`.
    pub fn dump_if_due(
        &mut self,
        method: MemoryMethod,
        interval: Duration,
        msg: &str,
        now: Instant,
    ) -> bool {
        if let Some(last) = self.last
            && now.saturating_duration_since(last) < interval
        {
            return false;
        }
        self.dump(method, msg, now)
    }
}
