//! Denial Tracker: per-tool exponential backoff against approval-fatigue
//! abuse. Elapsed time is measured against `Instant`, never wall-clock
//! time, so a system clock change can't be used to dodge the backoff.

use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

/// denials -> backoff duration. Index 0/1 (1-2 denials) carry no backoff;
/// index 2 (3 denials) is 5s, and so on.
const BACKOFF_SCHEDULE_SECS: &[u64] = &[0, 0, 5, 15, 60];
const BACKOFF_CEILING_SECS: u64 = 300;

fn backoff_for_count(count: u32) -> Duration {
    let idx = count.saturating_sub(1) as usize;
    let secs = BACKOFF_SCHEDULE_SECS.get(idx).copied().unwrap_or(BACKOFF_CEILING_SECS);
    Duration::from_secs(secs)
}

struct DenialCounter {
    consecutive_denials: u32,
    backoff_until: Option<Instant>,
}

#[derive(Default)]
pub struct DenialTracker {
    counters: HashMap<String, DenialCounter>,
}

impl DenialTracker {
    pub fn new() -> Self {
        DenialTracker::default()
    }

    /// `true` iff `now < backoff_until` for this tool.
    pub fn is_rate_limited(&self, tool: &str) -> bool {
        self.remaining_backoff(tool).is_some()
    }

    /// Seconds remaining in the current backoff window, if any. Rounds up
    /// so the reported `retry_after` never undershoots the real wait.
    pub fn remaining_backoff(&self, tool: &str) -> Option<u64> {
        let counter = self.counters.get(tool)?;
        let until = counter.backoff_until?;
        let now = Instant::now();
        if now >= until {
            return None;
        }
        let remaining = until - now;
        Some(remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0))
    }

    /// Increments the denial count and sets the new backoff deadline.
    pub fn record_denial(&mut self, tool: &str) {
        let counter = self.counters.entry(tool.to_string()).or_insert(DenialCounter {
            consecutive_denials: 0,
            backoff_until: None,
        });
        counter.consecutive_denials += 1;
        let backoff = backoff_for_count(counter.consecutive_denials);
        counter.backoff_until = if backoff.is_zero() {
            None
        } else {
            Some(Instant::now() + backoff)
        };
    }

    /// Called on any approval, or at batch-session end.
    pub fn reset(&mut self, tool: &str) {
        self.counters.remove(tool);
    }
}
