use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

/// Per-key retry state. `not_before` only ever moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
    pub not_before: DateTime<Utc>,
}

/// In-memory retry scheduler, keyed by an entry's stable key.
///
/// Owned exclusively by one root's worker, so no locking. State never
/// survives a restart; the filesystem itself is the only persisted state.
#[derive(Debug)]
pub struct RetryTable {
    ceiling_secs: u64,
    states: HashMap<String, RetryState>,
}

impl RetryTable {
    /// `ceiling_secs` clamps the exponential backoff. The default config
    /// ships 3600 (one hour); raise it for the multi-hour variant.
    pub fn new(ceiling_secs: u64) -> Self {
        Self {
            ceiling_secs: ceiling_secs.max(1),
            states: HashMap::new(),
        }
    }

    /// `2^n` seconds, clamped to the ceiling. Monotone in `n`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let raw = if attempts >= 63 {
            u64::MAX
        } else {
            1u64 << attempts
        };
        Duration::seconds(raw.min(self.ceiling_secs) as i64)
    }

    /// Whether the key may be processed this cycle. First sighting of a key
    /// initializes it as immediately eligible.
    pub fn is_eligible(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let state = self
            .states
            .entry(key.to_string())
            .or_insert_with(|| RetryState {
                attempts: 0,
                not_before: now,
            });
        now >= state.not_before
    }

    /// Record that the key was processed this cycle, regardless of outcome.
    /// Bumps the attempt count and pushes `not_before` forward.
    pub fn record_attempt(&mut self, key: &str, now: DateTime<Utc>) {
        let attempts = {
            let state = self
                .states
                .entry(key.to_string())
                .or_insert_with(|| RetryState {
                    attempts: 0,
                    not_before: now,
                });
            state.attempts += 1;
            state.attempts
        };
        let next = now + self.backoff(attempts);
        let state = self.states.get_mut(key).expect("inserted above");
        if next > state.not_before {
            state.not_before = next;
        }
        trace!(key, attempts, not_before = %state.not_before, "retry state updated");
    }

    /// Drop every key not present in the current scan so the table cannot
    /// grow without bound.
    pub fn purge_missing(&mut self, seen: &HashSet<&str>) {
        self.states.retain(|key, _| seen.contains(key.as_str()));
    }

    pub fn state(&self, key: &str) -> Option<&RetryState> {
        self.states.get(key)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
