use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::utils::{duration_ms, expires_at, now_ms};
use crate::value::CachedValue;

/// State of a tier-local entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Fresh, before its expiration.
    Actual,
    /// Expired and a refresh is in flight.
    Loading,
    /// Expired, no refresh in flight.
    Stale,
    /// No entry for the key.
    NotFound,
}

const ACTUAL: u8 = 0;
const LOADING: u8 = 1;
const STALE: u8 = 2;

impl EntryState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            ACTUAL => EntryState::Actual,
            LOADING => EntryState::Loading,
            _ => EntryState::Stale,
        }
    }
}

/// A cache entry containing a value, its expiration time and its state.
///
/// Past `stale_until` the entry is retired: no longer worth serving stale and
/// removed by the owning tier on the next read.
///
/// The state only moves through atomic compare-and-swap, so the loading lock
/// is scoped to this entry and never blocks:
///
/// ```text
/// Actual --(expired, on read)--> Stale --(try_begin_loading)--> Loading
///    ^                              ^                              |
///    |                              +------(abandon_loading)-------+
///    +----------- a new entry replaces this one on refresh --------+
/// ```
#[derive(Debug)]
pub struct Entry {
    value: CachedValue,
    /// Unix timestamp in milliseconds after which the entry is stale.
    expires_at: i64,
    /// Unix timestamp in milliseconds after which the entry is retired.
    stale_until: i64,
    state: AtomicU8,
}

impl Entry {
    /// Create a fresh entry that expires `ttl` from now and retires with it.
    pub fn new(value: CachedValue, ttl: Duration) -> Self {
        Entry::retained(value, ttl, Duration::ZERO)
    }

    /// Create a fresh entry that expires `ttl` from now and stays servable as
    /// stale for `stale_retention` after that.
    pub fn retained(value: CachedValue, ttl: Duration, stale_retention: Duration) -> Self {
        let expires_at = expires_at(ttl);
        let stale_until = expires_at.saturating_add(duration_ms(stale_retention));
        Entry::with_expiration(value, expires_at, stale_until)
    }

    /// Create a fresh entry with absolute expiration and retirement times (unix millis).
    pub fn with_expiration(value: CachedValue, expires_at: i64, stale_until: i64) -> Self {
        Entry {
            value,
            expires_at,
            stale_until: stale_until.max(expires_at),
            state: AtomicU8::new(ACTUAL),
        }
    }

    pub fn value(&self) -> &CachedValue {
        &self.value
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn stale_until(&self) -> i64 {
        self.stale_until
    }

    /// Whether the entry outlived its stale retention as of `now_ms`.
    ///
    /// An entry under refresh is never retired; the refresh replaces it.
    pub fn is_retired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.stale_until && self.state_at(now_ms) != EntryState::Loading
    }

    /// Current state; marks the entry stale if it expired before `now_ms`.
    pub fn state_at(&self, now_ms: i64) -> EntryState {
        if now_ms >= self.expires_at {
            // Lazy Actual -> Stale. Losing the race means someone else already moved it.
            let _ = self
                .state
                .compare_exchange(ACTUAL, STALE, Ordering::AcqRel, Ordering::Acquire);
        }
        EntryState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Current state as of now.
    pub fn state(&self) -> EntryState {
        self.state_at(now_ms())
    }

    /// Try to take the loading lock (`Stale -> Loading`).
    ///
    /// Returns `false` if the entry is still fresh or another caller holds it.
    pub fn try_begin_loading(&self) -> bool {
        if self.state() != EntryState::Stale {
            return false;
        }
        self.state
            .compare_exchange(STALE, LOADING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the loading lock after a failed refresh (`Loading -> Stale`).
    pub fn abandon_loading(&self) -> bool {
        self.state
            .compare_exchange(LOADING, STALE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
