//! Cache entry states and statistics.

// Author: kelexine (https://github.com/kelexine)

/// Lifecycle of one cache entry.
///
/// `Empty → Fetching → Fresh → Stale → Evicted`. `Evicted` reads exactly like
/// `Empty`: the old value is never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Empty,
    Fetching,
    Fresh,
    Stale,
    Evicted,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Empty => "empty",
            EntryState::Fetching => "fetching",
            EntryState::Fresh => "fresh",
            EntryState::Stale => "stale",
            EntryState::Evicted => "evicted",
        }
    }
}

/// Statistics for cache operations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a fresh entry.
    pub hits: u64,
    /// Reads that started a fetch.
    pub misses: u64,
    /// Reads served a stale value while a background refresh ran.
    pub stale_hits: u64,
    /// Reads that attached to a fetch already in flight.
    pub deduplicated: u64,
    /// Reads skipped because the session could not pass the Auth Gate.
    pub gated: u64,
    pub invalidations: u64,
    pub evictions: u64,
}
