//! # Cross-Transport Forwarding Dedup
//!
//! A bridging controller sits on two physical CI-V buses and one network
//! uplink. The same frame often arrives on both buses; the forwarding cache
//! makes sure only the first copy is relayed.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use super::encoder::encode_hex;
use super::policy::DedupEntry;

/// Default forwarding dedup window
pub const DEFAULT_FORWARD_WINDOW: Duration = Duration::from_millis(1000);

/// Default number of remembered frames
pub const DEFAULT_FORWARD_CAPACITY: usize = 64;

/// Time-windowed, capacity-bounded set of recently forwarded frames
#[derive(Debug, Clone)]
pub struct ForwardCache {
    entries: VecDeque<DedupEntry>,
    window: Duration,
    capacity: usize,
}

impl Default for ForwardCache {
    fn default() -> Self {
        Self::new(DEFAULT_FORWARD_WINDOW, DEFAULT_FORWARD_CAPACITY)
    }
}

impl ForwardCache {
    /// Create an empty cache
    ///
    /// A capacity of zero is raised to one.
    pub fn new(window: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            window,
            capacity,
        }
    }

    /// Look up a frame and record it if unseen
    ///
    /// # Arguments
    ///
    /// * `canonical` - Canonical hex of the frame
    /// * `now` - Arrival time
    ///
    /// # Returns
    ///
    /// `true` if the frame should be forwarded (miss), `false` if an identical
    /// frame was forwarded within the window (hit).
    pub fn check_and_insert(&mut self, canonical: &str, now: Instant) -> bool {
        self.purge(now);

        if self.entries.iter().any(|e| e.canonical == canonical) {
            return false;
        }

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(DedupEntry {
            canonical: canonical.to_string(),
            first_seen: now,
        });
        true
    }

    /// Drop entries older than the window
    fn purge(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.first_seen) > self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of remembered frames
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is remembered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Physical bus a frame arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusId {
    /// First serial bus
    Primary,
    /// Second serial bus
    Secondary,
}

impl BusId {
    /// Bus for a zero-based port index
    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            BusId::Primary
        } else {
            BusId::Secondary
        }
    }

    /// Zero-based index of the bus
    pub fn index(self) -> usize {
        match self {
            BusId::Primary => 0,
            BusId::Secondary => 1,
        }
    }
}

impl std::fmt::Display for BusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusId::Primary => write!(f, "bus1"),
            BusId::Secondary => write!(f, "bus2"),
        }
    }
}

/// Relay from the physical buses to the uplink
#[derive(Debug, Default)]
pub struct Bridge {
    cache: ForwardCache,
    forwarded: u64,
    duplicates: u64,
}

impl Bridge {
    /// Create a bridge with a given cache
    pub fn new(cache: ForwardCache) -> Self {
        Self {
            cache,
            forwarded: 0,
            duplicates: 0,
        }
    }

    /// Decide whether a frame received on a bus goes to the uplink
    ///
    /// # Arguments
    ///
    /// * `bus` - Bus the frame arrived on
    /// * `raw` - Validated frame bytes
    /// * `now` - Arrival time
    ///
    /// # Returns
    ///
    /// Hex text to send on the uplink, or `None` if a sibling bus already
    /// delivered the same frame inside the window.
    pub fn relay_to_uplink(&mut self, bus: BusId, raw: &[u8], now: Instant) -> Option<String> {
        let hex = encode_hex(raw);
        if self.cache.check_and_insert(&hex, now) {
            self.forwarded += 1;
            Some(hex)
        } else {
            self.duplicates += 1;
            debug!("{}: already forwarded, dropping {}", bus, hex);
            None
        }
    }

    /// Remember a frame the bridge itself put on the buses
    ///
    /// The bus echo of that frame then counts as already forwarded and is
    /// not sent back to the uplink.
    pub fn mark_sent(&mut self, raw: &[u8], now: Instant) {
        self.cache.check_and_insert(&encode_hex(raw), now);
    }

    /// Frames relayed so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Frames dropped as already relayed
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Forget cached frames
    pub fn reset(&mut self) {
        self.cache.clear();
    }
}
