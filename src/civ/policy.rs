//! # Address & Broadcast Policy
//!
//! Decides whether a validated frame is ours, a broadcast, someone else's
//! traffic, or our own transmission echoed back on the bus, and suppresses
//! repeated broadcasts inside the dedup window.

use std::time::{Duration, Instant};

use tracing::debug;

use super::encoder::encode_hex;
use super::protocol::Frame;
use crate::device::DeviceIdentity;

/// Default broadcast dedup window
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(1000);

/// Address classification of a frame relative to this device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// Addressed to our address
    Ours,
    /// Addressed to every device
    Broadcast,
    /// Addressed to another device
    Foreign,
    /// Sent from our own address
    Echo,
}

/// Classify a frame
///
/// Echo wins over every other class so that a device never answers its own
/// transmissions, whatever the destination.
///
/// # Examples
///
/// ```
/// use shackmate_civ::civ::policy::{classify, AddressClass};
/// use shackmate_civ::civ::protocol::Frame;
/// use shackmate_civ::device::{DeviceIdentity, Role};
///
/// let identity = DeviceIdentity::new(0xB0, Role::Outlet);
/// let frame = Frame::parse(&[0xFE, 0xFE, 0x00, 0xB0, 0x19, 0x00, 0xFD]).unwrap();
/// assert_eq!(classify(&frame, &identity), AddressClass::Echo);
/// ```
pub fn classify(frame: &Frame, identity: &DeviceIdentity) -> AddressClass {
    if frame.from_addr == identity.address {
        AddressClass::Echo
    } else if frame.is_broadcast() {
        AddressClass::Broadcast
    } else if frame.to_addr == identity.address {
        AddressClass::Ours
    } else {
        AddressClass::Foreign
    }
}

/// Canonical text of a frame, independent of how the source formatted it
pub fn canonical_form(frame: &Frame) -> String {
    encode_hex(&frame.to_bytes())
}

/// One remembered frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    /// Canonical hex of the frame
    pub canonical: String,
    /// When the frame was first recorded
    pub first_seen: Instant,
}

/// Single-slot memory of the most recent broadcast
#[derive(Debug, Clone)]
pub struct BroadcastDedup {
    last: Option<DedupEntry>,
    window: Duration,
}

impl BroadcastDedup {
    /// Create an empty dedup slot
    pub fn new(window: Duration) -> Self {
        Self { last: None, window }
    }

    /// Configured window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check a broadcast against the recorded one
    ///
    /// # Arguments
    ///
    /// * `frame` - Broadcast frame
    /// * `now` - Arrival time
    ///
    /// # Returns
    ///
    /// `true` when the frame matches the recorded broadcast and arrived inside
    /// the window. A duplicate leaves the record untouched; anything else
    /// replaces it.
    pub fn is_duplicate(&mut self, frame: &Frame, now: Instant) -> bool {
        let canonical = canonical_form(frame);

        if let Some(entry) = &self.last {
            let elapsed = now.saturating_duration_since(entry.first_seen);
            if entry.canonical == canonical && elapsed < self.window {
                debug!("Duplicate broadcast within {}ms: {}", elapsed.as_millis(), canonical);
                return true;
            }
        }

        self.last = Some(DedupEntry {
            canonical,
            first_seen: now,
        });
        false
    }

    /// Forget the recorded broadcast
    pub fn clear(&mut self) {
        self.last = None;
    }
}

/// Outcome of admitting a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastVerdict {
    /// Process the broadcast
    Accept,
    /// Source is not the management address and the role filters sources
    FilteredSource,
    /// Same broadcast already handled inside the window
    Duplicate,
}

/// Broadcast source filter plus dedup slot
#[derive(Debug, Clone)]
pub struct BroadcastPolicy {
    dedup: BroadcastDedup,
    filter_sources: bool,
}

impl BroadcastPolicy {
    /// Create a policy
    ///
    /// # Arguments
    ///
    /// * `window` - Dedup window
    /// * `filter_sources` - Only answer broadcasts from the management address
    pub fn new(window: Duration, filter_sources: bool) -> Self {
        Self {
            dedup: BroadcastDedup::new(window),
            filter_sources,
        }
    }

    /// Whether broadcasts from non-management sources are dropped
    pub fn filters_sources(&self) -> bool {
        self.filter_sources
    }

    /// Decide what to do with a broadcast frame
    ///
    /// Filtered sources are rejected before the dedup slot is consulted, so
    /// they never displace the recorded broadcast.
    pub fn admit(&mut self, frame: &Frame, identity: &DeviceIdentity, now: Instant) -> BroadcastVerdict {
        if self.filter_sources && frame.from_addr != identity.management_address {
            debug!(
                "Broadcast from 0x{:02X} rejected (only 0x{:02X} accepted)",
                frame.from_addr, identity.management_address
            );
            return BroadcastVerdict::FilteredSource;
        }

        if self.dedup.is_duplicate(frame, now) {
            return BroadcastVerdict::Duplicate;
        }

        BroadcastVerdict::Accept
    }

    /// Forget the recorded broadcast
    pub fn reset(&mut self) {
        self.dedup.clear();
    }
}
