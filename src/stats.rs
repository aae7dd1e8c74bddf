//! # Statistics Module
//!
//! Counters for every outcome of the decode → policy → process pipeline,
//! and timestamped JSON snapshots for periodic reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{FrameErrorKind, Result};

/// Running counters of the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Decode results seen (valid or not)
    pub frames_total: u64,
    /// Frames that passed validation
    pub frames_valid: u64,
    /// Length, preamble or terminator failures
    pub structural_invalid: u64,
    /// Frames with an embedded preamble
    pub corrupted: u64,
    /// Buffers discarded for lack of a terminator
    pub overflows: u64,
    /// Network messages that were not valid hex
    pub hex_rejected: u64,
    /// Our own transmissions seen on the bus
    pub echoes_ignored: u64,
    /// Frames addressed to another device
    pub unaddressed: u64,
    /// Broadcast frames seen
    pub broadcasts: u64,
    /// Broadcasts from a non-management source
    pub broadcasts_filtered: u64,
    /// Broadcasts suppressed inside the dedup window
    pub duplicate_broadcasts: u64,
    /// Replies handed to the transport
    pub replies: u64,
    /// Replies that were NAKs
    pub naks: u64,
    /// Replies dropped by the outbound budget
    pub rate_limited: u64,
    /// Frames relayed to the uplink
    pub forwarded: u64,
    /// Frames not relayed because a sibling bus delivered them first
    pub forward_duplicates: u64,
    /// Failed persistence callbacks
    pub persistence_failures: u64,
}

impl EngineStats {
    /// Count a rejected decode
    pub fn record_frame_error(&mut self, kind: FrameErrorKind) {
        match kind {
            FrameErrorKind::StructuralInvalid => self.structural_invalid += 1,
            FrameErrorKind::Corrupted => self.corrupted += 1,
            FrameErrorKind::Overflow => self.overflows += 1,
        }
    }

    /// Frames dropped for any decode reason
    pub fn frames_dropped(&self) -> u64 {
        self.structural_invalid + self.corrupted + self.overflows
    }
}

/// Counters captured at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Device address in hex, e.g. "B0"
    pub device: String,
    /// Role name
    pub role: String,
    /// Counter values
    #[serde(flatten)]
    pub stats: EngineStats,
}

impl StatsSnapshot {
    /// Capture the counters now
    pub fn capture(address: u8, role: impl ToString, stats: &EngineStats) -> Self {
        Self {
            timestamp: Utc::now(),
            device: format!("{:02X}", address),
            role: role.to_string(),
            stats: stats.clone(),
        }
    }

    /// Serialize as a single JSON line
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CivError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
