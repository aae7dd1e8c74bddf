//! # CI-V Engine
//!
//! Owns everything one device needs to answer on the bus: identity, state,
//! broadcast policy, command processor, reply budget and counters.
//!
//! The engine performs no I/O. Transports push decode results, raw frames or
//! hex text in, and get the encoded reply (if any) back.
//!
//! # Examples
//!
//! ```
//! use std::time::Instant;
//! use shackmate_civ::device::{DeviceIdentity, DeviceState, LoggingHooks, Role};
//! use shackmate_civ::engine::{CivEngine, EngineSettings};
//!
//! let identity = DeviceIdentity::new(0xB0, Role::Outlet);
//! let mut engine = CivEngine::new(
//!     identity,
//!     DeviceState::default(),
//!     EngineSettings::for_role(Role::Outlet),
//!     LoggingHooks,
//! );
//!
//! let reply = engine.handle_hex("FE FE 00 EE 19 00 FD", Instant::now());
//! assert_eq!(reply.as_deref(), Some("FE FE EE B0 19 00 B0 FD"));
//! ```

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::civ::encoder::{decode_hex, encode_hex};
use crate::civ::forward::{Bridge, BusId, ForwardCache, DEFAULT_FORWARD_CAPACITY, DEFAULT_FORWARD_WINDOW};
use crate::civ::policy::{classify, AddressClass, BroadcastPolicy, BroadcastVerdict, DEFAULT_DEDUP_WINDOW};
use crate::civ::protocol::{Frame, DEFAULT_MAX_FRAME_LEN};
use crate::civ::rate_limiter::RateLimiter;
use crate::device::processor::{CommandProcessor, ReplyKind};
use crate::device::{DeviceHooks, DeviceIdentity, DeviceState, Role, UnknownCommandPolicy};
use crate::error::FrameError;
use crate::stats::{EngineStats, StatsSnapshot};

/// Tunables of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Broadcast dedup window
    pub dedup_window: Duration,
    /// Outbound reply budget per second
    pub max_replies_per_second: u32,
    /// Only answer broadcasts from the management address
    pub broadcast_filtering: bool,
    /// Handling of unimplemented commands
    pub unknown_command: UnknownCommandPolicy,
    /// Longest accepted frame
    pub max_frame_len: usize,
    /// Forwarding dedup window (bridging roles)
    pub forward_window: Duration,
    /// Forwarding dedup capacity (bridging roles)
    pub forward_capacity: usize,
}

impl EngineSettings {
    /// Defaults for a role
    pub fn for_role(role: Role) -> Self {
        Self {
            dedup_window: DEFAULT_DEDUP_WINDOW,
            max_replies_per_second: role.default_rate_limit(),
            broadcast_filtering: role.filters_broadcast_sources(),
            unknown_command: role.default_unknown_command(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            forward_window: DEFAULT_FORWARD_WINDOW,
            forward_capacity: DEFAULT_FORWARD_CAPACITY,
        }
    }
}

/// Decode → classify → process → budget pipeline for one device
pub struct CivEngine<H: DeviceHooks> {
    identity: DeviceIdentity,
    state: DeviceState,
    settings: EngineSettings,
    processor: CommandProcessor,
    broadcast: BroadcastPolicy,
    limiter: RateLimiter,
    bridge: Option<Bridge>,
    stats: EngineStats,
    hooks: H,
}

impl<H: DeviceHooks> CivEngine<H> {
    /// Create an engine
    ///
    /// # Arguments
    ///
    /// * `identity` - Our address, role and management address
    /// * `state` - Initial device state (usually restored from persistence)
    /// * `settings` - Windows, budgets and policies
    /// * `hooks` - Host callbacks
    pub fn new(identity: DeviceIdentity, state: DeviceState, settings: EngineSettings, hooks: H) -> Self {
        let bridge = bridge_for(identity.role, &settings);

        info!(
            "CI-V engine ready: address 0x{:02X}, role {}, {} replies/s",
            identity.address, identity.role, settings.max_replies_per_second
        );

        Self {
            identity,
            state,
            processor: CommandProcessor::new(settings.unknown_command),
            broadcast: BroadcastPolicy::new(settings.dedup_window, settings.broadcast_filtering),
            limiter: RateLimiter::new(settings.max_replies_per_second),
            bridge,
            stats: EngineStats::default(),
            settings,
            hooks,
        }
    }

    /// Current identity
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Current device state
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Settings in effect
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Counters so far
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Timestamped copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::capture(self.identity.address, self.identity.role, &self.stats)
    }

    /// Host callbacks
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Mutable host callbacks
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Replace the identity and settings (device renumbering or role change)
    ///
    /// Everything derived from the old identity starts over: the broadcast
    /// dedup slot and source filter, the reply budget and the unknown-command
    /// policy. A bridging role keeps its forwarding cache while the
    /// forwarding settings stay the same; other roles drop it.
    ///
    /// # Errors
    ///
    /// Returns [`CivError::InvalidIdentity`](crate::error::CivError::InvalidIdentity)
    /// if the new identity cannot be used on the bus. The engine is left
    /// unchanged in that case.
    pub fn reconfigure(&mut self, identity: DeviceIdentity, settings: EngineSettings) -> crate::error::Result<()> {
        identity.validate()?;

        info!(
            "Reconfigured: address 0x{:02X} -> 0x{:02X}, role {} -> {}, {} replies/s",
            self.identity.address,
            identity.address,
            self.identity.role,
            identity.role,
            settings.max_replies_per_second
        );

        let keep_bridge = identity.role.is_bridge()
            && self.bridge.is_some()
            && settings.forward_window == self.settings.forward_window
            && settings.forward_capacity == self.settings.forward_capacity;
        if !keep_bridge {
            self.bridge = bridge_for(identity.role, &settings);
        }

        self.processor = CommandProcessor::new(settings.unknown_command);
        self.broadcast = BroadcastPolicy::new(settings.dedup_window, settings.broadcast_filtering);
        self.limiter = RateLimiter::new(settings.max_replies_per_second);
        self.identity = identity;
        self.settings = settings;
        Ok(())
    }

    /// Update the address reported by 0x19 01
    pub fn set_network_address(&mut self, address: Ipv4Addr) {
        debug!("Network address now {}", address);
        self.state.network_address = address;
    }

    /// Handle one result from a streaming decoder
    ///
    /// # Returns
    ///
    /// Reply bytes to send, or `None`.
    pub fn handle_decoded(&mut self, decoded: Result<Frame, FrameError>, now: Instant) -> Option<Vec<u8>> {
        match decoded {
            Ok(frame) => self.handle_frame(&frame, now),
            Err(e) => {
                self.stats.frames_total += 1;
                self.stats.record_frame_error(e.kind());
                debug!("Frame dropped: {}", e);
                None
            }
        }
    }

    /// Handle one complete raw frame from a message-oriented source
    pub fn handle_bytes(&mut self, bytes: &[u8], now: Instant) -> Option<Vec<u8>> {
        let decoded = if bytes.len() > self.settings.max_frame_len {
            Err(FrameError::TooLong {
                len: bytes.len(),
                max: self.settings.max_frame_len,
            })
        } else {
            Frame::parse(bytes)
        };
        self.handle_decoded(decoded, now)
    }

    /// Handle one hex text message from the network transport
    ///
    /// # Arguments
    ///
    /// * `text` - Hex text, any case, any whitespace
    /// * `now` - Arrival time
    ///
    /// # Returns
    ///
    /// The reply as uppercase space-separated hex, or `None`.
    pub fn handle_hex(&mut self, text: &str, now: Instant) -> Option<String> {
        match decode_hex(text, self.settings.max_frame_len) {
            Ok(bytes) => self.handle_bytes(&bytes, now).map(|reply| encode_hex(&reply)),
            Err(e) => {
                self.stats.hex_rejected += 1;
                debug!("Uplink message rejected: {}", e);
                None
            }
        }
    }

    /// Handle one validated frame
    pub fn handle_frame(&mut self, frame: &Frame, now: Instant) -> Option<Vec<u8>> {
        self.stats.frames_total += 1;
        self.stats.frames_valid += 1;

        let class = classify(frame, &self.identity);
        match class {
            AddressClass::Echo => {
                self.stats.echoes_ignored += 1;
                debug!("Ignoring our own echo (cmd 0x{:02X})", frame.command);
                return None;
            }
            AddressClass::Foreign => {
                self.stats.unaddressed += 1;
                debug!("Frame for 0x{:02X} is not ours", frame.to_addr);
                return None;
            }
            AddressClass::Broadcast => {
                self.stats.broadcasts += 1;
                match self.broadcast.admit(frame, &self.identity, now) {
                    BroadcastVerdict::Accept => {}
                    BroadcastVerdict::FilteredSource => {
                        self.stats.broadcasts_filtered += 1;
                        return None;
                    }
                    BroadcastVerdict::Duplicate => {
                        self.stats.duplicate_broadcasts += 1;
                        return None;
                    }
                }
            }
            AddressClass::Ours => {}
        }

        let failures_before = self.processor.persistence_failures();
        let reply = self.processor.process(
            frame,
            class == AddressClass::Broadcast,
            &self.identity,
            &mut self.state,
            &mut self.hooks,
        );
        self.stats.persistence_failures += self.processor.persistence_failures() - failures_before;

        let reply = reply?;
        if !self.limiter.allow(now) {
            self.stats.rate_limited += 1;
            warn!(
                "Reply budget of {}/s exhausted, dropping reply to 0x{:02X}",
                self.limiter.max_per_window(),
                frame.from_addr
            );
            return None;
        }

        self.stats.replies += 1;
        if reply.kind == ReplyKind::Nak {
            self.stats.naks += 1;
            debug!("NAK to 0x{:02X} for cmd 0x{:02X}", frame.from_addr, frame.command);
        }
        Some(reply.bytes)
    }

    /// Relay a validated frame from a physical bus to the uplink
    ///
    /// Only bridging roles relay; other roles always get `None`.
    ///
    /// # Returns
    ///
    /// Hex text for the uplink, or `None` when a sibling bus already
    /// delivered the same frame inside the forwarding window.
    pub fn relay_to_uplink(&mut self, bus: BusId, raw: &[u8], now: Instant) -> Option<String> {
        let bridge = self.bridge.as_mut()?;
        let relayed = bridge.relay_to_uplink(bus, raw, now);
        match relayed {
            Some(_) => self.stats.forwarded += 1,
            None => self.stats.forward_duplicates += 1,
        }
        relayed
    }

    /// Relay a hex message from the uplink onto the physical buses
    ///
    /// Only bridging roles relay, and frames addressed to us stay here.
    ///
    /// # Returns
    ///
    /// Raw frame bytes to write on every bus, or `None`.
    pub fn relay_to_buses(&mut self, text: &str, now: Instant) -> Option<Vec<u8>> {
        let bridge = self.bridge.as_mut()?;
        let bytes = decode_hex(text, self.settings.max_frame_len).ok()?;
        let frame = Frame::parse(&bytes).ok()?;
        if frame.to_addr == self.identity.address {
            return None;
        }
        bridge.mark_sent(&bytes, now);
        Some(bytes)
    }
}

/// Forwarding bridge for roles that relay between buses and the uplink
fn bridge_for(role: Role, settings: &EngineSettings) -> Option<Bridge> {
    role.is_bridge()
        .then(|| Bridge::new(ForwardCache::new(settings.forward_window, settings.forward_capacity)))
}
