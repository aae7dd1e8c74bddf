//! # Device Module
//!
//! Identity, role and mutable state of the accessory answering on the bus,
//! plus the host callbacks the command processor drives.
//!
//! This module handles:
//! - Device identity (bus address, role, management address)
//! - Antenna switch variants and port ranges
//! - Outlet relay state and its 2-bit status encoding
//! - The [`DeviceHooks`] seam for persistence, outputs and UI notification

pub mod processor;

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::civ::protocol::{BROADCAST_ADDR, DEFAULT_MANAGEMENT_ADDR, NAK, PREAMBLE, TERMINATOR};
use crate::error::{CivError, Result};

/// Persistence key for the switch variant
pub const KEY_VARIANT: &str = "rcs_type";

/// Persistence key for the zero-based selected antenna port
pub const KEY_SELECTED_PORT: &str = "selected_index";

/// Persistence key for the outlet status byte
pub const KEY_OUTLET_STATUS: &str = "outlet_status";

/// Which accessory this engine is answering for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Remote antenna switch (commands 0x19, 0x30, 0x31)
    AntennaSwitch,
    /// Dual power outlet (commands 0x19, 0x34, 0x35)
    Outlet,
    /// Bus controller / bridge (command 0x19 only)
    GenericController,
}

impl Role {
    /// Default outbound reply budget per second
    pub fn default_rate_limit(self) -> u32 {
        match self {
            Role::AntennaSwitch | Role::Outlet => 20,
            Role::GenericController => 50,
        }
    }

    /// Whether broadcasts are only answered from the management address
    pub fn filters_broadcast_sources(self) -> bool {
        matches!(self, Role::GenericController)
    }

    /// What to do with a command this role does not implement
    pub fn default_unknown_command(self) -> UnknownCommandPolicy {
        match self {
            Role::AntennaSwitch => UnknownCommandPolicy::Echo,
            Role::Outlet | Role::GenericController => UnknownCommandPolicy::Ignore,
        }
    }

    /// Whether this role relays between physical buses and the uplink
    pub fn is_bridge(self) -> bool {
        matches!(self, Role::GenericController)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::AntennaSwitch => write!(f, "antenna-switch"),
            Role::Outlet => write!(f, "outlet"),
            Role::GenericController => write!(f, "generic-controller"),
        }
    }
}

/// Handling of commands a role does not implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCommandPolicy {
    /// Stay silent
    Ignore,
    /// Answer `FE FE peer addr cmd sub addr FD`
    Echo,
}

/// Immutable identity of the device on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Our CI-V address
    pub address: u8,
    /// What we are
    pub role: Role,
    /// Source address trusted for broadcasts
    pub management_address: u8,
}

impl DeviceIdentity {
    /// Identity with the default management address (0xEE)
    pub fn new(address: u8, role: Role) -> Self {
        Self {
            address,
            role,
            management_address: DEFAULT_MANAGEMENT_ADDR,
        }
    }

    /// Override the management address
    pub fn with_management_address(mut self, management_address: u8) -> Self {
        self.management_address = management_address;
        self
    }

    /// Check that the identity can be used on the bus
    ///
    /// # Errors
    ///
    /// Returns [`CivError::InvalidIdentity`] if the address is a reserved
    /// byte, the management address is the broadcast address, or both
    /// addresses are the same.
    pub fn validate(&self) -> Result<()> {
        // Reserved bytes cannot be a device address
        if [BROADCAST_ADDR, NAK, 0xFB, TERMINATOR, PREAMBLE].contains(&self.address) {
            return Err(CivError::InvalidIdentity(format!(
                "device address 0x{:02X} is reserved",
                self.address
            )));
        }

        if self.management_address == BROADCAST_ADDR {
            return Err(CivError::InvalidIdentity(
                "management address cannot be 0x00".to_string(),
            ));
        }

        if self.address == self.management_address {
            return Err(CivError::InvalidIdentity(
                "device address must differ from the management address".to_string(),
            ));
        }

        Ok(())
    }
}

/// Antenna switch hardware variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchVariant {
    /// RCS-8: five ports, wire code 0x00
    Rcs8,
    /// RCS-10: eight ports, wire code 0x01
    Rcs10,
}

impl SwitchVariant {
    /// Wire code reported by command 0x30
    pub fn code(self) -> u8 {
        match self {
            SwitchVariant::Rcs8 => 0x00,
            SwitchVariant::Rcs10 => 0x01,
        }
    }

    /// Variant for a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(SwitchVariant::Rcs8),
            0x01 => Some(SwitchVariant::Rcs10),
            _ => None,
        }
    }

    /// Number of selectable ports
    pub fn port_count(self) -> u8 {
        match self {
            SwitchVariant::Rcs8 => 5,
            SwitchVariant::Rcs10 => 8,
        }
    }

    /// Whether a one-based port number is selectable
    pub fn accepts_port(self, port: u8) -> bool {
        (1..=self.port_count()).contains(&port)
    }
}

/// State of the two outlet relays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletState {
    /// Outlet A
    pub primary: bool,
    /// Outlet B
    pub secondary: bool,
}

impl OutletState {
    /// Encode as the 2-bit status byte
    ///
    /// `00` both off, `01` A on, `02` B on, `03` both on.
    pub fn status(self) -> u8 {
        u8::from(self.primary) | (u8::from(self.secondary) << 1)
    }

    /// Decode a status byte, `None` above 0x03
    pub fn from_status(status: u8) -> Option<Self> {
        if status > 0x03 {
            return None;
        }
        Some(Self {
            primary: status & 0x01 != 0,
            secondary: status & 0x02 != 0,
        })
    }
}

/// Mutable state the commands read and change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    /// Antenna switch variant
    pub variant: SwitchVariant,
    /// Zero-based selected antenna port
    pub selected_port: u8,
    /// Outlet relays
    pub outlets: OutletState,
    /// Model identifier reported by command 0x34
    pub model_id: u8,
    /// Address reported by command 0x19 01
    pub network_address: Ipv4Addr,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            variant: SwitchVariant::Rcs8,
            selected_port: 0,
            outlets: OutletState::default(),
            model_id: 0x01,
            network_address: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl DeviceState {
    /// One-based selected port as reported on the wire
    ///
    /// A restored index past the variant's last port reports the last port.
    pub fn selected_port_number(&self) -> u8 {
        self.selected_port.min(self.variant.port_count() - 1) + 1
    }
}

/// Output the hardware should switch to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Zero-based antenna port
    AntennaPort(u8),
    /// Outlet relays
    Outlets(OutletState),
}

/// Host callbacks invoked synchronously while a command is handled
#[cfg_attr(test, mockall::automock)]
pub trait DeviceHooks {
    /// Persist a setting
    fn save(&mut self, key: &str, value: u8) -> Result<()>;

    /// Drive the physical outputs
    fn apply_output(&mut self, output: Output);

    /// Tell local UI listeners about the new state
    fn on_state_changed(&mut self, state: &DeviceState);
}

/// Hooks that only log, used when the host has no hardware attached
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl DeviceHooks for LoggingHooks {
    fn save(&mut self, key: &str, value: u8) -> Result<()> {
        debug!("Persist {} = 0x{:02X}", key, value);
        Ok(())
    }

    fn apply_output(&mut self, output: Output) {
        match output {
            Output::AntennaPort(port) => info!("Antenna port {} selected", port + 1),
            Output::Outlets(outlets) => info!(
                "Outlets: A {}, B {}",
                if outlets.primary { "ON" } else { "OFF" },
                if outlets.secondary { "ON" } else { "OFF" }
            ),
        }
    }

    fn on_state_changed(&mut self, state: &DeviceState) {
        debug!("Device state changed: {:?}", state);
    }
}
