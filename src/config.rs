//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::civ::protocol::MIN_FRAME_LEN;
use crate::device::{DeviceIdentity, DeviceState, Role, SwitchVariant, UnknownCommandPolicy};
use crate::engine::EngineSettings;
use crate::error::{CivError, Result};

/// Baud rates accepted on the CI-V bus
pub const SUPPORTED_BAUD_RATES: [u32; 6] = [4800, 9600, 19200, 38400, 57600, 115200];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    pub serial: SerialConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Device identity and initial state
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    pub address: u8,

    pub role: Role,

    #[serde(default = "default_management_address")]
    pub management_address: u8,

    #[serde(default = "default_variant")]
    pub variant: SwitchVariant,

    #[serde(default = "default_model_id")]
    pub model_id: u8,

    #[serde(default = "default_network_address")]
    pub network_address: Ipv4Addr,

    /// Role default when absent
    #[serde(default)]
    pub unknown_command: Option<UnknownCommandPolicy>,

    /// Role default when absent
    #[serde(default)]
    pub broadcast_filtering: Option<bool>,
}

/// Broadcast policy configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    #[serde(default = "default_dedup_window_ms")]
    pub broadcast_dedup_window_ms: u64,
}

/// Outbound reply budget
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RateLimitConfig {
    /// Role default when absent
    #[serde(default)]
    pub max_replies_per_second: Option<u32>,
}

/// Forwarding dedup for bridging roles
#[derive(Debug, Deserialize, Clone)]
pub struct ForwardingConfig {
    #[serde(default = "default_forward_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_forward_capacity")]
    pub capacity: usize,
}

/// Frame decoder configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DecoderConfig {
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

/// Serial bus configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_ports")]
    pub ports: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rolling log files are written here when set
    #[serde(default)]
    pub log_dir: Option<String>,
}

/// Periodic statistics report
#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    /// Zero disables the periodic report
    #[serde(default = "default_report_interval_s")]
    pub report_interval_s: u64,
}

// Default value functions
fn default_management_address() -> u8 { 0xEE }
fn default_variant() -> SwitchVariant { SwitchVariant::Rcs8 }
fn default_model_id() -> u8 { 0x01 }
fn default_network_address() -> Ipv4Addr { Ipv4Addr::UNSPECIFIED }

fn default_dedup_window_ms() -> u64 { 1000 }

fn default_forward_window_ms() -> u64 { 1000 }
fn default_forward_capacity() -> usize { 64 }

fn default_max_frame_len() -> usize { 64 }

fn default_serial_ports() -> Vec<String> { vec!["/dev/ttyUSB0".to_string()] }
fn default_baud_rate() -> u32 { 19200 }

fn default_log_level() -> String { "info".to_string() }

fn default_report_interval_s() -> u64 { 60 }

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { broadcast_dedup_window_ms: default_dedup_window_ms() }
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            window_ms: default_forward_window_ms(),
            capacity: default_forward_capacity(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { max_frame_len: default_max_frame_len() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { report_interval_s: default_report_interval_s() }
    }
}

fn invalid(message: impl std::fmt::Display) -> CivError {
    CivError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shackmate_civ::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        let device = &self.device;

        self.identity().validate().map_err(|e| invalid(e.to_string()))?;

        if !(1..=60000).contains(&self.policy.broadcast_dedup_window_ms) {
            return Err(invalid("broadcast_dedup_window_ms must be between 1 and 60000"));
        }

        if let Some(rate) = self.rate_limit.max_replies_per_second {
            if !(1..=1000).contains(&rate) {
                return Err(invalid("max_replies_per_second must be between 1 and 1000"));
            }
        }

        if !(1..=60000).contains(&self.forwarding.window_ms) {
            return Err(invalid("forwarding window_ms must be between 1 and 60000"));
        }

        if !(1..=1024).contains(&self.forwarding.capacity) {
            return Err(invalid("forwarding capacity must be between 1 and 1024"));
        }

        if !(MIN_FRAME_LEN..=256).contains(&self.decoder.max_frame_len) {
            return Err(invalid(format!(
                "max_frame_len must be between {} and 256",
                MIN_FRAME_LEN
            )));
        }

        // Validate serial buses
        if self.serial.ports.is_empty() {
            return Err(invalid("at least one serial port is required"));
        }

        if self.serial.ports.iter().any(|p| p.is_empty()) {
            return Err(invalid("serial port path cannot be empty"));
        }

        if self.serial.ports.len() > 2 {
            return Err(invalid("at most two serial ports are supported"));
        }

        if self.serial.ports.len() == 2 && !device.role.is_bridge() {
            return Err(invalid(format!(
                "role {} supports a single serial port",
                device.role
            )));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 4800, 9600, 19200, 38400, 57600, 115200",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        Ok(())
    }

    /// Device identity described by the `[device]` section
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device.address, self.device.role)
            .with_management_address(self.device.management_address)
    }

    /// Device state before any command arrives
    pub fn initial_state(&self) -> DeviceState {
        DeviceState {
            variant: self.device.variant,
            model_id: self.device.model_id,
            network_address: self.device.network_address,
            ..DeviceState::default()
        }
    }

    /// Engine tunables, with role defaults filling anything not configured
    pub fn engine_settings(&self) -> EngineSettings {
        let role = self.device.role;
        EngineSettings {
            dedup_window: Duration::from_millis(self.policy.broadcast_dedup_window_ms),
            max_replies_per_second: self
                .rate_limit
                .max_replies_per_second
                .unwrap_or_else(|| role.default_rate_limit()),
            broadcast_filtering: self
                .device
                .broadcast_filtering
                .unwrap_or_else(|| role.filters_broadcast_sources()),
            unknown_command: self
                .device
                .unknown_command
                .unwrap_or_else(|| role.default_unknown_command()),
            max_frame_len: self.decoder.max_frame_len,
            forward_window: Duration::from_millis(self.forwarding.window_ms),
            forward_capacity: self.forwarding.capacity,
        }
    }
}
