//! # ShackMate CI-V Library
//!
//! CI-V frame engine for station accessories: antenna switch, dual power
//! outlet and bus controller.
//!
//! This library decodes noisy CI-V byte streams into frames, decides which
//! frames this device must answer, suppresses duplicate broadcasts and its
//! own echoes, enforces an outbound reply budget and encodes byte-exact
//! replies. Bridging controllers additionally relay frames between two
//! physical buses and a hex-text uplink without duplicates.

pub mod civ;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod serial;
pub mod stats;
