//! # CI-V Protocol Module
//!
//! Implementation of the CI-V bus protocol shared by the station accessories.
//!
//! This module handles:
//! - Frame synchronisation on noisy serial byte streams
//! - Structural validation and field extraction
//! - Address classification and broadcast dedup
//! - Outbound reply budgets
//! - Reply encoding and the hex text boundary
//! - Forwarding dedup for bridging controllers

pub mod protocol;
pub mod decoder;
pub mod encoder;
pub mod policy;
pub mod rate_limiter;
pub mod forward;
