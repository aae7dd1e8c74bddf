//! # CI-V Stream Decoder
//!
//! Byte-at-a-time frame synchronisation for serial buses.
//!
//! The decoder scans for two consecutive `FE` bytes, copies everything that
//! follows into a bounded buffer, and hands the buffer to [`Frame::parse`]
//! when an `FD` arrives. It never grows past its capacity and always falls
//! back to [`DecoderMode::Idle`] after a frame, an overflow, or corruption.

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use super::protocol::{Frame, DEFAULT_MAX_FRAME_LEN, MIN_FRAME_LEN, PREAMBLE, TERMINATOR};
use crate::error::FrameError;

/// Smallest buffer length at which `FD` is treated as a terminator
const MIN_TERMINATED_LEN: usize = 5;

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderMode {
    /// Scanning for the `FE FE` preamble
    Idle,
    /// Copying frame bytes into the buffer
    Accumulating,
}

/// A validated frame together with the exact bytes it was decoded from
///
/// Relays forward `raw` so that payloads longer than the parsed data cap
/// reach the uplink intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Parsed fields
    pub frame: Frame,
    /// Bytes from preamble through terminator
    pub raw: Bytes,
}

/// Streaming decoder owned by one transport endpoint
#[derive(Debug)]
pub struct FrameDecoder {
    mode: DecoderMode,
    buffer: BytesMut,
    preamble_count: u8,
    capacity: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder with the default 64-byte capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a decoder with a custom capacity
    ///
    /// Capacities below the minimum frame length are raised to it.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_FRAME_LEN);
        Self {
            mode: DecoderMode::Idle,
            buffer: BytesMut::with_capacity(capacity),
            preamble_count: 0,
            capacity,
        }
    }

    /// Current state
    pub fn mode(&self) -> DecoderMode {
        self.mode
    }

    /// Number of bytes buffered for the frame in progress
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Maximum frame length this decoder accepts
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Feed one received byte
    ///
    /// # Arguments
    ///
    /// * `byte` - Next byte from the bus
    ///
    /// # Returns
    ///
    /// * `None` - No frame boundary reached yet
    /// * `Some(Ok(frame))` - A terminated frame passed validation
    /// * `Some(Err(e))` - A terminated frame failed validation, or the buffer
    ///   overflowed; the decoder has already resynchronised
    ///
    /// # Examples
    ///
    /// ```
    /// use shackmate_civ::civ::decoder::FrameDecoder;
    ///
    /// let mut decoder = FrameDecoder::new();
    /// let mut frames = Vec::new();
    /// for byte in [0x00, 0xFE, 0xFE, 0xB0, 0xEE, 0x34, 0xFD] {
    ///     if let Some(Ok(frame)) = decoder.feed(byte) {
    ///         frames.push(frame);
    ///     }
    /// }
    /// assert_eq!(frames.len(), 1);
    /// ```
    pub fn feed(&mut self, byte: u8) -> Option<Result<Frame, FrameError>> {
        self.feed_raw(byte).map(|result| result.map(|decoded| decoded.frame))
    }

    /// Feed one received byte, keeping the raw bytes of a completed frame
    ///
    /// Same state machine as [`FrameDecoder::feed`].
    pub fn feed_raw(&mut self, byte: u8) -> Option<Result<RawFrame, FrameError>> {
        match self.mode {
            DecoderMode::Idle => {
                if byte == PREAMBLE {
                    self.preamble_count += 1;
                    if self.preamble_count == 2 {
                        self.mode = DecoderMode::Accumulating;
                        self.buffer.clear();
                        self.buffer.extend_from_slice(&[PREAMBLE, PREAMBLE]);
                        self.preamble_count = 0;
                    }
                } else {
                    self.preamble_count = 0;
                }
                None
            }
            DecoderMode::Accumulating => {
                self.buffer.extend_from_slice(&[byte]);

                if byte == TERMINATOR && self.buffer.len() >= MIN_TERMINATED_LEN {
                    let raw = self.buffer.split().freeze();
                    self.reset();
                    let result = Frame::parse(&raw).map(|frame| RawFrame { frame, raw: raw.clone() });
                    if let Err(ref e) = result {
                        debug!("Dropping frame {:02X?}: {}", &raw[..], e);
                    }
                    return Some(result);
                }

                if self.buffer.len() >= self.capacity {
                    warn!("CI-V frame overflow after {} bytes - dropping", self.buffer.len());
                    self.reset();
                    return Some(Err(FrameError::Overflow { capacity: self.capacity }));
                }

                None
            }
        }
    }

    /// Feed a chunk of bytes, collecting every decode outcome in order
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<Result<Frame, FrameError>> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }

    /// Drop any partial frame and return to idle
    pub fn reset(&mut self) {
        self.mode = DecoderMode::Idle;
        self.buffer.clear();
        self.preamble_count = 0;
    }
}
