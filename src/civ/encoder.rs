//! # CI-V Reply Encoder
//!
//! Builds reply frames and converts between raw bytes and the uppercase,
//! space-separated hex text used on the network transport.

use super::protocol::{build_frame, Frame, CommandLayout, NAK, PREAMBLE, TERMINATOR};
use crate::error::{CivError, Result};

/// Build a normal reply: `FE FE peer addr cmd [sub] data FD`
///
/// # Arguments
///
/// * `peer` - Address of the device we are answering
/// * `addr` - Our own address
/// * `command` - Command being answered
/// * `sub_command` - Optional sub-command echoed back
/// * `data` - Reply payload
pub fn encode_reply(peer: u8, addr: u8, command: u8, sub_command: Option<u8>, data: &[u8]) -> Vec<u8> {
    build_frame(peer, addr, command, sub_command, data)
}

/// Build a plain NAK: `FE FE peer addr FA FD`
pub fn encode_nak(peer: u8, addr: u8) -> Vec<u8> {
    vec![PREAMBLE, PREAMBLE, peer, addr, NAK, TERMINATOR]
}

/// Build a NAK that echoes the rejected request
///
/// `FE FE peer addr cmd [sub] [data...] FA FD`
///
/// # Examples
///
/// ```
/// use shackmate_civ::civ::protocol::Frame;
/// use shackmate_civ::civ::encoder::encode_extended_nak;
///
/// let request = Frame::parse(&[0xFE, 0xFE, 0xB0, 0xEE, 0x35, 0x05, 0xFD]).unwrap();
/// let nak = encode_extended_nak(&request, 0xB0);
/// assert_eq!(nak, vec![0xFE, 0xFE, 0xEE, 0xB0, 0x35, 0x05, 0xFA, 0xFD]);
/// ```
pub fn encode_extended_nak(request: &Frame, addr: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(request.data.len() + 8);
    out.extend_from_slice(&[PREAMBLE, PREAMBLE, request.from_addr, addr, request.command]);

    if CommandLayout::for_command(request.command) == CommandLayout::SubCommand {
        if let Some(sub) = request.sub_command {
            out.push(sub);
        }
    }

    out.extend_from_slice(&request.data);
    out.push(NAK);
    out.push(TERMINATOR);
    out
}

/// Encode bytes as uppercase hex pairs separated by single spaces
///
/// No leading or trailing whitespace is produced.
///
/// # Examples
///
/// ```
/// use shackmate_civ::civ::encoder::encode_hex;
///
/// assert_eq!(encode_hex(&[0xFE, 0xFE, 0x0A, 0xFD]), "FE FE 0A FD");
/// assert_eq!(encode_hex(&[]), "");
/// ```
pub fn encode_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode hex text received from the network transport
///
/// Accepts either case and any amount of whitespace between digits.
///
/// # Arguments
///
/// * `text` - Hex message, e.g. `"FE FE 00 EE 19 00 FD"`
/// * `max_len` - Largest number of bytes accepted
///
/// # Errors
///
/// Returns [`CivError::HexText`] for JSON payloads, non-hex characters,
/// an odd number of digits, or more than `max_len` bytes.
pub fn decode_hex(text: &str, max_len: usize) -> Result<Vec<u8>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Err(CivError::HexText("JSON payload on CI-V channel".to_string()));
    }

    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CivError::HexText(format!("odd number of hex digits: {}", digits.len())));
    }

    if digits.len() / 2 > max_len {
        return Err(CivError::HexText(format!(
            "message of {} bytes exceeds maximum {}",
            digits.len() / 2,
            max_len
        )));
    }

    hex::decode(&digits).map_err(|e| CivError::HexText(format!("invalid hex text: {}", e)))
}
