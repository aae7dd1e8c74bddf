//! # CI-V Protocol Constants and Types
//!
//! Core protocol definitions and the single-shot frame validator.
//!
//! ```text
//! FE FE <to> <from> <cmd> [<sub>] [<data>...] FD
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::FrameError;

/// Preamble byte, sent twice at the start of every frame
pub const PREAMBLE: u8 = 0xFE;

/// Frame terminator
pub const TERMINATOR: u8 = 0xFD;

/// Negative acknowledgement byte
pub const NAK: u8 = 0xFA;

/// Destination address meaning "all devices"
pub const BROADCAST_ADDR: u8 = 0x00;

/// Default management address, the only broadcast source some roles answer
pub const DEFAULT_MANAGEMENT_ADDR: u8 = 0xEE;

/// Smallest legal frame: FE FE to from cmd FD
pub const MIN_FRAME_LEN: usize = 6;

/// Default decoder buffer capacity
pub const DEFAULT_MAX_FRAME_LEN: usize = 64;

/// Maximum number of payload bytes kept per frame
pub const MAX_DATA_LEN: usize = 16;

/// Echo / identify request (sub 0x00 address, sub 0x01 network address)
pub const CMD_IDENTIFY: u8 = 0x19;

/// Read/set switch variant
pub const CMD_VARIANT: u8 = 0x30;

/// Read/set selected antenna port
pub const CMD_SELECT_PORT: u8 = 0x31;

/// Read model identifier
pub const CMD_READ_MODEL: u8 = 0x34;

/// Read/set outlet status
pub const CMD_OUTLET_STATUS: u8 = 0x35;

/// `0x19` sub-command: report our bus address
pub const SUB_ECHO_ADDRESS: u8 = 0x00;

/// `0x19` sub-command: report our IPv4 address
pub const SUB_NETWORK_ADDRESS: u8 = 0x01;

/// How the bytes after the command byte are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLayout {
    /// `bytes[5]` is a sub-command, the rest is payload
    SubCommand,
    /// Everything after the command byte is payload
    DataOnly,
}

impl CommandLayout {
    /// Layout used by a given command byte
    pub fn for_command(command: u8) -> Self {
        match command {
            CMD_VARIANT | CMD_SELECT_PORT | CMD_READ_MODEL | CMD_OUTLET_STATUS => {
                CommandLayout::DataOnly
            }
            _ => CommandLayout::SubCommand,
        }
    }
}

/// A validated CI-V frame
///
/// Built by [`Frame::parse`] and consumed immediately by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Destination address
    pub to_addr: u8,

    /// Source address
    pub from_addr: u8,

    /// Command byte
    pub command: u8,

    /// Sub-command, only for [`CommandLayout::SubCommand`] commands
    pub sub_command: Option<u8>,

    /// Payload bytes (at most [`MAX_DATA_LEN`])
    pub data: Vec<u8>,

    /// Payload bytes past [`MAX_DATA_LEN`], never interpreted
    pub excess_data: Vec<u8>,

    /// Length of the raw frame including preamble and terminator
    pub raw_len: usize,
}

impl Frame {
    /// Validate raw bytes and extract the frame fields
    ///
    /// # Arguments
    ///
    /// * `bytes` - Complete raw frame (preamble through terminator)
    ///
    /// # Errors
    ///
    /// Checks run in order and the first failure is returned:
    /// - [`FrameError::TooShort`] when fewer than 6 bytes
    /// - [`FrameError::BadPreamble`] when the frame does not start with `FE FE`
    /// - [`FrameError::MissingTerminator`] when the last byte is not `FD`
    /// - [`FrameError::Corrupted`] when another `FE FE` pair appears in the body
    ///
    /// # Examples
    ///
    /// ```
    /// use shackmate_civ::civ::protocol::Frame;
    ///
    /// let frame = Frame::parse(&[0xFE, 0xFE, 0x00, 0xEE, 0x19, 0x00, 0xFD]).unwrap();
    /// assert_eq!(frame.from_addr, 0xEE);
    /// assert_eq!(frame.sub_command, Some(0x00));
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        let len = bytes.len();
        if len < MIN_FRAME_LEN {
            return Err(FrameError::TooShort { len });
        }

        if bytes[0] != PREAMBLE || bytes[1] != PREAMBLE {
            return Err(FrameError::BadPreamble(bytes[0], bytes[1]));
        }

        if bytes[len - 1] != TERMINATOR {
            return Err(FrameError::MissingTerminator(bytes[len - 1]));
        }

        // A second preamble in the body means two frames were glued together
        // or bytes were lost; the whole buffer is discarded.
        if let Some(offset) = (2..len - 3).find(|&i| bytes[i] == PREAMBLE && bytes[i + 1] == PREAMBLE) {
            return Err(FrameError::Corrupted { offset });
        }

        let command = bytes[4];
        let body = &bytes[5..len - 1];

        let (sub_command, payload) = match CommandLayout::for_command(command) {
            CommandLayout::DataOnly => (None, body),
            CommandLayout::SubCommand => match body.split_first() {
                Some((&sub, rest)) => (Some(sub), rest),
                None => (None, body),
            },
        };

        let split = payload.len().min(MAX_DATA_LEN);
        let data = payload[..split].to_vec();
        let excess_data = payload[split..].to_vec();

        Ok(Self {
            to_addr: bytes[2],
            from_addr: bytes[3],
            command,
            sub_command,
            data,
            excess_data,
            raw_len: len,
        })
    }

    /// Whether the frame is addressed to every device
    pub fn is_broadcast(&self) -> bool {
        self.to_addr == BROADCAST_ADDR
    }

    /// First payload byte, if any
    pub fn first_data(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Rebuild the wire bytes from the parsed fields
    ///
    /// Always equal to the raw input, including any excess payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = [self.data.as_slice(), self.excess_data.as_slice()].concat();
        build_frame(self.to_addr, self.from_addr, self.command, self.sub_command, &payload)
    }
}

/// Assemble a complete frame from its parts
///
/// # Arguments
///
/// * `to_addr` - Destination address
/// * `from_addr` - Source address
/// * `command` - Command byte
/// * `sub_command` - Optional sub-command byte
/// * `data` - Payload bytes
///
/// # Examples
///
/// ```
/// use shackmate_civ::civ::protocol::build_frame;
///
/// let bytes = build_frame(0xEE, 0xB0, 0x34, None, &[0x01]);
/// assert_eq!(bytes, vec![0xFE, 0xFE, 0xEE, 0xB0, 0x34, 0x01, 0xFD]);
/// ```
pub fn build_frame(to_addr: u8, from_addr: u8, command: u8, sub_command: Option<u8>, data: &[u8]) -> Vec<u8> {
    let capacity = MIN_FRAME_LEN + usize::from(sub_command.is_some()) + data.len();
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_u8(PREAMBLE);
    buf.put_u8(PREAMBLE);
    buf.put_u8(to_addr);
    buf.put_u8(from_addr);
    buf.put_u8(command);
    if let Some(sub) = sub_command {
        buf.put_u8(sub);
    }
    buf.put_slice(data);
    buf.put_u8(TERMINATOR);
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(PREAMBLE, 0xFE);
        assert_eq!(TERMINATOR, 0xFD);
        assert_eq!(NAK, 0xFA);
        assert_eq!(BROADCAST_ADDR, 0x00);
        assert_eq!(DEFAULT_MANAGEMENT_ADDR, 0xEE);
        assert_eq!(DEFAULT_MAX_FRAME_LEN, 64);
    }

    #[test]
    fn test_parse_too_short() {
        let result = Frame::parse(&[0xFE, 0xFE, 0xB0, 0xEE, 0xFD]);
        assert_eq!(result, Err(FrameError::TooShort { len: 5 }));
    }

    #[test]
    fn test_parse_bad_preamble() {
        let result = Frame::parse(&[0xFE, 0x00, 0xB0, 0xEE, 0x34, 0xFD]);
        assert_eq!(result, Err(FrameError::BadPreamble(0xFE, 0x00)));
    }

    #[test]
    fn test_parse_missing_terminator() {
        let result = Frame::parse(&[0xFE, 0xFE, 0xB0, 0xEE, 0x34, 0x00]);
        assert_eq!(result, Err(FrameError::MissingTerminator(0x00)));
    }

    #[test]
    fn test_parse_length_checked_before_preamble() {
        let result = Frame::parse(&[0x00, 0x00, 0xFD]);
        assert!(matches!(result, Err(FrameError::TooShort { .. })));
    }

    #[test]
    fn test_parse_embedded_preamble_is_corruption() {
        // Lost terminator: the next frame's preamble ends up inside this one
        let bytes = [0xFE, 0xFE, 0xB0, 0xEE, 0xFE, 0xFE, 0xB0, 0xEE, 0x34, 0xFD];
        assert_eq!(Frame::parse(&bytes), Err(FrameError::Corrupted { offset: 4 }));
    }

    #[test]
    fn test_parse_fe_pair_adjacent_to_terminator_is_not_scanned() {
        // Scan stops at len - 3, so FE FE right before FD is payload
        let bytes = [0xFE, 0xFE, 0xB0, 0xEE, 0x19, 0xFE, 0xFE, 0xFD];
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.sub_command, Some(0xFE));
        assert_eq!(frame.data, vec![0xFE]);
    }

    #[test]
    fn test_parse_minimal_frame_has_no_sub_command() {
        let frame = Frame::parse(&[0xFE, 0xFE, 0xB0, 0xEE, 0x19, 0xFD]).unwrap();
        assert_eq!(frame.to_addr, 0xB0);
        assert_eq!(frame.from_addr, 0xEE);
        assert_eq!(frame.command, 0x19);
        assert_eq!(frame.sub_command, None);
        assert!(frame.data.is_empty());
        assert_eq!(frame.raw_len, 6);
    }

    #[test]
    fn test_parse_sub_command_layout() {
        let frame = Frame::parse(&[0xFE, 0xFE, 0x00, 0xEE, 0x19, 0x01, 0xAA, 0xBB, 0xFD]).unwrap();
        assert!(frame.is_broadcast());
        assert_eq!(frame.sub_command, Some(0x01));
        assert_eq!(frame.data, vec![0xAA, 0xBB]);
    }

    #[test]
    fn test_parse_data_only_layout() {
        let frame = Frame::parse(&[0xFE, 0xFE, 0xB0, 0xEE, 0x35, 0x02, 0xFD]).unwrap();
        assert_eq!(frame.sub_command, None);
        assert_eq!(frame.data, vec![0x02]);
        assert_eq!(frame.first_data(), Some(0x02));

        let frame = Frame::parse(&[0xFE, 0xFE, 0xB4, 0xEE, 0x31, 0xFD]).unwrap();
        assert_eq!(frame.sub_command, None);
        assert_eq!(frame.first_data(), None);
    }

    #[test]
    fn test_parse_caps_payload() {
        let mut bytes = vec![0xFE, 0xFE, 0xB0, 0xEE, 0x1A, 0x05];
        bytes.extend_from_slice(&[0x11; 20]);
        bytes.push(0xFD);

        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.data.len(), MAX_DATA_LEN);
        assert_eq!(frame.excess_data, vec![0x11; 4]);
        assert_eq!(frame.raw_len, bytes.len());
        assert_eq!(frame.to_bytes(), bytes);
    }

    #[test]
    fn test_command_layouts() {
        assert_eq!(CommandLayout::for_command(CMD_IDENTIFY), CommandLayout::SubCommand);
        assert_eq!(CommandLayout::for_command(CMD_VARIANT), CommandLayout::DataOnly);
        assert_eq!(CommandLayout::for_command(CMD_SELECT_PORT), CommandLayout::DataOnly);
        assert_eq!(CommandLayout::for_command(CMD_READ_MODEL), CommandLayout::DataOnly);
        assert_eq!(CommandLayout::for_command(CMD_OUTLET_STATUS), CommandLayout::DataOnly);
        assert_eq!(CommandLayout::for_command(0x03), CommandLayout::SubCommand);
    }

    #[test]
    fn test_to_bytes_rebuilds_raw_frame() {
        let raw = [0xFE, 0xFE, 0xB0, 0xEE, 0x19, 0x01, 0xC0, 0xA8, 0x01, 0x32, 0xFD];
        let frame = Frame::parse(&raw).unwrap();
        assert_eq!(frame.to_bytes(), raw.to_vec());

        let raw = [0xFE, 0xFE, 0xB0, 0xEE, 0x35, 0xFD];
        assert_eq!(Frame::parse(&raw).unwrap().to_bytes(), raw.to_vec());
    }

    #[test]
    fn test_build_frame_with_sub_command() {
        let bytes = build_frame(0xEE, 0xB4, 0x19, Some(0x00), &[0xB4]);
        assert_eq!(bytes, vec![0xFE, 0xFE, 0xEE, 0xB4, 0x19, 0x00, 0xB4, 0xFD]);
    }
}
