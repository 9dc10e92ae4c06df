//! Command frame wire format.
//!
//! ```text
//!   byte 0     byte 1      byte 2 ..
//! ┌─────────┬──────────┬──────────────────────┐
//! │ opcode  │ length   │ payload (length B)   │
//! └─────────┴──────────┴──────────────────────┘
//! ```
//!
//! A frame whose total size differs from `2 + length` is still accepted;
//! the mismatch is reported through [`Frame::length_matches`].

use core::fmt;

/// Command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    KvWrite = 0x01,
    KvRead = 0x02,
    BusAWrite = 0x03,
    BusARead = 0x04,
    BusBWrite = 0x05,
    BusBRead = 0x06,
}

impl Opcode {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::KvWrite),
            0x02 => Some(Self::KvRead),
            0x03 => Some(Self::BusAWrite),
            0x04 => Some(Self::BusARead),
            0x05 => Some(Self::BusBWrite),
            0x06 => Some(Self::BusBRead),
            _ => None,
        }
    }

    pub fn is_write(self) -> bool {
        matches!(self, Self::KvWrite | Self::BusAWrite | Self::BusBWrite)
    }
}

/// Header size: opcode + length.
pub const HEADER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than [`HEADER_LEN`] bytes.
    TooShort(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(n) => write!(f, "frame too short ({} bytes)", n),
        }
    }
}

/// Borrowed view of a raw frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub opcode: u8,
    pub length: u8,
    /// Everything after the header, whatever its size.
    pub payload: &'a [u8],
    /// The whole frame including the header.
    pub raw: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn parse(raw: &'a [u8]) -> Result<Self, FrameError> {
        if raw.len() < HEADER_LEN {
            return Err(FrameError::TooShort(raw.len()));
        }
        Ok(Self {
            opcode: raw[0],
            length: raw[1],
            payload: &raw[HEADER_LEN..],
            raw,
        })
    }

    pub fn op(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    pub fn length_matches(&self) -> bool {
        self.raw.len() == HEADER_LEN + self.length as usize
    }

    /// The first `length` payload bytes, or all of them if fewer arrived.
    pub fn declared_payload(&self) -> &'a [u8] {
        let n = (self.length as usize).min(self.payload.len());
        &self.payload[..n]
    }
}
