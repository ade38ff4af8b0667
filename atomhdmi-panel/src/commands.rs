//! Serial bus opcodes. The low three bits of the pixel opcodes carry a byte
//! count, the rest is the family.

pub const READ_ID: u8 = 0x01;
pub const CASET: u8 = 0x20;
pub const RASET: u8 = 0x21;
pub const COPYRECT: u8 = 0x23;
pub const WRITE_RAW: u8 = 0x40;
pub const WRITE_RAW_32: u8 = 0x44;
pub const DRAWPIXEL: u8 = 0x50;
pub const FILLRECT: u8 = 0x58;
pub const READ_RAW: u8 = 0x60;

pub const FAMILY_MASK: u8 = !7;

/// Opcode with a byte count packed into its low bits.
pub const fn with_len(family: u8, bytes: usize) -> u8 {
    family | (bytes as u8 & 7)
}
