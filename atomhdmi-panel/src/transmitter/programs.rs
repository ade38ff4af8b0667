//! Register programs for the transmitter, as (register, value) pairs in
//! write order. Register `0xff` selects the page.

pub type Program = &'static [(u8, u8)];

/// Third chip ID byte of the revision that needs [`REVISION_U3`].
pub const REVISION_U3_ID: u8 = 0xe2;

pub const SELECT_ID_PAGE: Program = &[(0xff, 0x80), (0xee, 0x01)];

/// Chip ID registers, on the page [`SELECT_ID_PAGE`] selects.
pub const CHIP_ID: [u8; 3] = [0x00, 0x01, 0x02];

#[rustfmt::skip]
pub const RESET: Program = &[
    (0xff, 0x81), (0x30, 0x00), (0x02, 0x66), (0x0a, 0x06), (0x15, 0x06),
    (0x4e, 0xa8), (0xff, 0x80), (0xee, 0x01), (0x11, 0x00), (0x13, 0xf1),
    (0x13, 0xf9), (0x0a, 0x80), (0xff, 0x82), (0x1b, 0x77), (0x1c, 0xec),
    (0x45, 0x00), (0x4f, 0x40), (0x50, 0x00), (0x47, 0x07),
];

#[rustfmt::skip]
pub const CORE_ENABLE: Program = &[
    (0xff, 0x82), (0xde, 0x00), (0xde, 0xc0), (0xff, 0x81), (0x23, 0x40),
    (0x24, 0x64), (0x26, 0x55), (0x29, 0x04), (0x4d, 0x00), (0x27, 0x60),
    (0x28, 0x00), (0x25, 0x01), (0x2c, 0x94), (0x2d, 0x99),
];

/// Register and the bits to clear in it, after [`CORE_ENABLE`].
pub const CORE_CLEAR: [(u8, u8); 2] = [(0x2b, 0x02), (0x2e, 0x01)];

#[rustfmt::skip]
pub const REVISION_U3: Program = &[
    (0x4d, 0x09), (0x27, 0x66), (0x28, 0x88), (0x2a, 0x00), (0x2a, 0x20),
    (0x25, 0x00), (0x2c, 0x9e), (0x2d, 0x99),
];

/// Ends on the page holding the lock status registers.
#[rustfmt::skip]
pub const PLL: Program = &[
    (0xff, 0x80), (0x16, 0xf1), (0x18, 0xdc), (0x18, 0xfc), (0x16, 0xf3),
    (0x16, 0xe3), (0x16, 0xf3), (0xff, 0x82),
];

pub const PLL_LOCKED: (u8, u8) = (0x15, 0x80);
/// Reads `0xff` while the PLL is not ready.
pub const PLL_VALUE: u8 = 0xea;
pub const PLL_DONE: (u8, u8) = (0xeb, 0x80);

#[rustfmt::skip]
pub const OUTPUT: Program = &[
    (0xb9, 0x00), (0xff, 0x84), (0x43, 0x31), (0x44, 0x10), (0x45, 0x2a),
    (0x47, 0x04), (0x10, 0x2c), (0x12, 0x64), (0x3d, 0x0a), (0xff, 0x80),
    (0x11, 0x00), (0x13, 0xf1), (0x13, 0xf9), (0xff, 0x81), (0x31, 0x44),
    (0x32, 0x4a), (0x33, 0x0b), (0x34, 0x00), (0x35, 0x00), (0x36, 0x00),
    (0x37, 0x44), (0x3f, 0x0f), (0x40, 0xa0), (0x41, 0xa0), (0x42, 0xa0),
    (0x43, 0xa0), (0x44, 0xa0), (0x30, 0xea),
];
