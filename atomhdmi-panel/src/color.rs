//! Pixel formats understood by the frame memory.
//!
//! A "raw" color is a `u32` whose little-endian bytes, truncated to the
//! depth's byte count, are exactly what goes on the wire.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum ColorDepth {
    #[strum(to_string = "rgb332")]
    Rgb332,
    #[default]
    #[strum(to_string = "rgb565")]
    Rgb565,
    #[strum(to_string = "rgb888")]
    Rgb888,
}

impl ColorDepth {
    /// Closest supported depth for a requested bit count: anything above 16
    /// becomes 24, anything below becomes 8.
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            17.. => Self::Rgb888,
            16 => Self::Rgb565,
            _ => Self::Rgb332,
        }
    }

    pub const fn bits(self) -> u8 {
        match self {
            Self::Rgb332 => 8,
            Self::Rgb565 => 16,
            Self::Rgb888 => 24,
        }
    }

    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    pub const fn to_raw(self, c: Rgb) -> u32 {
        let (r, g, b) = (c.r as u32, c.g as u32, c.b as u32);
        match self {
            Self::Rgb332 => (r & 0xe0) | (g & 0xe0) >> 3 | b >> 6,
            // big endian on the wire
            Self::Rgb565 => {
                let v = (r & 0xf8) << 8 | (g & 0xfc) << 3 | b >> 3;
                (v >> 8) | (v & 0xff) << 8
            }
            Self::Rgb888 => r | g << 8 | b << 16,
        }
    }

    /// Inverse of [`ColorDepth::to_raw`]. Low bits lost to the depth are
    /// filled by repeating the high bits.
    pub const fn from_raw(self, raw: u32) -> Rgb {
        match self {
            Self::Rgb332 => {
                let r = (raw & 0xe0) as u8;
                let g = ((raw << 3) & 0xe0) as u8;
                let b = ((raw << 6) & 0xc0) as u8;
                Rgb::new(r | r >> 3 | r >> 6, g | g >> 3 | g >> 6, b | b >> 2 | b >> 4 | b >> 6)
            }
            Self::Rgb565 => {
                let v = (raw & 0xff) << 8 | (raw >> 8) & 0xff;
                let r = ((v >> 8) & 0xf8) as u8;
                let g = ((v >> 3) & 0xfc) as u8;
                let b = ((v << 3) & 0xf8) as u8;
                Rgb::new(r | r >> 5, g | g >> 6, b | b >> 5)
            }
            Self::Rgb888 => Rgb::new(raw as u8, (raw >> 8) as u8, (raw >> 16) as u8),
        }
    }

    /// Append the wire bytes of `pixels` to `out`.
    pub fn encode(self, pixels: &[Rgb], out: &mut Vec<u8>) {
        let n = self.bytes();
        out.reserve(pixels.len() * n);
        for p in pixels {
            out.extend_from_slice(&self.to_raw(*p).to_le_bytes()[..n]);
        }
    }

    /// Decode wire bytes into `out`, one pixel per element. Stops at the
    /// shorter of the two.
    pub fn decode(self, bytes: &[u8], out: &mut [Rgb]) {
        for (chunk, px) in bytes.chunks_exact(self.bytes()).zip(out) {
            let mut raw = [0; 4];
            raw[..chunk.len()].copy_from_slice(chunk);
            *px = self.from_raw(u32::from_le_bytes(raw));
        }
    }
}
