#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bits<T>(pub T);

#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bytes<T>(pub T);

impl From<Bytes<u8>> for Bits<u8> {
    fn from(value: Bytes<u8>) -> Self {
        Self(value.0 * 8)
    }
}

impl Bits<u8> {
    /// Whole bytes covered by this many bits, rounded up. Bus units are
    /// always byte aligned, so this only rounds for malformed widths.
    pub const fn bytes(self) -> usize {
        (self.0 as usize).div_ceil(8)
    }

    /// Mask selecting the low `self` bits of a `u32`.
    pub const fn mask(self) -> u32 {
        match self.0 {
            0 => 0,
            32.. => u32::MAX,
            n => (1 << n) - 1,
        }
    }
}
