/// Rotations whose device y axis runs opposite the logical one.
const FLIP_Y: u8 = 0b1001_0110;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }
}

/// Internal 3-bit rotation. Bit 0 swaps the axes, bit 1 mirrors x, bit 2
/// selects the mirrored family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rotation(u8);

impl Rotation {
    /// Combine a user rotation with the board's mounting offset.
    pub const fn new(rotation: u8, offset: u8) -> Self {
        let r = rotation & 7;
        Self(((r + offset) & 3) | ((r & 4) ^ (offset & 4)))
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn swaps_axes(self) -> bool {
        self.0 & 1 != 0
    }

    /// Map a logical rectangle to device coordinates. `width`/`height` are
    /// the logical dimensions under this rotation.
    pub const fn map(self, rect: Rect, width: u16, height: u16) -> Rect {
        let Rect { mut x, mut y, mut w, mut h } = rect;
        let r = self.0;
        if r == 0 {
            return rect;
        }
        if (1 << r) & FLIP_Y != 0 {
            y = height.wrapping_sub(y.wrapping_add(h));
        }
        if r & 2 != 0 {
            x = width.wrapping_sub(x.wrapping_add(w));
        }
        if r & 1 != 0 {
            (x, y) = (y, x);
            (w, h) = (h, w);
        }
        Rect { x, y, w, h }
    }
}
