use atomhdmi_io::{
    Clock, Hex, SerialBus, SpaceHex,
    units::{Bits, Bytes},
};
use eyre::{Result, bail};
use tracing::{debug, info, trace, warn};

use crate::{
    ColorDepth, PanelConfig, Resolution, ResolutionError, Rgb,
    commands::{self, with_len},
    error::Axis,
    rotation::{Rect, Rotation},
    timing::{self, FREE_MAX, Pacer},
};

/// Free-count polls before a read goes ahead regardless.
const READ_RETRY: usize = 4;

/// Pixel data handed to the panel.
#[derive(Clone, Copy, Debug)]
pub enum Pixels<'a> {
    /// Already in the wire format of the current color depth.
    Raw(&'a [u8]),
    /// Converted on the way out.
    Rgb(&'a [Rgb]),
}

impl<'a> Pixels<'a> {
    pub fn pixel_count(&self, depth: ColorDepth) -> usize {
        match self {
            Pixels::Raw(b) => b.len() / depth.bytes(),
            Pixels::Rgb(p) => p.len(),
        }
    }

    fn range(&self, depth: ColorDepth, start: usize, len: usize) -> Option<Pixels<'a>> {
        match *self {
            Pixels::Raw(b) => {
                let n = depth.bytes();
                b.get(start * n..(start + len) * n).map(Pixels::Raw)
            }
            Pixels::Rgb(p) => p.get(start..start + len).map(Pixels::Rgb),
        }
    }

    fn raw_at(&self, depth: ColorDepth, idx: usize) -> Option<u32> {
        match *self {
            Pixels::Raw(b) => {
                let n = depth.bytes();
                let px = b.get(idx * n..(idx + 1) * n)?;
                let mut raw = [0; 4];
                raw[..n].copy_from_slice(px);
                Some(u32::from_le_bytes(raw))
            }
            Pixels::Rgb(p) => p.get(idx).map(|c| depth.to_raw(*c)),
        }
    }
}

/// A rectangle of source pixels, `stride` pixels per row.
#[derive(Clone, Copy, Debug)]
pub struct Image<'a> {
    pub pixels: Pixels<'a>,
    pub stride: usize,
    /// Raw color to skip instead of drawing.
    pub transparent: Option<u32>,
}

impl<'a> Image<'a> {
    pub fn new(pixels: Pixels<'a>, stride: usize) -> Self {
        Self {
            pixels,
            stride,
            transparent: None,
        }
    }

    pub fn with_transparent(self, raw: u32) -> Self {
        Self {
            transparent: Some(raw),
            ..self
        }
    }
}

/// Last bounds sent with CASET and RASET.
#[derive(Clone, Copy, Debug, Default)]
struct Window {
    cols: Option<(u16, u16)>,
    rows: Option<(u16, u16)>,
}

/// Block fill position inside the last window set.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    xs: u16,
    ys: u16,
    xe: u16,
    ye: u16,
    x: u16,
    y: u16,
}

impl Cursor {
    fn new(xs: u16, ys: u16, xe: u16, ye: u16) -> Self {
        Self {
            xs,
            ys,
            xe,
            ye,
            x: xs,
            y: ys,
        }
    }
}

fn push_be(frame: &mut Vec<u8>, v: u16) {
    frame.extend_from_slice(&v.to_be_bytes());
}

/// Pixel command protocol over the serial bus.
///
/// Every public drawing call runs inside [`Panel::start_write`] /
/// [`Panel::end_write`], so calls made inside an outer bracket share one bus
/// transaction.
pub struct Panel<S, C> {
    bus: S,
    clock: C,
    config: PanelConfig,
    depth: ColorDepth,
    rotation: u8,
    internal: Rotation,
    width: u16,
    height: u16,
    window: Window,
    raw_color: Option<u32>,
    cursor: Cursor,
    pacer: Pacer,
    start_count: usize,
    resolution: Resolution,
}

impl<S: SerialBus, C: Clock> Panel<S, C> {
    pub fn new(bus: S, clock: C, config: PanelConfig) -> Self {
        let (w, h) = (config.panel_width, config.panel_height);
        let mut panel = Self {
            bus,
            clock,
            depth: config.color_depth,
            rotation: 0,
            internal: Rotation::default(),
            width: w,
            height: h,
            window: Window::default(),
            raw_color: None,
            cursor: Cursor::new(0, 0, w.saturating_sub(1), h.saturating_sub(1)),
            pacer: Pacer::new(config.poll_limit),
            start_count: 0,
            resolution: Resolution {
                logical_width: w,
                logical_height: h,
                output_width: w,
                output_height: h,
                scale_w: 1,
                scale_h: 1,
                ..Resolution::default()
            },
            config,
        };
        panel.set_rotation(panel.config.rotation);
        panel
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn bus(&self) -> &S {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut S {
        &mut self.bus
    }

    pub fn into_inner(self) -> S {
        self.bus
    }

    /// Logical width under the current rotation.
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn color_depth(&self) -> ColorDepth {
        self.depth
    }

    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        self.bus.begin_transaction()?;
        self.bus.cs(false)?;
        self.pacer.reset();
        Ok(())
    }

    pub fn end_transaction(&mut self) -> Result<()> {
        self.pacer.reset();
        self.bus.wait()?;
        self.bus.cs(true)?;
        self.bus.end_transaction()
    }

    pub fn start_write(&mut self) -> Result<()> {
        self.start_count += 1;
        if self.start_count == 1 {
            self.begin_transaction()?;
        }
        Ok(())
    }

    pub fn end_write(&mut self) -> Result<()> {
        if self.start_count == 0 {
            return Ok(());
        }
        self.start_count -= 1;
        if self.start_count == 0 {
            self.end_transaction()?;
        }
        Ok(())
    }

    fn bracket<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.start_write()?;
        let result = f(self);
        let end = self.end_write();
        let value = result?;
        end?;
        Ok(value)
    }

    fn check_repeat(&mut self, cmd: u8) -> Result<bool> {
        self.pacer.check_repeat(&mut self.bus, &mut self.clock, cmd)
    }

    fn invalidate(&mut self) {
        self.window = Window::default();
        self.raw_color = None;
        self.pacer.reset();
    }

    /// Pick the closest supported depth. Reads always use the same depth.
    pub fn set_color_depth(&mut self, bits: u8) -> ColorDepth {
        self.depth = ColorDepth::from_bits(bits);
        self.raw_color = None;
        self.depth
    }

    pub fn set_rotation(&mut self, rotation: u8) {
        self.rotation = rotation & 7;
        self.internal = Rotation::new(self.rotation, self.config.offset_rotation);
        self.width = self.config.panel_width;
        self.height = self.config.panel_height;
        if self.internal.swaps_axes() {
            (self.width, self.height) = (self.height, self.width);
        }
    }

    /// Change the logical size. Nothing is sent to the device; the output
    /// timing is fixed by the transmitter program.
    pub fn set_resolution(&mut self, requested: Resolution) -> Result<Resolution, ResolutionError> {
        let res = requested.resolve()?;
        for (axis, logical, memory) in [
            (Axis::Width, res.logical_width, self.config.memory_width),
            (Axis::Height, res.logical_height, self.config.memory_height),
        ] {
            if logical > memory {
                return Err(ResolutionError::ExceedsMemory {
                    axis,
                    logical,
                    memory,
                });
            }
        }

        self.config.panel_width = res.logical_width;
        self.config.panel_height = res.logical_height;
        self.resolution = res;
        self.set_rotation(self.rotation);
        self.cursor = Cursor::new(
            0,
            0,
            self.width.saturating_sub(1),
            self.height.saturating_sub(1),
        );
        debug!(?res, "resolution changed");
        Ok(res)
    }

    pub fn set_window(&mut self, xs: u16, ys: u16, xe: u16, ye: u16) -> Result<()> {
        self.cursor = Cursor::new(xs, ys, xe, ye);
        self.bracket(|p| p.write_window(xs, ys, xe, ye))
    }

    fn write_window(&mut self, xs: u16, ys: u16, xe: u16, ye: u16) -> Result<()> {
        let mut frame = Vec::with_capacity(10);
        if self.window.cols != Some((xs, xe)) {
            self.window.cols = Some((xs, xe));
            frame.push(commands::CASET);
            push_be(&mut frame, xs);
            push_be(&mut frame, xe);
        }
        if self.window.rows != Some((ys, ye)) {
            self.window.rows = Some((ys, ye));
            frame.push(commands::RASET);
            push_be(&mut frame, ys);
            push_be(&mut frame, ye);
        }
        if !frame.is_empty() {
            self.check_repeat(0)?;
            debug!(frame = %SpaceHex(&frame), "window");
            self.bus.write_bytes(&frame)?;
        }
        Ok(())
    }

    pub fn fill_rect(&mut self, x: u16, y: u16, w: u16, h: u16, raw: u32) -> Result<()> {
        self.bracket(|p| p.fill_cached(x, y, w, h, raw))
    }

    pub fn draw_pixel(&mut self, x: u16, y: u16, raw: u32) -> Result<()> {
        self.bracket(|p| p.fill_cached(x, y, 1, 1, raw))
    }

    /// Blend a rectangle with an ARGB8888 color.
    pub fn fill_rect_alpha(&mut self, x: u16, y: u16, w: u16, h: u16, argb: u32) -> Result<()> {
        self.bracket(|p| {
            let result = p.fill_frame(x, y, w, h, argb.swap_bytes(), 4);
            p.raw_color = None;
            result
        })
    }

    fn fill_cached(&mut self, x: u16, y: u16, w: u16, h: u16, raw: u32) -> Result<()> {
        let bytes = if self.raw_color == Some(raw) {
            0
        } else {
            self.raw_color = Some(raw);
            self.depth.bytes()
        };
        self.fill_frame(x, y, w, h, raw, bytes)
    }

    fn fill_frame(&mut self, x: u16, y: u16, w: u16, h: u16, raw: u32, bytes: usize) -> Result<()> {
        let rect = w > 1 || h > 1;
        let Rect { x, y, w, h } = self.internal.map(Rect::new(x, y, w, h), self.width, self.height);
        let x = x.wrapping_add(self.config.offset_x);
        let y = y.wrapping_add(self.config.offset_y);

        let family = if rect {
            commands::FILLRECT
        } else {
            commands::DRAWPIXEL
        };
        let mut frame = Vec::with_capacity(13);
        frame.push(with_len(family, bytes));
        push_be(&mut frame, x);
        push_be(&mut frame, y);
        if rect {
            push_be(&mut frame, x.wrapping_add(w).wrapping_sub(1));
            push_be(&mut frame, y.wrapping_add(h).wrapping_sub(1));
        }
        frame.extend_from_slice(&raw.to_le_bytes()[..bytes]);

        self.check_repeat(0)?;
        debug!(frame = %SpaceHex(&frame), "fill");
        self.bus.write_bytes(&frame)?;

        if rect {
            let now = self.clock.now();
            self.pacer.set_busy(now, timing::fill_busy_us(w, h));
        }
        Ok(())
    }

    /// Fill `length` pixels from the block cursor onwards, wrapping at the
    /// edges of the last window set.
    pub fn write_block(&mut self, raw: u32, length: u32) -> Result<()> {
        self.bracket(|p| p.write_block_inner(raw, length))
    }

    fn write_block_inner(&mut self, raw: u32, mut length: u32) -> Result<()> {
        let Cursor { xs, ys, xe, ye, .. } = self.cursor;
        if xs > xe || ys > ye {
            warn!(xs, ys, xe, ye, "block fill into an empty window");
            return Ok(());
        }
        while length > 0 {
            let Cursor { x, y, .. } = self.cursor;
            if x > xe || y > ye {
                self.cursor.x = xs;
                self.cursor.y = ys;
                continue;
            }

            let w = length.min(u32::from(xe - x) + 1);
            let mut h = 1;
            if length >= w * 2 && x == xs {
                h = (length / w).min(u32::from(ye - y) + 1);
            }
            // both fit: w is bounded by the window width and h by its height
            self.fill_cached(x, y, w as u16, h as u16, raw)?;

            let next = u32::from(x) + w;
            if next <= u32::from(xe) {
                self.cursor.x = next as u16;
                return Ok(());
            }
            self.cursor.x = xs;
            let next = u32::from(y) + h;
            self.cursor.y = if next > u32::from(ye) { ys } else { next as u16 };
            length -= w * h;
        }
        Ok(())
    }

    fn start_raw(&mut self, cmd: u8) -> Result<()> {
        if !self.check_repeat(cmd)? {
            self.bus.write_command(cmd.into(), Bits(8))?;
        }
        Ok(())
    }

    fn stream(&mut self, pixels: Pixels<'_>) -> Result<()> {
        match pixels {
            Pixels::Raw(b) => self.bus.write_bytes(b),
            Pixels::Rgb(p) => {
                let mut buf = Vec::new();
                self.depth.encode(p, &mut buf);
                self.bus.write_bytes(&buf)
            }
        }
    }

    /// Stream pixels into the current window.
    pub fn write_pixels(&mut self, pixels: Pixels<'_>) -> Result<()> {
        self.bracket(|p| {
            p.raw_color = None;
            p.start_raw(with_len(commands::WRITE_RAW, p.depth.bytes()))?;
            p.stream(pixels)
        })
    }

    pub fn write_image(&mut self, x: u16, y: u16, w: u16, h: u16, image: &Image<'_>) -> Result<()> {
        if w == 0 || h == 0 {
            return Ok(());
        }
        let (wu, hu) = (usize::from(w), usize::from(h));
        let needed = (hu - 1) * image.stride + wu;
        let available = image.pixels.pixel_count(self.depth);
        if image.stride < wu || available < needed {
            bail!("image holds {available} pixels with stride {}, {w}x{h} needs {needed}", image.stride);
        }

        self.bracket(|p| {
            let result = match image.transparent {
                None => p.write_image_opaque(x, y, w, h, image),
                Some(key) => p.write_image_keyed(x, y, w, h, image, key),
            };
            p.raw_color = None;
            result
        })
    }

    fn write_image_opaque(&mut self, x: u16, y: u16, w: u16, h: u16, image: &Image<'_>) -> Result<()> {
        let (wu, hu) = (usize::from(w), usize::from(h));
        self.write_window(x, y, x.wrapping_add(w - 1), y.wrapping_add(h - 1))?;

        // contiguous rows go out in one piece
        let (row_len, rows) = if image.stride == wu || hu == 1 {
            (wu * hu, 1)
        } else {
            (wu, hu)
        };
        self.start_raw(with_len(commands::WRITE_RAW, self.depth.bytes()))?;
        for row in 0..rows {
            let Some(px) = image.pixels.range(self.depth, row * image.stride, row_len) else {
                bail!("image row {row} out of range");
            };
            self.stream(px)?;
        }
        Ok(())
    }

    fn write_image_keyed(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        image: &Image<'_>,
        key: u32,
    ) -> Result<()> {
        let depth = self.depth;
        let mask = Bits::from(Bytes(depth.bytes() as u8)).mask();
        let key = key & mask;
        let cmd = with_len(commands::WRITE_RAW, depth.bytes());
        let opaque = |idx: usize| image.pixels.raw_at(depth, idx).is_some_and(|raw| raw != key);

        for row in 0..h {
            let base = usize::from(row) * image.stride;
            let mut i = 0;
            while i < w {
                while i < w && !opaque(base + usize::from(i)) {
                    i += 1;
                }
                let start = i;
                while i < w && opaque(base + usize::from(i)) {
                    i += 1;
                }
                if start == i {
                    break;
                }

                trace!(row, start, end = i, "opaque span");
                let (ys, xe) = (y.wrapping_add(row), x.wrapping_add(i - 1));
                self.write_window(x.wrapping_add(start), ys, xe, ys)?;
                self.start_raw(cmd)?;
                let Some(px) = image
                    .pixels
                    .range(depth, base + usize::from(start), usize::from(i - start))
                else {
                    bail!("image row {row} out of range");
                };
                self.stream(px)?;
            }
        }
        Ok(())
    }

    /// One row of ARGB8888 pixels, alpha blended by the device.
    pub fn write_image_argb(&mut self, x: u16, y: u16, argb: &[u32]) -> Result<()> {
        let Ok(w) = u16::try_from(argb.len()) else {
            bail!("{} pixels do not fit in one row", argb.len());
        };
        if w == 0 {
            return Ok(());
        }
        self.bracket(|p| {
            p.write_window(x, y, x.wrapping_add(w - 1), y)?;
            p.start_raw(commands::WRITE_RAW_32)?;
            for px in argb {
                p.bus.write_command(px.swap_bytes(), Bits(32))?;
            }
            p.raw_color = None;
            Ok(())
        })
    }

    /// Read a rectangle in the wire format of the current depth.
    ///
    /// Inside an outer write bracket the bus transaction is restarted
    /// afterwards, which drops every cache.
    pub fn read_rect_raw(&mut self, x: u16, y: u16, w: u16, h: u16, dst: &mut [u8]) -> Result<()> {
        let len = usize::from(w) * usize::from(h) * self.depth.bytes();
        if dst.len() < len {
            bail!("read buffer holds {} bytes, {w}x{h} needs {len}", dst.len());
        }
        if len == 0 {
            return Ok(());
        }

        self.bracket(|p| {
            for _ in 0..READ_RETRY {
                p.check_repeat(0)?;
                if p.pacer.free_count() == FREE_MAX {
                    break;
                }
            }
            p.write_window(x, y, x.wrapping_add(w - 1), y.wrapping_add(h - 1))?;
            p.bus
                .write_command(with_len(commands::READ_RAW, p.depth.bytes()).into(), Bits(8))?;
            p.bus.begin_read()?;
            p.bus.read_bytes(&mut dst[..len])?;
            p.bus.end_read()
        })?;

        if self.start_count > 0 {
            self.bus.end_transaction()?;
            self.bus.begin_transaction()?;
            self.invalidate();
        }
        Ok(())
    }

    pub fn read_rect(&mut self, x: u16, y: u16, w: u16, h: u16, dst: &mut [Rgb]) -> Result<()> {
        let mut raw = vec![0; usize::from(w) * usize::from(h) * self.depth.bytes()];
        self.read_rect_raw(x, y, w, h, &mut raw)?;
        self.depth.decode(&raw, dst);
        Ok(())
    }

    /// Copy a rectangle in device coordinates. When the source does not lie
    /// strictly below the destination the copy bounces through the scratch
    /// rows past `memory_height`.
    pub fn copy_rect(&mut self, dst_x: u16, dst_y: u16, w: u16, h: u16, src_x: u16, src_y: u16) -> Result<()> {
        let xe = src_x.wrapping_add(w).wrapping_sub(1);
        let ye = src_y.wrapping_add(h).wrapping_sub(1);
        let direct = src_y > dst_y;

        let mut frame = Vec::with_capacity(26);
        frame.push(commands::COPYRECT);
        for v in [src_x, src_y, xe, ye] {
            push_be(&mut frame, v);
        }
        if !direct {
            let mh = self.config.memory_height;
            let scratch_y = mh.wrapping_add(src_y);
            push_be(&mut frame, src_x);
            push_be(&mut frame, scratch_y);
            frame.push(commands::COPYRECT);
            for v in [src_x, scratch_y, xe, mh.wrapping_add(ye)] {
                push_be(&mut frame, v);
            }
        }
        push_be(&mut frame, dst_x);
        push_be(&mut frame, dst_y);

        self.bracket(|p| {
            p.check_repeat(0)?;
            debug!(frame = %SpaceHex(&frame), direct, "copy");
            p.bus.write_bytes(&frame)?;
            let now = p.clock.now();
            p.pacer.set_busy(now, timing::copy_busy_us(w, h, direct));
            Ok(())
        })
    }

    fn poll_until(&mut self, what: &str, done: impl Fn(u32) -> bool) -> Result<u32> {
        let mut polls = 0usize;
        loop {
            let v = self.bus.read_data(Bits(8))?;
            if done(v) {
                return Ok(v);
            }
            polls += 1;
            if self.config.poll_limit.is_some_and(|limit| polls >= limit) {
                warn!(polls, "gave up waiting for {what}");
                return Ok(v);
            }
        }
    }

    /// Wait for the FPGA to come out of configuration, then read its ID.
    pub fn read_fpga_id(&mut self) -> Result<u32> {
        info!("waiting for the FPGA to become idle");
        self.begin_transaction()?;
        self.bus.begin_read()?;
        self.poll_until("idle", |v| v == 0xff)?;
        self.bus.end_read()?;
        self.bus.cs(true)?;

        info!("reading FPGA ID");
        self.bus.cs(false)?;
        self.bus.write_command(commands::READ_ID.into(), Bits(8))?;
        self.bus.begin_read()?;
        self.poll_until("ID", |v| v != 0)?;
        let id = self.bus.read_data(Bits(32))?;
        info!(id = %Hex(id.to_le_bytes()), "FPGA ID");
        self.bus.end_read()?;
        self.end_transaction()?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use atomhdmi_io::fake_backend::{FakeClock, FakeSerialBus, Op};

    use super::*;

    fn panel() -> Panel<FakeSerialBus, FakeClock> {
        Panel::new(FakeSerialBus::new(), FakeClock::new(), PanelConfig::default())
    }

    fn opcodes(panel: &Panel<FakeSerialBus, FakeClock>) -> Vec<u32> {
        panel
            .bus()
            .ops()
            .iter()
            .filter_map(|op| match op {
                Op::Command { data, len: Bits(8) } => Some(*data),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_window_sent_once() {
        let mut p = panel();
        p.set_window(0, 0, 99, 49).unwrap();
        p.set_window(0, 0, 99, 49).unwrap();
        assert_eq!(
            p.bus().writes(),
            [vec![0x20, 0, 0, 0, 99, 0x21, 0, 0, 0, 49]]
        );
    }

    #[test]
    fn test_window_rows_only() {
        let mut p = panel();
        p.set_window(0, 0, 99, 49).unwrap();
        p.set_window(0, 300, 99, 0x1ff).unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1], [0x21, 0x01, 0x2c, 0x01, 0xff]);
    }

    #[test]
    fn test_raw_write_opcode_once() {
        let mut p = panel();
        p.start_write().unwrap();
        p.write_pixels(Pixels::Raw(&[1, 2, 3, 4])).unwrap();
        p.write_pixels(Pixels::Raw(&[5, 6])).unwrap();
        p.end_write().unwrap();
        assert_eq!(opcodes(&p), [0x42]);
        assert_eq!(
            p.bus().writes(),
            [vec![0x42], vec![1, 2, 3, 4], vec![5, 6]]
        );
    }

    #[test]
    fn test_raw_write_after_fill_resends_opcode() {
        let mut p = panel();
        p.start_write().unwrap();
        p.write_pixels(Pixels::Raw(&[1, 2])).unwrap();
        p.draw_pixel(0, 0, 0x1234).unwrap();
        p.write_pixels(Pixels::Raw(&[1, 2])).unwrap();
        p.end_write().unwrap();
        assert_eq!(opcodes(&p), [0x42, 0x42]);
    }

    #[test]
    fn test_copy_direct() {
        let mut p = panel();
        p.copy_rect(0, 5, 16, 8, 0, 10).unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0],
            [0x23, 0, 0, 0, 10, 0, 15, 0, 17, 0, 0, 0, 5]
        );
    }

    #[test]
    fn test_copy_through_scratch() {
        let mut p = panel();
        p.copy_rect(0, 10, 16, 8, 0, 5).unwrap();
        let frame = &p.bus().writes()[0];
        assert_eq!(frame.len(), 26);
        // 720 + 5 = 0x2d5, 720 + 12 = 0x2dc
        assert_eq!(
            frame[..],
            [
                0x23, 0, 0, 0, 5, 0, 15, 0, 12, //
                0, 0, 0x02, 0xd5, //
                0x23, 0, 0, 0x02, 0xd5, 0, 15, 0x02, 0xdc, //
                0, 0, 0, 10,
            ]
        );
    }

    #[test]
    fn test_fill_color_cache() {
        let mut p = panel();
        p.fill_rect(1, 2, 3, 4, 0xabcd).unwrap();
        p.fill_rect(1, 2, 3, 4, 0xabcd).unwrap();
        p.fill_rect(1, 2, 3, 4, 0x1234).unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes[0], [0x5a, 0, 1, 0, 2, 0, 3, 0, 5, 0xcd, 0xab]);
        assert_eq!(writes[1], [0x58, 0, 1, 0, 2, 0, 3, 0, 5]);
        assert_eq!(writes[2], [0x5a, 0, 1, 0, 2, 0, 3, 0, 5, 0x34, 0x12]);
    }

    #[test]
    fn test_draw_pixel_frame() {
        let mut p = panel();
        p.set_color_depth(24);
        p.draw_pixel(0x123, 0x45, 0x030201).unwrap();
        assert_eq!(
            p.bus().writes(),
            [vec![0x53, 0x01, 0x23, 0x00, 0x45, 1, 2, 3]]
        );
    }

    #[test]
    fn test_fill_offset() {
        let mut p = Panel::new(
            FakeSerialBus::new(),
            FakeClock::new(),
            PanelConfig {
                offset_x: 8,
                offset_y: 16,
                ..PanelConfig::default()
            },
        );
        p.draw_pixel(0, 0, 0).unwrap();
        assert_eq!(p.bus().writes()[0][..5], [0x52, 0, 8, 0, 16]);
    }

    #[test]
    fn test_rotation_swaps_axes() {
        let mut plain = panel();
        plain.fill_rect(10, 20, 30, 40, 0).unwrap();

        let mut rotated = panel();
        rotated.set_rotation(5);
        assert_eq!((rotated.width(), rotated.height()), (720, 1280));
        rotated.fill_rect(10, 20, 30, 40, 0).unwrap();

        let plain = &plain.bus().writes()[0];
        let rotated = &rotated.bus().writes()[0];
        // x, y swapped and the end point follows the swapped w, h
        assert_eq!(plain[1..9], [0, 10, 0, 20, 0, 39, 0, 59]);
        assert_eq!(rotated[1..9], [0, 20, 0, 10, 0, 59, 0, 39]);
    }

    #[test]
    fn test_fill_alpha() {
        let mut p = panel();
        p.fill_rect_alpha(0, 0, 2, 2, 0x80ff_0000).unwrap();
        p.fill_rect(0, 0, 2, 2, 0x00ff).unwrap();
        p.fill_rect(0, 0, 2, 2, 0x00ff).unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes[0][0], 0x5c);
        assert_eq!(writes[0][9..], [0x80, 0xff, 0x00, 0x00]);
        assert_eq!(writes[1].len(), 11);
        assert_eq!(writes[2].len(), 9);
    }

    #[test]
    fn test_fill_waits_before_next_command() {
        let mut p = panel();
        p.fill_rect(0, 0, 100, 10, 0).unwrap();
        p.bus_mut().take_ops();
        p.set_window(0, 0, 9, 9).unwrap();

        let ops = p.bus().ops();
        let read = ops.iter().position(|op| *op == Op::BeginRead).unwrap();
        let write = ops
            .iter()
            .position(|op| matches!(op, Op::Bytes(_)))
            .unwrap();
        assert!(read < write);
        // 75us estimate, minus the poll margin
        assert_eq!(p.clock.delays(), [Duration::from_micros(67)]);
    }

    #[test]
    fn test_write_block() {
        let mut p = panel();
        p.set_window(0, 0, 9, 9).unwrap();
        p.write_block(0x1111, 25).unwrap();
        p.write_block(0x1111, 5).unwrap();
        let writes = p.bus().writes();
        // 10x2, then the start of the third row, then the rest of it
        assert_eq!(writes[1], [0x5a, 0, 0, 0, 0, 0, 9, 0, 1, 0x11, 0x11]);
        assert_eq!(writes[2], [0x58, 0, 0, 0, 2, 0, 4, 0, 2]);
        assert_eq!(writes[3], [0x58, 0, 5, 0, 2, 0, 9, 0, 2]);
    }

    #[test]
    fn test_write_block_wraps() {
        let mut p = panel();
        p.set_window(0, 0, 3, 1).unwrap();
        p.write_block(0, 8).unwrap();
        p.write_block(0, 4).unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes[1][1..9], [0, 0, 0, 0, 0, 3, 0, 1]);
        // back at the top left
        assert_eq!(writes[2][1..9], [0, 0, 0, 0, 0, 3, 0, 0]);
    }

    #[test]
    fn test_write_image_flattened() {
        let mut p = panel();
        let data: Vec<u8> = (0..24).collect();
        p.write_image(4, 4, 3, 4, &Image::new(Pixels::Raw(&data), 3))
            .unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], [0x20, 0, 4, 0, 6, 0x21, 0, 4, 0, 7]);
        assert_eq!(writes[1], [0x42]);
        assert_eq!(writes[2], data);
    }

    #[test]
    fn test_write_image_strided() {
        let mut p = panel();
        p.set_color_depth(8);
        let data: Vec<u8> = (0..12).collect();
        p.write_image(0, 0, 2, 3, &Image::new(Pixels::Raw(&data), 4))
            .unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes[1], [0x41]);
        assert_eq!(writes[2..], [vec![0, 1], vec![4, 5], vec![8, 9]]);
    }

    #[test]
    fn test_write_image_transparent_spans() {
        let mut p = panel();
        p.set_color_depth(8);
        let data = [0, 7, 7, 0, 7, 0];
        let image = Image::new(Pixels::Raw(&data), 6).with_transparent(0);
        p.write_image(10, 3, 6, 1, &image).unwrap();
        let writes = p.bus().writes();
        assert_eq!(
            writes,
            [
                vec![0x20, 0, 11, 0, 12, 0x21, 0, 3, 0, 3],
                vec![0x41],
                vec![7, 7],
                vec![0x20, 0, 14, 0, 14],
                vec![0x41],
                vec![7],
            ]
        );
    }

    #[test]
    fn test_write_image_keyed_wraps_at_edge() {
        let mut p = panel();
        p.set_color_depth(8);
        let data = [7, 7];
        let image = Image::new(Pixels::Raw(&data), 2).with_transparent(0);
        p.write_image(u16::MAX, 0, 2, 1, &image).unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes[0], [0x20, 0xff, 0xff, 0, 0, 0x21, 0, 0, 0, 0]);
        assert_eq!(writes[2], [7, 7]);
    }

    #[test]
    fn test_write_image_short_source() {
        let mut p = panel();
        let data = [0u8; 4];
        assert!(p
            .write_image(0, 0, 2, 2, &Image::new(Pixels::Raw(&data), 2))
            .is_err());
        assert!(p.bus().ops().is_empty());
    }

    #[test]
    fn test_write_pixels_converted() {
        let mut p = panel();
        p.write_pixels(Pixels::Rgb(&[Rgb::new(0xff, 0, 0)])).unwrap();
        assert_eq!(p.bus().writes(), [vec![0x42], vec![0xf8, 0x00]]);
    }

    #[test]
    fn test_write_image_argb() {
        let mut p = panel();
        p.write_image_argb(0, 0, &[0x11223344, 0x55667788]).unwrap();
        let words: Vec<u32> = p
            .bus()
            .ops()
            .iter()
            .filter_map(|op| match op {
                Op::Command { data, len: Bits(32) } => Some(*data),
                _ => None,
            })
            .collect();
        assert_eq!(words, [0x44332211, 0x88776655]);
        assert_eq!(opcodes(&p), [0x44]);
        // A, R, G, B on the wire
        assert_eq!(p.bus().writes()[2], [0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_read_rect() {
        let mut p = panel();
        p.bus_mut().queue_read([0xaa, 0xbb, 0xcc, 0xdd]);
        let mut buf = [0; 4];
        p.read_rect_raw(0, 0, 2, 1, &mut buf).unwrap();
        assert_eq!(buf, [0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(opcodes(&p), [0x62]);
    }

    #[test]
    fn test_read_waits_for_fill() {
        let mut p = panel();
        p.fill_rect(0, 0, 200, 200, 0).unwrap();
        p.bus_mut().take_ops();
        let mut buf = [0; 2];
        p.read_rect_raw(0, 0, 1, 1, &mut buf).unwrap();

        let ops = p.bus().ops();
        let begin = ops.iter().position(|op| *op == Op::BeginRead).unwrap();
        let end = ops.iter().position(|op| *op == Op::EndRead).unwrap();
        let window = ops
            .iter()
            .position(|op| matches!(op, Op::Bytes(b) if b[0] == 0x20))
            .unwrap();
        let read = ops
            .iter()
            .position(|op| {
                *op == Op::Command {
                    data: 0x62,
                    len: Bits(8),
                }
            })
            .unwrap();
        // the device drained before the window and the read opcode went out
        assert!(begin < end);
        assert!(end < window);
        assert!(window < read);
    }

    #[test]
    fn test_read_restarts_outer_transaction() {
        let mut p = panel();
        p.start_write().unwrap();
        p.set_window(0, 0, 1, 0).unwrap();
        p.fill_rect(0, 0, 1, 1, 5).unwrap();
        let mut buf = [0; 4];
        p.read_rect_raw(0, 0, 2, 1, &mut buf).unwrap();

        let ops = p.bus().ops();
        assert_eq!(ops[ops.len() - 2..], [Op::EndTransaction, Op::BeginTransaction]);

        // every cache was dropped
        p.bus_mut().take_ops();
        p.set_window(0, 0, 1, 0).unwrap();
        p.fill_rect(0, 0, 1, 1, 5).unwrap();
        let writes = p.bus().writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].len(), 7);
        p.end_write().unwrap();
    }

    #[test]
    fn test_read_rect_converted() {
        let mut p = panel();
        p.bus_mut().queue_read([0x07, 0xe0]);
        let mut px = [Rgb::default(); 1];
        p.read_rect(0, 0, 1, 1, &mut px).unwrap();
        assert_eq!(px, [Rgb::new(0, 0xff, 0)]);
    }

    #[test]
    fn test_nested_brackets() {
        let mut p = panel();
        p.start_write().unwrap();
        p.fill_rect(0, 0, 1, 1, 0).unwrap();
        p.fill_rect(0, 0, 1, 1, 1).unwrap();
        p.end_write().unwrap();
        let begins = p
            .bus()
            .ops()
            .iter()
            .filter(|op| **op == Op::BeginTransaction)
            .count();
        assert_eq!(begins, 1);
        assert_eq!(p.bus().ops().last(), Some(&Op::EndTransaction));
        // unbalanced end is ignored
        p.end_write().unwrap();
    }

    #[test]
    fn test_color_depth() {
        let mut p = panel();
        assert_eq!(p.set_color_depth(32), ColorDepth::Rgb888);
        assert_eq!(p.set_color_depth(12), ColorDepth::Rgb332);
        assert_eq!(p.set_color_depth(16), ColorDepth::Rgb565);
    }

    #[test]
    fn test_set_resolution() {
        let mut p = panel();
        let res = p
            .set_resolution(Resolution {
                logical_width: 640,
                logical_height: 360,
                ..Resolution::default()
            })
            .unwrap();
        assert_eq!(res.output_width, 640);
        assert_eq!((p.width(), p.height()), (640, 360));
        p.set_rotation(1);
        assert_eq!((p.width(), p.height()), (360, 640));

        let err = p
            .set_resolution(Resolution {
                logical_width: 1920,
                logical_height: 1080,
                ..Resolution::default()
            })
            .unwrap_err();
        assert!(matches!(err, ResolutionError::ExceedsMemory { .. }));
        assert_eq!(p.resolution(), res);
    }

    #[test]
    fn test_fpga_id() {
        let mut p = panel();
        p.bus_mut()
            .queue_read([0x00, 0x00, 0xff, 0x00, 0x01, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(p.read_fpga_id().unwrap(), 0x12345678);
        assert_eq!(opcodes(&p), [u32::from(commands::READ_ID)]);
    }
}
