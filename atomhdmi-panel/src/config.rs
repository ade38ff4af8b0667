use std::time::Duration;

use crate::{
    color::ColorDepth,
    error::{Axis, ResolutionError},
};

/// Geometry and defaults of the pixel command side.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelConfig {
    /// Logical size at rotation 0.
    pub panel_width: u16,
    pub panel_height: u16,
    /// Frame memory size. `memory_height` doubles as the row offset of the
    /// scratch area used by overlapping copies.
    pub memory_width: u16,
    pub memory_height: u16,
    pub offset_x: u16,
    pub offset_y: u16,
    pub offset_rotation: u8,
    pub rotation: u8,
    pub color_depth: ColorDepth,
    /// Give up busy polling after this many reads. `None` polls forever.
    pub poll_limit: Option<usize>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            panel_width: 1280,
            panel_height: 720,
            memory_width: 1280,
            memory_height: 720,
            offset_x: 0,
            offset_y: 0,
            offset_rotation: 0,
            rotation: 0,
            color_depth: ColorDepth::Rgb565,
            poll_limit: None,
        }
    }
}

/// Retry budgets for the transmitter bring-up. The bus address belongs to
/// the [`RegisterBus`](atomhdmi_io::RegisterBus) implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransmitterConfig {
    /// Attempts per register write, the first one included.
    pub write_attempts: usize,
    pub retry_delay: Duration,
    pub pll_attempts: usize,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            write_attempts: 4,
            retry_delay: Duration::from_millis(1),
            pll_attempts: 8,
        }
    }
}

/// Requested display mode. Zero in any of the output or scale fields means
/// "derive it".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub logical_width: u16,
    pub logical_height: u16,
    /// Zero picks the output's native rate.
    pub refresh_rate: f32,
    pub output_width: u16,
    pub output_height: u16,
    pub scale_w: u8,
    pub scale_h: u8,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            logical_width: 1280,
            logical_height: 720,
            refresh_rate: 0.0,
            output_width: 0,
            output_height: 0,
            scale_w: 0,
            scale_h: 0,
        }
    }
}

fn resolve_axis(
    axis: Axis,
    logical: u16,
    output: u16,
    scale: u8,
) -> Result<(u16, u8), ResolutionError> {
    if logical == 0 {
        return Err(ResolutionError::Zero(axis));
    }
    let scaled = |scale: u8| {
        logical
            .checked_mul(scale.into())
            .ok_or(ResolutionError::Overflow {
                axis,
                logical,
                scale,
            })
    };

    match (output, scale) {
        (0, 0) => Ok((logical, 1)),
        (0, scale) => Ok((scaled(scale)?, scale)),
        (output, 0) => {
            let scale = u8::try_from(output / logical).unwrap_or(u8::MAX);
            if scale == 0 {
                return Err(ResolutionError::ExceedsOutput {
                    axis,
                    logical,
                    scale: 1,
                    output,
                });
            }
            Ok((output, scale))
        }
        (output, scale) => {
            if scaled(scale)? > output {
                return Err(ResolutionError::ExceedsOutput {
                    axis,
                    logical,
                    scale,
                    output,
                });
            }
            Ok((output, scale))
        }
    }
}

impl Resolution {
    /// Fill in every derived field, or explain why the combination is not
    /// achievable.
    pub fn resolve(&self) -> Result<Self, ResolutionError> {
        if !self.refresh_rate.is_finite() || self.refresh_rate < 0.0 {
            return Err(ResolutionError::RefreshRate(self.refresh_rate));
        }
        let (output_width, scale_w) =
            resolve_axis(Axis::Width, self.logical_width, self.output_width, self.scale_w)?;
        let (output_height, scale_h) = resolve_axis(
            Axis::Height,
            self.logical_height,
            self.output_height,
            self.scale_h,
        )?;
        Ok(Self {
            output_width,
            output_height,
            scale_w,
            scale_h,
            ..*self
        })
    }
}
