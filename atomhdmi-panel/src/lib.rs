//! Driver for an HDMI output module: a Gowin FPGA holding the framebuffer,
//! fed pixel commands over a serial bus, and an HDMI transmitter configured
//! over a two-wire register bus.

pub mod color;
pub mod commands;
pub mod config;
mod device;
mod error;
mod panel;
pub mod rotation;
pub mod timing;
pub mod transmitter;

pub use crate::{
    color::{ColorDepth, Rgb},
    config::{PanelConfig, Resolution, TransmitterConfig},
    device::{BringupReport, Device},
    error::{Axis, ResolutionError, TransmitterError},
    panel::{Image, Panel, Pixels},
    transmitter::{ChipId, Transmitter},
};
