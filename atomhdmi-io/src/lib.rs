mod backend;
pub mod bitclock;
pub mod clock;
mod controller;
pub mod fake_backend;
pub mod jtag;
pub mod units;
mod utils;

pub use crate::{
    backend::{Line, Pins, RegisterBus, SerialBus},
    bitclock::BitClock,
    clock::{Clock, StdClock},
    controller::TapController,
    utils::{Hex, ShortHex, SpaceHex},
};
