use std::time::Duration;

use eyre::Result;
use tracing::{trace, warn};

use crate::{
    BitClock, Clock, Pins,
    jtag::{self, State},
};

/// TAP state machine on top of a [`BitClock`].
///
/// Only the transitions listed in [`jtag::TRANSITIONS`] are supported.
/// Asking for any other one logs a warning and does nothing, leaving the
/// tracked state untouched.
pub struct TapController<P> {
    clk: BitClock<P>,
    state: State,
}

impl<P: Pins> TapController<P> {
    pub fn new(pins: P) -> Result<Self> {
        Ok(Self {
            clk: BitClock::new(pins)?,
            state: State::Unknown,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn bit_clock(&mut self) -> &mut BitClock<P> {
        &mut self.clk
    }

    pub fn pins(&self) -> &P {
        self.clk.pins()
    }

    pub fn into_inner(self) -> P {
        self.clk.into_inner()
    }

    pub fn move_to(&mut self, to: State) -> Result<()> {
        let from = self.state;
        let Some(path) = jtag::path(from, to) else {
            warn!(%from, %to, "unsupported tap transition, ignoring");
            return Ok(());
        };
        trace!(%from, %to, %path);

        if path.high != 0 {
            self.clk.tms(true)?;
            self.clk.pulses_n(path.high.into())?;
        }
        self.clk.tms(false)?;
        self.clk.pulses_n(path.low.into())?;

        self.state = to;
        Ok(())
    }

    /// Clock `byte` out on TDI, MSB first, `repeat` times over.
    ///
    /// TDI is only driven when the level changes from the previous bit. With
    /// `exit`, TMS goes high for the very last bit, leaving the shift state.
    /// `lsb_first` reverses the byte before clocking.
    pub fn write_bits(&mut self, byte: u8, exit: bool, lsb_first: bool, repeat: usize) -> Result<()> {
        let byte = if lsb_first { byte.reverse_bits() } else { byte };

        self.clk.tms(false)?;
        let mut prev = None;
        for rep in (0..repeat).rev() {
            for bit in (0..8).rev() {
                if exit && bit == 0 && rep == 0 {
                    self.clk.tms(true)?;
                }
                let level = byte >> bit & 1 == 1;
                if prev != Some(level) {
                    self.clk.tdi(level)?;
                    prev = Some(level);
                }
                self.clk.pulse()?;
            }
        }

        if exit && repeat != 0 {
            self.state = match self.state {
                State::IRShift => State::IRExit1,
                State::DRShift => State::DRExit1,
                _ => State::Unknown,
            };
        }
        Ok(())
    }

    /// Leave a shift state with a single TMS-high clock. The bit shifted on
    /// that clock is whatever TDI was last driven to.
    pub fn exit_shift(&mut self) -> Result<()> {
        let next = match self.state {
            State::IRShift => State::IRExit1,
            State::DRShift => State::DRExit1,
            state => {
                warn!(%state, "not in a shift state, ignoring");
                return Ok(());
            }
        };
        self.clk.tms(true)?;
        self.clk.pulse()?;
        self.state = next;
        Ok(())
    }

    /// Shift an instruction through the instruction register and return to
    /// idle.
    pub fn write_ir(&mut self, inst: u8) -> Result<()> {
        self.move_to(State::IRShift)?;
        self.write_bits(inst, true, true, 1)?;
        self.move_to(State::Idle)
    }

    /// Shift 32 bits out of the selected data register, sampling TDO after
    /// each rising edge. Bit `i` of the result is the `i`th sample.
    pub fn read_dr(&mut self) -> Result<u32> {
        self.move_to(State::DRShift)?;

        self.clk.tms(false)?;
        let mut out = 0;
        for i in 0..32 {
            if i == 31 {
                self.clk.tms(true)?;
            }
            self.clk.pulse()?;
            if self.clk.tdo()? {
                out |= 1 << i;
            }
        }
        if self.state == State::DRShift {
            self.state = State::DRExit1;
        }

        self.move_to(State::Idle)?;
        Ok(out)
    }

    pub fn dummy_clock(&mut self, clock: &mut impl Clock, duration: Duration) -> Result<()> {
        self.clk.dummy_clock(clock, duration)
    }
}
