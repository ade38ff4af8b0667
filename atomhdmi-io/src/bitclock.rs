use std::time::Duration;

use eyre::Result;

use crate::{Clock, Line, Pins};

/// Clock-level driver over the programming port pins.
///
/// TCK idles high. A pulse drives it low then high, so the device samples
/// TMS/TDI on the rising edge at the end of [`BitClock::pulse`].
pub struct BitClock<P> {
    pins: P,
    pulses: usize,
}

impl<P: Pins> BitClock<P> {
    /// Takes the pins and drives all three outputs low.
    pub fn new(mut pins: P) -> Result<Self> {
        pins.set(Line::Tms, false)?;
        pins.set(Line::Tdi, false)?;
        pins.set(Line::Tck, false)?;
        Ok(Self { pins, pulses: 0 })
    }

    pub fn into_inner(self) -> P {
        self.pins
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Total clock pulses emitted so far.
    pub fn pulses(&self) -> usize {
        self.pulses
    }

    pub fn tms(&mut self, level: bool) -> Result<()> {
        self.pins.set(Line::Tms, level)
    }

    pub fn tdi(&mut self, level: bool) -> Result<()> {
        self.pins.set(Line::Tdi, level)
    }

    pub fn tdo(&mut self) -> Result<bool> {
        self.pins.tdo()
    }

    pub fn pulse(&mut self) -> Result<()> {
        self.pins.set(Line::Tck, false)?;
        self.pins.set(Line::Tck, true)?;
        self.pulses += 1;
        Ok(())
    }

    pub fn pulses_n(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.pulse()?;
        }
        Ok(())
    }

    /// Toggle TCK until at least `duration` of wall-clock time has passed.
    /// Runs at least one round even for a zero duration.
    pub fn dummy_clock(&mut self, clock: &mut impl Clock, duration: Duration) -> Result<()> {
        let start = clock.now();
        loop {
            self.pulse()?;
            self.pulse()?;
            if clock.now().saturating_sub(start) >= duration {
                return Ok(());
            }
        }
    }
}
