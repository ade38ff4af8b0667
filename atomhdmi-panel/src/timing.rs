//! Pacing against fills and copies, which the FPGA runs in the background
//! with no completion signal.
//!
//! Each long operation leaves behind an estimate of how long the hardware
//! stays busy. The next command that is not a continuation of a raw pixel
//! write sleeps most of that time away, then polls the bus until the device
//! stops reading back zero.

use std::time::Duration;

use atomhdmi_io::{Clock, SerialBus, units::Bits};
use eyre::Result;
use tracing::{trace, warn};

use crate::commands;

/// Slack left between the end of the sleep and the first ready poll.
pub const POLL_MARGIN: Duration = Duration::from_micros(8);

/// Free-count when nothing is queued.
pub const FREE_MAX: u8 = u8::MAX;

/// Estimated busy time of a rectangle fill, in microseconds.
pub const fn fill_busy_us(w: u16, h: u16) -> u32 {
    let w = w.saturating_sub(1) as u32;
    ((21 + (w >> 4) * 36 + (w & 15)) * h as u32) >> 5
}

/// Estimated busy time of a copy, in microseconds. Copies through the
/// scratch area take twice as long.
pub const fn copy_busy_us(w: u16, h: u16, direct: bool) -> u32 {
    let w = w.saturating_sub(1) as u32;
    let h = h as u32;
    (w + (16 + (w >> 4) * 40 + (w & 15)) * (h << 2)) >> if direct { 6 } else { 5 }
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    since: Duration,
    budget: Duration,
}

/// The command cache plus the pending-delay timer.
#[derive(Debug)]
pub struct Pacer {
    last_cmd: u8,
    pending: Option<Pending>,
    free: u8,
    poll_limit: Option<usize>,
}

impl Pacer {
    pub fn new(poll_limit: Option<usize>) -> Self {
        Self {
            last_cmd: 0,
            pending: None,
            free: FREE_MAX,
            poll_limit,
        }
    }

    /// Forget the last command. The pending delay survives.
    pub fn reset(&mut self) {
        self.last_cmd = 0;
    }

    pub fn last_cmd(&self) -> u8 {
        self.last_cmd
    }

    pub fn free_count(&self) -> u8 {
        self.free
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a background operation that started at `now`.
    pub fn set_busy(&mut self, now: Duration, us: u32) {
        if us == 0 {
            return;
        }
        self.pending = Some(Pending {
            since: now,
            budget: Duration::from_micros(us.into()),
        });
        self.free = self.free.saturating_sub(1);
    }

    /// Gate in front of every command. Returns `true` when `cmd` continues
    /// the raw write already in progress, so its opcode must not be sent
    /// again.
    ///
    /// Leaving raw write mode drains the bus and toggles chip-select. Any
    /// other command first waits out a pending fill or copy.
    pub fn check_repeat<S: SerialBus>(
        &mut self,
        bus: &mut S,
        clock: &mut impl Clock,
        cmd: u8,
    ) -> Result<bool> {
        if self.last_cmd & commands::FAMILY_MASK == commands::WRITE_RAW {
            if self.last_cmd == cmd {
                return Ok(true);
            }
            bus.wait()?;
            bus.cs(true)?;
            self.last_cmd = cmd;
            bus.cs(false)?;
            return Ok(false);
        }

        self.last_cmd = cmd;

        if let Some(Pending { since, budget }) = self.pending.take() {
            let elapsed = clock.now().saturating_sub(since);
            if let Some(remaining) = budget.checked_sub(elapsed).filter(|r| !r.is_zero()) {
                trace!(?remaining, "waiting for background operation");
                if let Some(sleep) = remaining.checked_sub(POLL_MARGIN).filter(|s| !s.is_zero()) {
                    clock.delay(sleep);
                }
                bus.begin_read()?;
                self.poll_ready(bus)?;
                bus.cs(true)?;
                bus.end_read()?;
                bus.cs(false)?;
            }
            self.free = FREE_MAX;
        }
        Ok(false)
    }

    fn poll_ready<S: SerialBus>(&self, bus: &mut S) -> Result<()> {
        let mut polls = 0usize;
        while bus.read_data(Bits(8))? == 0 {
            polls += 1;
            if self.poll_limit.is_some_and(|limit| polls >= limit) {
                warn!(polls, "device still busy, giving up on the ready poll");
                break;
            }
        }
        Ok(())
    }
}
