use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use atomhdmi_io::{Clock, Pins, TapController, jtag::State};
use eyre::Result;
use tracing::{debug, info, instrument, warn};

pub mod bitstream;
pub mod commands;
pub mod registers;

use self::{
    bitstream::{BitstreamError, Decoder},
    commands::Instruction, registers::Status};

/// Dummy clocking after an erase step.
pub const ERASE_HOLD: Duration = Duration::from_millis(4);

pub fn write_inst<P: Pins>(tap: &mut TapController<P>, inst: Instruction) -> Result<()> {
    tap.write_ir(inst.code())
}

/// Diagnostic only. The load sequence never looks at the status register.
pub fn read_status<P: Pins>(tap: &mut TapController<P>) -> Result<Status> {
    write_inst(tap, Instruction::StatusCode)?;
    let raw = tap.read_dr()?;
    let status = Status::from_bits_retain(raw);
    debug!(%status);
    Ok(status)
}

pub fn read_idcode<P: Pins>(tap: &mut TapController<P>) -> Result<u32> {
    write_inst(tap, Instruction::ReadIdCode)?;
    tap.read_dr()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Calls made into the bit clocker while streaming.
    pub writes: usize,
    /// Bytes clocked into configuration memory.
    pub bytes: usize,
    /// Offset of the group the stream ran out in, if it did.
    pub truncated_at: Option<usize>,
}

/// Loads a run-length encoded image into the FPGA's configuration SRAM.
pub struct Loader<'a> {
    bitstream: &'a [u8],
    notify: Option<&'a AtomicUsize>,
}

impl<'a> Loader<'a> {
    pub fn new(bitstream: &'a [u8]) -> Self {
        Self {
            bitstream,
            notify: None,
        }
    }

    /// Publish the number of consumed bitstream bytes to `notify` while
    /// streaming.
    pub fn with_notifications(self, notify: &'a AtomicUsize) -> Self {
        Self {
            notify: Some(notify),
            ..self
        }
    }

    /// Erase, then program. Leaves the TAP in idle.
    ///
    /// An empty image is rejected before anything is clocked. There is no
    /// readback or status check at the end.
    #[instrument(skip_all, fields(len = self.bitstream.len()))]
    pub fn load<P: Pins>(
        &self,
        tap: &mut TapController<P>,
        clock: &mut impl Clock,
    ) -> Result<LoadReport> {
        use Instruction::*;

        if self.bitstream.is_empty() {
            return Err(BitstreamError::Empty.into());
        }
        tap.move_to(State::Idle)?;

        info!("erasing FPGA SRAM");
        for inst in [Enable, Erase, Noop] {
            write_inst(tap, inst)?;
        }
        tap.dummy_clock(clock, ERASE_HOLD)?;
        for inst in [EraseDone, Noop, Disable, Noop] {
            write_inst(tap, inst)?;
        }
        tap.dummy_clock(clock, ERASE_HOLD)?;

        info!("writing to SRAM");
        for inst in [Enable, FastProgram] {
            write_inst(tap, inst)?;
        }
        tap.move_to(State::DRShift)?;

        let report = self.stream(tap)?;
        // a truncated stream never clocks its exit-marked write
        if tap.state() == State::DRShift {
            tap.exit_shift()?;
        }

        tap.move_to(State::Idle)?;
        for inst in [Disable, Noop] {
            write_inst(tap, inst)?;
        }
        info!(bytes = report.bytes, "SRAM programming finished");
        Ok(report)
    }

    fn stream<P: Pins>(&self, tap: &mut TapController<P>) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let mut decoder = Decoder::new(self.bitstream);
        while let Some(w) = decoder.next() {
            tap.write_bits(w.value, w.last, false, w.repeat)?;
            report.writes += 1;
            report.bytes += w.repeat;
            if let Some(notify) = self.notify {
                notify.store(decoder.position(), Ordering::Release);
            }
        }

        report.truncated_at = decoder.truncated_at();
        if let Some(offset) = report.truncated_at {
            warn!(offset, "bitstream is truncated");
        }
        if let Some(notify) = self.notify {
            notify.store(self.bitstream.len(), Ordering::Release);
        }
        Ok(report)
    }
}
