use std::fmt;

use atomhdmi_io::{Clock, Hex, RegisterBus};
use tracing::{debug, error, info, instrument, warn};

use crate::{TransmitterConfig, TransmitterError};

pub mod programs;

use self::programs::Program;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipId(pub [u8; 3]);

impl ChipId {
    /// All three bytes equal, which is what a bus with nothing answering
    /// reads back.
    pub fn is_uniform(self) -> bool {
        let [a, b, c] = self.0;
        a == b && b == c
    }

    pub fn revision(self) -> u8 {
        self.0[2]
    }
}

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Hex(self.0), f)
    }
}

/// Register-level bring-up of the HDMI transmitter.
pub struct Transmitter<R, C> {
    bus: R,
    clock: C,
    config: TransmitterConfig,
}

impl<R: RegisterBus, C: Clock> Transmitter<R, C> {
    pub fn new(bus: R, clock: C, config: TransmitterConfig) -> Self {
        Self { bus, clock, config }
    }

    pub fn config(&self) -> &TransmitterConfig {
        &self.config
    }

    pub fn bus(&self) -> &R {
        &self.bus
    }

    pub fn into_inner(self) -> R {
        self.bus
    }

    /// Write one register, retrying with a fixed delay between attempts.
    pub fn write_register(&mut self, addr: u8, value: u8) -> Result<(), TransmitterError> {
        let attempts = self.config.write_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.bus.write(&[addr, value]) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    debug!(addr = %Hex(addr), value = %Hex(value), attempt, "write failed: {e}");
                    self.clock.delay(self.config.retry_delay);
                    attempt += 1;
                }
                Err(e) => {
                    warn!(addr = %Hex(addr), value = %Hex(value), "register write failed");
                    return Err(TransmitterError::RegisterWrite {
                        addr,
                        value,
                        attempts,
                        cause: format!("{e:#}"),
                    });
                }
            }
        }
    }

    /// Apply a program in order, stopping at the first write that fails.
    pub fn write_register_set(&mut self, program: Program) -> Result<(), TransmitterError> {
        for &(addr, value) in program {
            self.write_register(addr, value)?;
        }
        Ok(())
    }

    pub fn read_register(&mut self, addr: u8) -> Result<u8, TransmitterError> {
        self.bus
            .read_register(addr)
            .map_err(|e| TransmitterError::RegisterRead {
                addr,
                cause: format!("{e:#}"),
            })
    }

    pub fn read_chip_id(&mut self) -> Result<ChipId, TransmitterError> {
        self.write_register_set(programs::SELECT_ID_PAGE)?;
        let mut id = [0; 3];
        for (byte, reg) in id.iter_mut().zip(programs::CHIP_ID) {
            *byte = self.read_register(reg)?;
        }
        Ok(ChipId(id))
    }

    /// Empty transaction to shake the bus loose, then the settle time.
    pub fn probe(&mut self) -> eyre::Result<()> {
        self.bus.probe()?;
        self.clock.delay(std::time::Duration::from_millis(16));
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), TransmitterError> {
        self.write_register_set(programs::RESET)
    }

    /// Run the bring-up program and wait for the PLL to lock.
    ///
    /// A failed table write is logged and the program carries on, only the
    /// lock state decides the outcome. Read failures are returned.
    #[instrument(skip_all)]
    pub fn init(&mut self) -> Result<ChipId, TransmitterError> {
        let id = self.read_chip_id()?;
        debug!(%id);

        self.apply(programs::CORE_ENABLE);
        for (reg, clear) in programs::CORE_CLEAR {
            let value = self.read_register(reg)? & !clear;
            if let Err(e) = self.write_register(reg, value) {
                warn!("{e}");
            }
        }

        if id.revision() == programs::REVISION_U3_ID {
            debug!("applying revision patch");
            self.apply(programs::REVISION_U3);
        }

        for attempt in 1..=self.config.pll_attempts {
            self.apply(programs::PLL);
            let locked = self.read_register(programs::PLL_LOCKED.0)? & programs::PLL_LOCKED.1 != 0;
            let value = self.read_register(programs::PLL_VALUE)?;
            let done = self.read_register(programs::PLL_DONE.0)? & programs::PLL_DONE.1 != 0;
            debug!(attempt, locked, value = %Hex(value), done);

            if locked && done && value != 0xff {
                self.apply(programs::OUTPUT);
                info!(attempt, "PLL locked");
                return Ok(id);
            }
        }

        error!("failed to initialize the HDMI transmitter");
        Err(TransmitterError::PllUnlocked {
            attempts: self.config.pll_attempts,
        })
    }

    fn apply(&mut self, program: Program) {
        if let Err(e) = self.write_register_set(program) {
            warn!("{e}");
        }
    }
}
