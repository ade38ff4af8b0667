use eyre::Result;

use crate::units::Bits;

/// The three output lines driven while loading the FPGA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Line {
    Tck,
    Tms,
    Tdi,
}

/// Raw access to the lines of the FPGA programming port.
///
/// The board shares these pins with the serial bus: TCK is the bus clock,
/// TDI is MOSI, TDO is MISO and TMS is the chip-select. An implementation is
/// only used for the duration of the configuration load, and must be dropped
/// before the pins are handed over to the serial bus.
pub trait Pins {
    fn set(&mut self, line: Line, level: bool) -> Result<()>;

    /// Sample TDO.
    fn tdo(&mut self) -> Result<bool>;
}

/// The synchronous serial bus carrying pixel commands to the FPGA.
///
/// Multi-byte units (`write_command`, `read_data`) go over the wire least
/// significant byte first.
pub trait SerialBus {
    /// Acquire the bus. Everything between `begin_transaction` and
    /// `end_transaction` is exclusive to the caller.
    fn begin_transaction(&mut self) -> Result<()>;
    fn end_transaction(&mut self) -> Result<()>;

    /// Drive chip-select. `true` deasserts (the line is active low).
    fn cs(&mut self, level: bool) -> Result<()>;

    fn write_command(&mut self, data: u32, len: Bits<u8>) -> Result<()>;
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Block until every queued write has left the controller.
    fn wait(&mut self) -> Result<()>;

    fn begin_read(&mut self) -> Result<()>;
    fn read_data(&mut self, len: Bits<u8>) -> Result<u32>;
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;
    fn end_read(&mut self) -> Result<()>;
}

/// The two-wire bus connecting the HDMI transmitter. The device address is
/// part of the implementation.
pub trait RegisterBus {
    /// One complete write transaction.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    fn read_register(&mut self, reg: u8) -> Result<u8>;

    /// Start and immediately stop a transaction addressed to the device,
    /// without any payload.
    fn probe(&mut self) -> Result<()>;
}

impl<P: Pins + ?Sized> Pins for Box<P> {
    fn set(&mut self, line: Line, level: bool) -> Result<()> {
        P::set(&mut **self, line, level)
    }

    fn tdo(&mut self) -> Result<bool> {
        P::tdo(&mut **self)
    }
}

impl<P: Pins + ?Sized> Pins for &mut P {
    fn set(&mut self, line: Line, level: bool) -> Result<()> {
        P::set(&mut **self, line, level)
    }

    fn tdo(&mut self) -> Result<bool> {
        P::tdo(&mut **self)
    }
}

impl<S: SerialBus + ?Sized> SerialBus for Box<S> {
    fn begin_transaction(&mut self) -> Result<()> {
        S::begin_transaction(&mut **self)
    }

    fn end_transaction(&mut self) -> Result<()> {
        S::end_transaction(&mut **self)
    }

    fn cs(&mut self, level: bool) -> Result<()> {
        S::cs(&mut **self, level)
    }

    fn write_command(&mut self, data: u32, len: Bits<u8>) -> Result<()> {
        S::write_command(&mut **self, data, len)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        S::write_bytes(&mut **self, data)
    }

    fn wait(&mut self) -> Result<()> {
        S::wait(&mut **self)
    }

    fn begin_read(&mut self) -> Result<()> {
        S::begin_read(&mut **self)
    }

    fn read_data(&mut self, len: Bits<u8>) -> Result<u32> {
        S::read_data(&mut **self, len)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        S::read_bytes(&mut **self, buf)
    }

    fn end_read(&mut self) -> Result<()> {
        S::end_read(&mut **self)
    }
}

impl<R: RegisterBus + ?Sized> RegisterBus for Box<R> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        R::write(&mut **self, data)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8> {
        R::read_register(&mut **self, reg)
    }

    fn probe(&mut self) -> Result<()> {
        R::probe(&mut **self)
    }
}
