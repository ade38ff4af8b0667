//! `embedded-hal` backed implementations of the bus traits.

use std::fmt::Debug;

use atomhdmi_io::{Line, Pins, RegisterBus, SerialBus, units::Bits};
use embedded_hal::{
    digital::{InputPin, OutputPin, PinState},
    i2c::I2c,
    spi::SpiBus,
};
use eyre::{Result, bail, eyre};
use tracing::trace;

fn hal_err(what: &str, e: impl Debug) -> eyre::Report {
    eyre!("{what}: {e:?}")
}

/// Programming port on four GPIOs.
pub struct HalPins<TCK, TMS, TDI, TDO> {
    pub tck: TCK,
    pub tms: TMS,
    pub tdi: TDI,
    pub tdo: TDO,
}

impl<TCK, TMS, TDI, TDO> HalPins<TCK, TMS, TDI, TDO> {
    pub fn new(tck: TCK, tms: TMS, tdi: TDI, tdo: TDO) -> Self {
        Self { tck, tms, tdi, tdo }
    }
}

impl<TCK, TMS, TDI, TDO> Pins for HalPins<TCK, TMS, TDI, TDO>
where
    TCK: OutputPin,
    TMS: OutputPin,
    TDI: OutputPin,
    TDO: InputPin,
{
    fn set(&mut self, line: Line, level: bool) -> Result<()> {
        let state = PinState::from(level);
        match line {
            Line::Tck => self.tck.set_state(state).map_err(|e| hal_err("tck", e)),
            Line::Tms => self.tms.set_state(state).map_err(|e| hal_err("tms", e)),
            Line::Tdi => self.tdi.set_state(state).map_err(|e| hal_err("tdi", e)),
        }
    }

    fn tdo(&mut self) -> Result<bool> {
        self.tdo.is_high().map_err(|e| hal_err("tdo", e))
    }
}

/// Serial bus on an SPI peripheral with a software chip-select.
///
/// The peripheral is owned, so transactions only need to make sure nothing
/// is left in flight when they end.
pub struct HalSerialBus<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI: SpiBus, CS: OutputPin> HalSerialBus<SPI, CS> {
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self { spi, cs }
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn flush(&mut self) -> Result<()> {
        self.spi.flush().map_err(|e| hal_err("spi flush", e))
    }
}

impl<SPI: SpiBus, CS: OutputPin> SerialBus for HalSerialBus<SPI, CS> {
    fn begin_transaction(&mut self) -> Result<()> {
        trace!("begin transaction");
        Ok(())
    }

    fn end_transaction(&mut self) -> Result<()> {
        self.flush()
    }

    fn cs(&mut self, level: bool) -> Result<()> {
        self.cs
            .set_state(PinState::from(level))
            .map_err(|e| hal_err("cs", e))
    }

    fn write_command(&mut self, data: u32, len: Bits<u8>) -> Result<()> {
        if len.0 > 32 {
            bail!("write_command: {} bits does not fit in a u32", len.0);
        }
        self.write_bytes(&data.to_le_bytes()[..len.bytes()])
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.spi.write(data).map_err(|e| hal_err("spi write", e))
    }

    fn wait(&mut self) -> Result<()> {
        self.flush()
    }

    fn begin_read(&mut self) -> Result<()> {
        self.flush()
    }

    fn read_data(&mut self, len: Bits<u8>) -> Result<u32> {
        if len.0 > 32 {
            bail!("read_data: {} bits does not fit in a u32", len.0);
        }
        let mut bytes = [0; 4];
        self.read_bytes(&mut bytes[..len.bytes()])?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.spi.read(buf).map_err(|e| hal_err("spi read", e))
    }

    fn end_read(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 7-bit address the HDMI transmitter answers on.
pub const TRANSMITTER_ADDRESS: u8 = 0x39;

/// Transmitter register bus on an I2C peripheral.
pub struct HalRegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> HalRegisterBus<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Bus for a transmitter at [`TRANSMITTER_ADDRESS`].
    pub fn transmitter(i2c: I2C) -> Self {
        Self::new(i2c, TRANSMITTER_ADDRESS)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterBus for HalRegisterBus<I2C> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.i2c
            .write(self.address, data)
            .map_err(|e| hal_err("i2c write", e))
    }

    fn read_register(&mut self, reg: u8) -> Result<u8> {
        let mut value = [0];
        self.i2c
            .write_read(self.address, &[reg], &mut value)
            .map_err(|e| hal_err("i2c read", e))?;
        Ok(value[0])
    }

    fn probe(&mut self) -> Result<()> {
        self.write(&[])
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use embedded_hal::{
        digital,
        i2c::{self, Operation, SevenBitAddress},
        spi,
    };

    use super::*;

    #[derive(Default)]
    struct Pin {
        levels: Vec<bool>,
    }

    impl digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.levels.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.levels.push(true);
            Ok(())
        }
    }

    impl InputPin for Pin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.levels.last().copied().unwrap_or(false))
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|h| !h)
        }
    }

    #[derive(Default)]
    struct Spi {
        written: Vec<u8>,
        fill: u8,
    }

    impl spi::ErrorType for Spi {
        type Error = Infallible;
    }

    impl SpiBus for Spi {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
            for (i, w) in words.iter_mut().enumerate() {
                *w = self.fill.wrapping_add(i as u8);
            }
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
            self.written.extend_from_slice(words);
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
            self.write(write)?;
            self.read(read)
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
            self.written.extend_from_slice(words);
            self.read(words)
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Nack;

    impl i2c::Error for Nack {
        fn kind(&self) -> i2c::ErrorKind {
            i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
        }
    }

    #[derive(Default)]
    struct Bus {
        seen: Vec<(u8, Vec<u8>)>,
        present: bool,
    }

    impl i2c::ErrorType for Bus {
        type Error = Nack;
    }

    impl I2c for Bus {
        fn transaction(
            &mut self,
            address: SevenBitAddress,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Nack> {
            if !self.present {
                return Err(Nack);
            }
            for op in operations {
                match op {
                    Operation::Write(data) => self.seen.push((address, data.to_vec())),
                    Operation::Read(buf) => buf.fill(0x17),
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_pins() {
        let mut pins = HalPins::new(Pin::default(), Pin::default(), Pin::default(), Pin::default());
        pins.set(Line::Tck, true).unwrap();
        pins.set(Line::Tms, false).unwrap();
        pins.set(Line::Tck, false).unwrap();
        assert_eq!(pins.tck.levels, [true, false]);
        assert_eq!(pins.tms.levels, [false]);
        assert!(!pins.tdo().unwrap());
    }

    #[test]
    fn test_command_lsb_first() {
        let mut bus = HalSerialBus::new(Spi::default(), Pin::default());
        bus.write_command(0x0403_0201, Bits(32)).unwrap();
        bus.write_command(0x42, Bits(8)).unwrap();
        assert!(bus.write_command(0, Bits(40)).is_err());
        let (spi, _) = bus.release();
        assert_eq!(spi.written, [1, 2, 3, 4, 0x42]);
    }

    #[test]
    fn test_read_data() {
        let mut bus = HalSerialBus::new(
            Spi {
                fill: 0x10,
                ..Spi::default()
            },
            Pin::default(),
        );
        assert_eq!(bus.read_data(Bits(16)).unwrap(), 0x1110);
        bus.cs(true).unwrap();
        bus.cs(false).unwrap();
        let (_, cs) = bus.release();
        assert_eq!(cs.levels, [true, false]);
    }

    #[test]
    fn test_register_bus() {
        let mut regs = HalRegisterBus::transmitter(Bus {
            present: true,
            ..Bus::default()
        });
        regs.write(&[0xff, 0x80]).unwrap();
        assert_eq!(regs.read_register(0x00).unwrap(), 0x17);
        regs.probe().unwrap();
        let bus = regs.release();
        assert_eq!(
            bus.seen,
            [(0x39, vec![0xff, 0x80]), (0x39, vec![0x00]), (0x39, vec![])]
        );
    }

    #[test]
    fn test_register_bus_address() {
        let mut regs = HalRegisterBus::new(
            Bus {
                present: true,
                ..Bus::default()
            },
            0x4c,
        );
        regs.write(&[0x01, 0x02]).unwrap();
        assert_eq!(regs.release().seen, [(0x4c, vec![0x01, 0x02])]);
    }

    #[test]
    fn test_register_bus_nack() {
        let mut regs = HalRegisterBus::transmitter(Bus::default());
        let err = regs.write(&[0x00, 0x00]).unwrap_err();
        assert!(err.to_string().contains("i2c write"));
    }
}
