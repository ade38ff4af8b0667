use std::fmt;

bitflags::bitflags! {
    /// The 32-bit word shifted out after [`Instruction::StatusCode`].
    ///
    /// [`Instruction::StatusCode`]: crate::commands::Instruction::StatusCode
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Status: u32 {
        const CRC_ERROR = 1 << 0;
        const BAD_COMMAND = 1 << 1;
        const ID_VERIFY_FAILED = 1 << 2;
        const TIMEOUT = 1 << 3;
        const MEMORY_ERASE = 1 << 5;
        const PREAMBLE = 1 << 6;
        const SYSTEM_EDIT_MODE = 1 << 7;
        const PRG_SPIFLASH_DIRECT = 1 << 8;
        const NON_JTAG_CNF_ACTIVE = 1 << 10;
        const BYPASS = 1 << 11;
        const GOWIN_VLD = 1 << 12;
        const DONE_FINAL = 1 << 13;
        const SECURITY_FINAL = 1 << 14;
        const READY = 1 << 15;
        const POR = 1 << 16;
        const FLASH_LOCK = 1 << 17;
    }
}

impl Status {
    const ERRORS: Self = Self::CRC_ERROR
        .union(Self::BAD_COMMAND)
        .union(Self::ID_VERIFY_FAILED)
        .union(Self::TIMEOUT);

    pub const fn has_error(self) -> bool {
        self.intersects(Self::ERRORS)
    }

    /// Configuration finished and the user design is running.
    pub const fn is_configured(self) -> bool {
        self.contains(Self::DONE_FINAL) && !self.has_error()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.bits())?;
        if !self.is_empty() {
            f.write_str(" [")?;
            bitflags::parser::to_writer(self, &mut *f)?;
            f.write_str("]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let status = Status::from_bits_retain(0x0001_b020);
        assert!(status.contains(Status::DONE_FINAL | Status::READY | Status::GOWIN_VLD));
        assert!(status.contains(Status::MEMORY_ERASE | Status::POR));
        assert!(status.is_configured());
    }

    #[test]
    fn test_errors() {
        let status = Status::DONE_FINAL | Status::CRC_ERROR;
        assert!(status.has_error());
        assert!(!status.is_configured());
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::empty().to_string(), "0x00000000");
        assert_eq!(
            (Status::READY | Status::DONE_FINAL).to_string(),
            "0x0000a000 [DONE_FINAL | READY]"
        );
    }
}
