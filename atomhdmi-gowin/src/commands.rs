/// Instruction register opcodes of the configuration port.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::VariantArray)]
pub enum Instruction {
    Noop = 0x02,
    Erase = 0x05,
    EraseDone = 0x09,
    ReadIdCode = 0x11,
    Enable = 0x15,
    FastProgram = 0x17,
    StatusCode = 0x41,
    EfProgram = 0x71,
    EfRead = 0x73,
    EfErase = 0x75,
    Disable = 0x3a,
    Reprogram = 0x3c,
    Bypass = 0xff,
}

impl Instruction {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl From<Instruction> for u8 {
    fn from(value: Instruction) -> Self {
        value.code()
    }
}
