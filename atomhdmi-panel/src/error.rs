#[derive(Debug, thiserror::Error)]
pub enum TransmitterError {
    #[error("writing {value:#04x} to register {addr:#04x} failed after {attempts} attempts: {cause}")]
    RegisterWrite {
        addr: u8,
        value: u8,
        attempts: usize,
        cause: String,
    },
    #[error("reading register {addr:#04x} failed: {cause}")]
    RegisterRead { addr: u8, cause: String },
    #[error("PLL did not lock after {attempts} attempts")]
    PllUnlocked { attempts: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Axis {
    Width,
    Height,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("logical {0} must not be zero")]
    Zero(Axis),
    #[error("refresh rate {0} is not a usable rate")]
    RefreshRate(f32),
    #[error("logical {axis} {logical} scaled by {scale} does not fit the output {axis} {output}")]
    ExceedsOutput {
        axis: Axis,
        logical: u16,
        scale: u8,
        output: u16,
    },
    #[error("logical {axis} {logical} scaled by {scale} overflows")]
    Overflow { axis: Axis, logical: u16, scale: u8 },
    #[error("logical {axis} {logical} exceeds the frame memory ({memory})")]
    ExceedsMemory { axis: Axis, logical: u16, memory: u16 },
}
