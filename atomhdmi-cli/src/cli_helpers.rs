use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use color_eyre::eyre::OptionExt;

/// `WIDTHxHEIGHT`, as in `640x360`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl FromStr for Size {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (width, height) = s.split_once(['x', 'X']).ok_or_eyre("no 'x'")?;
        let width = width.trim().parse()?;
        let height = height.trim().parse()?;
        Ok(Self { width, height })
    }
}

impl Display for Size {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
