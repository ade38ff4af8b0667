use std::fmt::Display;

pub struct Hex<T>(pub T);
impl Display for Hex<u8> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}
impl Display for Hex<u32> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}
impl<const N: usize> Display for Hex<[u8; N]> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        SpaceHex(&self.0).fmt(f)
    }
}

const MAX_DISPLAY: usize = 16;

/// Bytes without separators, cut off after the first few.
pub struct ShortHex<'a>(pub &'a [u8]);
impl Display for ShortHex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for e in self.0.iter().take(MAX_DISPLAY) {
            write!(f, "{e:02X}")?;
        }
        if self.0.len() > MAX_DISPLAY {
            write!(f, "...")?;
        }
        Ok(())
    }
}

/// Space separated bytes, cut off after the first few.
pub struct SpaceHex<'a>(pub &'a [u8]);
impl Display for SpaceHex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut first = true;
        for e in self.0.iter().take(MAX_DISPLAY) {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{e:02X}")?;
            first = false;
        }
        if self.0.len() > MAX_DISPLAY {
            write!(f, " ...")?;
        }
        Ok(())
    }
}
