//! Run-length encoded configuration images.
//!
//! The stream is a sequence of groups. Each group starts with a header byte
//! `n`:
//!
//! ```text
//! n > 0:  [n] [value]              value, clocked n times
//! n = 0:  [0] [d] [b0 .. b(d-1)]   d literal bytes, clocked once each
//! ```
//!
//! Only the final byte of the whole stream may leave the shift state.

use std::fmt;

/// One call into the bit clocker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Write {
    pub value: u8,
    pub repeat: usize,
    /// Set on the write that consumed the final stream byte.
    pub last: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitstreamError {
    #[error("bitstream is empty")]
    Empty,
    #[error("bitstream ends inside the group starting at offset {offset}")]
    Truncated { offset: usize },
}

/// Single pass decoder. Never looks past the group being decoded.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    group_start: usize,
    direct_left: usize,
    truncated: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            group_start: 0,
            direct_left: 0,
            truncated: false,
        }
    }

    /// Stream bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Offset of the group that ran off the end of the stream, if any.
    pub fn truncated_at(&self) -> Option<usize> {
        self.truncated.then_some(self.group_start)
    }

    fn take(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn at_end(&self) -> bool {
        self.pos == self.data.len()
    }
}

impl Iterator for Decoder<'_> {
    type Item = Write;

    fn next(&mut self) -> Option<Write> {
        loop {
            if self.direct_left > 0 {
                let Some(value) = self.take() else {
                    self.truncated = true;
                    self.direct_left = 0;
                    return None;
                };
                self.direct_left -= 1;
                return Some(Write {
                    value,
                    repeat: 1,
                    last: self.at_end(),
                });
            }

            self.group_start = self.pos;
            let n = self.take()?;
            let Some(arg) = self.take() else {
                self.truncated = true;
                return None;
            };
            match n {
                0 => self.direct_left = arg.into(),
                n => {
                    return Some(Write {
                        value: arg,
                        repeat: n.into(),
                        last: self.at_end(),
                    });
                }
            }
        }
    }
}

/// Inverse of [`Decoder`]. Runs of three or more equal bytes become run
/// groups, everything else is packed into literal groups.
pub fn encode(data: &[u8]) -> Vec<u8> {
    const MIN_RUN: usize = 3;
    const MAX: usize = u8::MAX as usize;

    fn flush(out: &mut Vec<u8>, literals: &[u8]) {
        for chunk in literals.chunks(MAX) {
            out.push(0);
            out.push(chunk.len() as u8);
            out.extend_from_slice(chunk);
        }
    }

    let mut out = Vec::with_capacity(data.len() / 4);
    let mut literal_start = 0;
    let mut i = 0;
    while i < data.len() {
        let value = data[i];
        let run = data[i..]
            .iter()
            .take(MAX)
            .take_while(|b| **b == value)
            .count();
        if run >= MIN_RUN {
            flush(&mut out, &data[literal_start..i]);
            out.push(run as u8);
            out.push(value);
            i += run;
            literal_start = i;
        } else {
            i += run;
        }
    }
    flush(&mut out, &data[literal_start..]);
    out
}

/// Expand a stream back to the bytes it clocks.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, BitstreamError> {
    let mut decoder = Decoder::new(data);
    let mut out = Vec::new();
    for w in decoder.by_ref() {
        out.extend(std::iter::repeat_n(w.value, w.repeat));
    }
    match decoder.truncated_at() {
        Some(offset) => Err(BitstreamError::Truncated { offset }),
        None => Ok(out),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub run_groups: usize,
    pub direct_groups: usize,
    pub encoded_len: usize,
    /// Bytes clocked into the device.
    pub expanded_len: usize,
    /// Shift clocks spent on the stream.
    pub clocks: usize,
}

impl Stats {
    pub fn of(data: &[u8]) -> Result<Self, BitstreamError> {
        if data.is_empty() {
            return Err(BitstreamError::Empty);
        }

        let mut stats = Self {
            encoded_len: data.len(),
            ..Self::default()
        };
        let mut decoder = Decoder::new(data);
        let mut last_group = None;
        while let Some(w) = decoder.next() {
            if last_group != Some(decoder.group_start) {
                last_group = Some(decoder.group_start);
                if w.repeat > 1 || data[decoder.group_start] != 0 {
                    stats.run_groups += 1;
                } else {
                    stats.direct_groups += 1;
                }
            }
            stats.expanded_len += w.repeat;
        }
        if let Some(offset) = decoder.truncated_at() {
            return Err(BitstreamError::Truncated { offset });
        }
        stats.clocks = stats.expanded_len * 8;
        Ok(stats)
    }

    pub fn ratio(&self) -> f64 {
        if self.expanded_len == 0 {
            return 0.0;
        }
        self.encoded_len as f64 / self.expanded_len as f64
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes -> {} bytes ({:.1}%), {} run groups, {} literal groups",
            self.encoded_len,
            self.expanded_len,
            self.ratio() * 100.0,
            self.run_groups,
            self.direct_groups,
        )
    }
}
