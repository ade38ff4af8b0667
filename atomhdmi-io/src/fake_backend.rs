//! In-memory stand-ins for the hardware traits, for tests and dry runs.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::Rc,
    time::Duration,
};

use eyre::{Result, bail};

use crate::{Clock, Line, Pins, RegisterBus, SerialBus, units::Bits};

/// Line levels latched on one rising TCK edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cycle {
    pub tms: bool,
    pub tdi: bool,
    pub tdo: bool,
}

#[derive(Default)]
pub struct FakePins {
    cycles: Vec<Cycle>,
    tck: bool,
    tms: bool,
    tdi: bool,
    tdo: VecDeque<bool>,
    tdi_writes: usize,
}

fn write_waveform(
    bits: impl Iterator<Item = bool>,
    start: bool,
    top: &mut String,
    bot: &mut String,
) {
    let mut prev = start;
    for b in bits {
        let (t, b_) = match (prev, b) {
            (true, true) => ("──", "  "),
            (true, false) => ("─┐", " └"),
            (false, true) => (" ┌", "─┘"),
            (false, false) => ("  ", "──"),
        };
        top.push_str(t);
        bot.push_str(b_);
        prev = b;
    }
}

fn write_clk(len: usize, top: &mut String, bot: &mut String) {
    top.extend(std::iter::repeat_n("┌┐", len));
    bot.extend(std::iter::repeat_n("┘└", len));
}

fn write_cycles(cycles: &[Cycle]) -> String {
    let header = "┌Signals┐┌Waves";
    let footer = "└───────┘└─────";
    let row = |name: &str| (format!("│{name:<7}││"), String::from("│       ││"));

    let (mut tck_top, mut tck_bot) = row("tck");
    write_clk(cycles.len(), &mut tck_top, &mut tck_bot);
    let mut lines = vec![tck_top, tck_bot];

    let signals: [(&str, fn(&Cycle) -> bool); 3] =
        [("tms", |c| c.tms), ("tdi", |c| c.tdi), ("tdo", |c| c.tdo)];
    for (name, get) in signals {
        let (mut top, mut bot) = row(name);
        write_waveform(cycles.iter().map(get), false, &mut top, &mut bot);
        lines.push(top);
        lines.push(bot);
    }

    let wave_width = cycles.len() * 2;
    let mut ret = String::from(header);
    ret.extend(std::iter::repeat_n('─', wave_width.saturating_sub(5)));
    ret.push_str("┐\n");
    for buf in &lines {
        ret.push_str(buf);
        ret.push_str("│\n");
    }
    ret.push_str(footer);
    ret.extend(std::iter::repeat_n('─', wave_width.saturating_sub(5)));
    ret.push_str("┘\n");
    ret
}

impl FakePins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels presented on TDO by successive samples. Once drained, TDO
    /// reads low.
    pub fn queue_tdo(&mut self, levels: impl IntoIterator<Item = bool>) {
        self.tdo.extend(levels);
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Number of times TDI was driven, whether or not the level changed.
    pub fn tdi_writes(&self) -> usize {
        self.tdi_writes
    }

    /// Reassemble the TDI bits of `cycles` into bytes, MSB first. A trailing
    /// partial byte is dropped.
    pub fn tdi_bytes(cycles: &[Cycle]) -> Vec<u8> {
        cycles
            .chunks_exact(8)
            .map(|byte| byte.iter().fold(0, |acc, c| acc << 1 | u8::from(c.tdi)))
            .collect()
    }

    pub fn consume_waveform(&mut self) -> String {
        let ret = write_cycles(&self.cycles);
        self.cycles.clear();
        ret
    }
}

impl Pins for FakePins {
    fn set(&mut self, line: Line, level: bool) -> Result<()> {
        match line {
            Line::Tck => {
                if !self.tck && level {
                    self.cycles.push(Cycle {
                        tms: self.tms,
                        tdi: self.tdi,
                        tdo: self.tdo.front().copied().unwrap_or(false),
                    });
                }
                self.tck = level;
            }
            Line::Tms => self.tms = level,
            Line::Tdi => {
                self.tdi = level;
                self.tdi_writes += 1;
            }
        }
        Ok(())
    }

    fn tdo(&mut self) -> Result<bool> {
        Ok(self.tdo.pop_front().unwrap_or(false))
    }
}

/// One call made on a [`FakeSerialBus`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    BeginTransaction,
    EndTransaction,
    Cs(bool),
    Command { data: u32, len: Bits<u8> },
    Bytes(Vec<u8>),
    Wait,
    BeginRead,
    ReadData(Bits<u8>),
    ReadBytes(usize),
    EndRead,
}

/// Records every call. Reads are served from a queue of bytes, and return
/// `0xff` once it runs dry, which the panel protocol reads as "ready".
#[derive(Default)]
pub struct FakeSerialBus {
    ops: Vec<Op>,
    reads: VecDeque<u8>,
}

impl FakeSerialBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_read(&mut self, bytes: impl IntoIterator<Item = u8>) {
        self.reads.extend(bytes);
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    /// Each write call as the bytes it put on the wire.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Command { data, len } => Some(data.to_le_bytes()[..len.bytes()].to_vec()),
                Op::Bytes(b) => Some(b.clone()),
                _ => None,
            })
            .collect()
    }

    fn next_read(&mut self) -> u8 {
        self.reads.pop_front().unwrap_or(0xff)
    }
}

impl SerialBus for FakeSerialBus {
    fn begin_transaction(&mut self) -> Result<()> {
        self.ops.push(Op::BeginTransaction);
        Ok(())
    }

    fn end_transaction(&mut self) -> Result<()> {
        self.ops.push(Op::EndTransaction);
        Ok(())
    }

    fn cs(&mut self, level: bool) -> Result<()> {
        self.ops.push(Op::Cs(level));
        Ok(())
    }

    fn write_command(&mut self, data: u32, len: Bits<u8>) -> Result<()> {
        if len.0 > 32 {
            bail!("write_command: {} bits does not fit in a u32", len.0);
        }
        self.ops.push(Op::Command {
            data: data & len.mask(),
            len,
        });
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.ops.push(Op::Bytes(data.to_vec()));
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        self.ops.push(Op::Wait);
        Ok(())
    }

    fn begin_read(&mut self) -> Result<()> {
        self.ops.push(Op::BeginRead);
        Ok(())
    }

    fn read_data(&mut self, len: Bits<u8>) -> Result<u32> {
        if len.0 > 32 {
            bail!("read_data: {} bits does not fit in a u32", len.0);
        }
        self.ops.push(Op::ReadData(len));
        let mut bytes = [0; 4];
        for b in &mut bytes[..len.bytes()] {
            *b = self.next_read();
        }
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ops.push(Op::ReadBytes(buf.len()));
        for b in buf {
            *b = self.next_read();
        }
        Ok(())
    }

    fn end_read(&mut self) -> Result<()> {
        self.ops.push(Op::EndRead);
        Ok(())
    }
}

/// Paged register file behind a two-wire bus. Writing register `0xff`
/// selects the page, as on the real transmitter.
#[derive(Default)]
pub struct FakeRegisterBus {
    page: u8,
    regs: HashMap<(u8, u8), u8>,
    writes: Vec<Vec<u8>>,
    attempts: usize,
    fail_next: usize,
    fail_when: Option<Box<dyn FnMut(&[u8]) -> bool>>,
    probes: usize,
}

impl FakeRegisterBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, page: u8, reg: u8, value: u8) {
        self.regs.insert((page, reg), value);
    }

    pub fn get(&self, page: u8, reg: u8) -> u8 {
        self.regs.get(&(page, reg)).copied().unwrap_or(0)
    }

    pub fn page(&self) -> u8 {
        self.page
    }

    /// Make the next `count` write attempts fail.
    pub fn fail_next(&mut self, count: usize) {
        self.fail_next = count;
    }

    /// Fail every write attempt whose payload matches.
    pub fn fail_when(&mut self, f: impl FnMut(&[u8]) -> bool + 'static) {
        self.fail_when = Some(Box::new(f));
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Write attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn probes(&self) -> usize {
        self.probes
    }
}

impl RegisterBus for FakeRegisterBus {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.attempts += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            bail!("nack");
        }
        if let Some(f) = &mut self.fail_when
            && f(data)
        {
            bail!("nack");
        }

        if let &[reg, value] = data {
            if reg == 0xff {
                self.page = value;
            }
            self.regs.insert((self.page, reg), value);
        }
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u8> {
        Ok(self.get(self.page, reg))
    }

    fn probe(&mut self) -> Result<()> {
        self.probes += 1;
        Ok(())
    }
}

/// A clock that only moves when told to, or by a fixed step on every read.
///
/// Clones share the same time line, so one copy can be handed to the code
/// under test while the test inspects another.
#[derive(Clone, Default)]
pub struct FakeClock {
    now: Rc<Cell<Duration>>,
    step: Duration,
    delays: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `step` on every call to [`Clock::now`].
    pub fn with_step(step: Duration) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.now.get()
    }

    /// Every delay requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&mut self) -> Duration {
        self.advance(self.step);
        self.now.get()
    }

    fn delay(&mut self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
        self.advance(duration);
    }
}
