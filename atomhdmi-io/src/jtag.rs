use std::fmt::Display;

/// The subset of TAP states the loader ever stands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::VariantArray, strum::Display)]
#[repr(u8)]
pub enum State {
    /// Power-on, or anything not tracked. Only left through a reset.
    Unknown,
    Idle,
    IRShift,
    IRExit1,
    DRShift,
    DRExit1,
}

/// A TMS sequence: `high` clocks with TMS asserted, then `low` clocks with
/// TMS released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Path {
    pub high: u8,
    pub low: u8,
}

impl Path {
    const fn new(high: u8, low: u8) -> Self {
        Self { high, low }
    }

    pub const fn len(self) -> usize {
        self.high as usize + self.low as usize
    }

    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Every transition the controller knows how to make. Anything else is a
/// caller error.
#[rustfmt::skip]
pub const TRANSITIONS: &[(State, State, Path)] = &[
    (State::Unknown, State::Idle,    Path::new(8,  2)),
    (State::Idle,    State::Idle,    Path::new(0,  3)),
    (State::Idle,    State::IRShift, Path::new(2,  2)),
    (State::Idle,    State::DRShift, Path::new(1,  2)),
    // UpdateIR, then three extra idle clocks on top of the two the device needs
    (State::IRExit1, State::Idle,    Path::new(1, 11)),
    (State::DRExit1, State::Idle,    Path::new(1,  2)),
];

/// Look up the TMS sequence for a transition.
pub fn path(from: State, to: State) -> Option<Path> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, path)| *path)
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write as _;
        for bit in *self {
            f.write_char(if bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl IntoIterator for Path {
    type Item = bool;
    type IntoIter = PathIter;
    fn into_iter(self) -> Self::IntoIter {
        PathIter(self, 0)
    }
}

pub struct PathIter(Path, usize);
impl Iterator for PathIter {
    type Item = bool;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.1;
        self.1 = self.1.saturating_add(1);
        if idx < self.0.len() {
            Some(idx < usize::from(self.0.high))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::VariantArray;

    use super::*;

    /// The full IEEE 1149.1 state graph, used to check the table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, strum::VariantArray)]
    enum Full {
        TestLogicReset,
        RunTestIdle,
        SelectDR,
        CaptureDR,
        ShiftDR,
        Exit1DR,
        PauseDR,
        Exit2DR,
        UpdateDR,
        SelectIR,
        CaptureIR,
        ShiftIR,
        Exit1IR,
        PauseIR,
        Exit2IR,
        UpdateIR,
    }

    impl Full {
        const fn next(self, tms: bool) -> Self {
            use Full::*;
            let [low, high] = match self {
                TestLogicReset => [RunTestIdle, TestLogicReset],
                RunTestIdle => [RunTestIdle, SelectDR],
                SelectDR => [CaptureDR, SelectIR],
                CaptureDR => [ShiftDR, Exit1DR],
                ShiftDR => [ShiftDR, Exit1DR],
                Exit1DR => [PauseDR, UpdateDR],
                PauseDR => [PauseDR, Exit2DR],
                Exit2DR => [ShiftDR, UpdateDR],
                UpdateDR => [RunTestIdle, SelectDR],
                SelectIR => [CaptureIR, TestLogicReset],
                CaptureIR => [ShiftIR, Exit1IR],
                ShiftIR => [ShiftIR, Exit1IR],
                Exit1IR => [PauseIR, UpdateIR],
                PauseIR => [PauseIR, Exit2IR],
                Exit2IR => [ShiftIR, UpdateIR],
                UpdateIR => [RunTestIdle, SelectDR],
            };
            if tms { high } else { low }
        }

        fn follow(self, path: Path) -> Self {
            path.into_iter().fold(self, Full::next)
        }
    }

    fn starts(state: State) -> &'static [Full] {
        match state {
            State::Unknown => Full::VARIANTS,
            State::Idle => &[Full::RunTestIdle],
            State::IRShift => &[Full::ShiftIR],
            State::IRExit1 => &[Full::Exit1IR],
            State::DRShift => &[Full::ShiftDR],
            State::DRExit1 => &[Full::Exit1DR],
        }
    }

    #[test]
    fn test_paths_reach_target() {
        for (from, to, path) in TRANSITIONS {
            let [goal] = starts(*to) else { unreachable!() };
            for start in starts(*from) {
                let result = start.follow(*path);
                assert!(
                    *goal == result,
                    "
goal:   {from:?} ({start:?}) -> {to:?}
path:   {path}
result: {result:?}",
                );
            }
        }
    }

    #[test]
    fn test_table_counts() {
        assert_eq!(path(State::Unknown, State::Idle), Some(Path::new(8, 2)));
        assert_eq!(path(State::Idle, State::Idle), Some(Path::new(0, 3)));
        assert_eq!(path(State::Idle, State::IRShift), Some(Path::new(2, 2)));
        assert_eq!(path(State::Idle, State::DRShift), Some(Path::new(1, 2)));
        assert_eq!(path(State::IRExit1, State::Idle), Some(Path::new(1, 11)));
        assert_eq!(path(State::DRExit1, State::Idle), Some(Path::new(1, 2)));
    }

    #[test]
    fn test_undeclared_pairs() {
        let declared = State::VARIANTS
            .iter()
            .flat_map(|from| State::VARIANTS.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| path(*from, *to).is_some())
            .count();
        assert_eq!(declared, TRANSITIONS.len());
        assert_eq!(path(State::DRShift, State::Idle), None);
        assert_eq!(path(State::Idle, State::Unknown), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Path::new(2, 2).to_string(), "1100");
        assert_eq!(Path::new(0, 3).to_string(), "000");
    }
}
