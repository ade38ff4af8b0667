use std::time::{Duration, Instant};

/// Monotonic time plus blocking delays.
///
/// Every wait in the driver is a busy or blocking wait on the calling thread,
/// so this is the only place time enters. Tests substitute
/// [`FakeClock`](crate::fake_backend::FakeClock).
pub trait Clock {
    /// Time since an arbitrary, fixed epoch.
    fn now(&mut self) -> Duration;

    fn delay(&mut self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&mut self) -> Duration {
        C::now(&mut **self)
    }

    fn delay(&mut self, duration: Duration) {
        C::delay(&mut **self, duration)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&mut self) -> Duration {
        self.epoch.elapsed()
    }

    fn delay(&mut self, duration: Duration) {
        // sleep() overshoots by scheduler granularity, spin the tail instead
        const SPIN: Duration = Duration::from_micros(200);
        let deadline = Instant::now() + duration;
        if let Some(coarse) = duration.checked_sub(SPIN) {
            std::thread::sleep(coarse);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}
