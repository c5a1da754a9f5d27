use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Wall-clock source for tick pacing and script cooldowns.
pub trait Clock {
    fn now_millis(&self) -> u64;

    /// Blocks (or, for simulated clocks, jumps) until `deadline`.
    fn sleep_until(&self, deadline: u64) {
        let _ = deadline;
    }
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_until(&self, deadline: u64) {
        let now = self.now_millis();
        if deadline > now {
            thread::sleep(Duration::from_millis(deadline - now));
        }
    }
}

/// Simulated clock shared between the engine and a test or headless host.
///
/// Every read can optionally advance time by a fixed amount, which lets
/// tests exercise budget overruns deterministically.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    advance_per_read: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(millis: u64) -> Self {
        let clock = Self::default();
        clock.set(millis);
        clock
    }

    pub fn set(&self, millis: u64) {
        self.now.set(millis);
    }

    pub fn advance(&self, millis: u64) {
        self.now.set(self.now.get() + millis);
    }

    pub fn set_advance_per_read(&self, millis: u64) {
        self.advance_per_read.set(millis);
    }

    pub fn peek(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.advance_per_read.get());
        now
    }

    fn sleep_until(&self, deadline: u64) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}
