use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of time for everything that waits.
///
/// Production code uses [`SystemClock`]; tests use [`ManualClock`] so that
/// sleeps complete instantly and are observable.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that only moves when slept on or advanced by hand.
///
/// Clones share the same timeline, so a test can keep one handle while the
/// code under test owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Rc<RefCell<ManualClockInner>>,
}

#[derive(Debug)]
struct ManualClockInner {
    now: Instant,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ManualClockInner {
                now: Instant::now(),
                sleeps: Vec::new(),
            })),
        }
    }

    /// Moves time forward without recording a sleep, as if work took `by`.
    pub fn advance(&self, by: Duration) {
        self.inner.borrow_mut().now += by;
    }

    /// Every duration passed to [`Clock::sleep`], in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.borrow().sleeps.clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.inner.borrow().now
    }

    fn sleep(&self, duration: Duration) {
        let mut inner = self.inner.borrow_mut();
        inner.now += duration;
        inner.sleeps.push(duration);
    }
}

/// Fixed-interval wake-ups that neither drift nor pile up.
///
/// The first [`wait`](Ticker::wait) returns immediately. When an iteration
/// overruns the interval the next wait also returns immediately, and the
/// schedule is re-anchored to the current time instead of firing a burst of
/// catch-up ticks.
pub struct Ticker<C: Clock> {
    clock: C,
    interval: Duration,
    next_tick: Instant,
}

impl<C: Clock> Ticker<C> {
    pub fn new(interval: Duration, clock: C) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let next_tick = clock.now();
        Self {
            clock,
            interval,
            next_tick,
        }
    }

    /// Blocks until the next tick boundary.
    pub fn wait(&mut self) {
        loop {
            let now = self.clock.now();
            if now >= self.next_tick {
                self.next_tick = (self.next_tick + self.interval).max(now + self.interval);
                return;
            }
            self.clock.sleep(self.next_tick - now);
        }
    }
}
