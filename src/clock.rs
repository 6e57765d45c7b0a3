// File: src/clock.rs
//
// Discrete-event scheduler driving the simulation. Events fire in
// (time, insertion) order, one at a time.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::ops::Add;
use std::time::Duration;

use crate::error::ClockError;

/// A simulated timestamp, measured from the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    pub const ZERO: SimTime = SimTime(Duration::ZERO);

    pub fn from_secs(secs: u64) -> Self {
        SimTime(Duration::from_secs(secs))
    }

    /// Fails on negative, NaN or overflowing input.
    pub fn try_from_secs_f64(secs: f64) -> Option<Self> {
        Duration::try_from_secs_f64(secs).ok().map(SimTime)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for SimTime {
    fn from(d: Duration) -> Self {
        SimTime(d)
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}

/// An action waiting in the queue.
#[derive(Debug)]
struct Scheduled<A> {
    at: SimTime,
    seq: u64,
    action: A,
}

impl<A> PartialEq for Scheduled<A> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<A> Eq for Scheduled<A> {}

impl<A> PartialOrd for Scheduled<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A> Ord for Scheduled<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// An action that returned an error while the clock was running.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionFailure<E> {
    pub at: SimTime,
    pub error: E,
}

#[derive(Debug)]
pub struct EventClock<A> {
    now: SimTime,
    next_seq: u64,
    fired: u64,
    queue: BinaryHeap<Reverse<Scheduled<A>>>,
}

impl<A> Default for EventClock<A> {
    fn default() -> Self {
        EventClock::new()
    }
}

impl<A> EventClock<A> {
    pub fn new() -> Self {
        EventClock {
            now: SimTime::ZERO,
            next_seq: 0,
            fired: 0,
            queue: BinaryHeap::new(),
        }
    }

    /// Time of the last fired event, zero before the first one.
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn next_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|Reverse(s)| s.at)
    }

    pub fn schedule(&mut self, at: SimTime, action: A) -> Result<(), ClockError> {
        if at < self.now {
            return Err(ClockError::InvalidTime {
                requested: at,
                now: self.now,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled { at, seq, action }));
        Ok(())
    }

    pub fn schedule_after(&mut self, delay: Duration, action: A) -> Result<(), ClockError> {
        self.schedule(self.now + delay, action)
    }

    /// Pop the earliest event if it is due at or before `stop`, advancing the
    /// clock to its time.
    pub fn pop_due(&mut self, stop: SimTime) -> Option<(SimTime, A)> {
        match self.next_time() {
            Some(at) if at <= stop => {}
            _ => return None,
        }
        let Reverse(next) = self.queue.pop()?;
        self.now = next.at;
        self.fired += 1;
        log::trace!("clock: firing event #{} at {}", next.seq, next.at);
        Some((next.at, next.action))
    }

    /// Fire every event due at or before `stop`. The handler receives the
    /// clock so it can schedule follow-up events; its errors are collected and
    /// the run continues. Events still queued past `stop` are discarded.
    pub fn run<E, F>(&mut self, stop: SimTime, mut handler: F) -> Vec<ActionFailure<E>>
    where
        E: fmt::Display,
        F: FnMut(&mut Self, A) -> Result<(), E>,
    {
        let mut failures = vec![];
        while let Some((at, action)) = self.pop_due(stop) {
            if let Err(error) = handler(&mut *self, action) {
                log::warn!("action at {} failed: {}", at, error);
                failures.push(ActionFailure { at, error });
            }
        }
        if !self.queue.is_empty() {
            log::debug!(
                "clock stopped at {}, discarding {} events scheduled past {}",
                self.now,
                self.pending(),
                stop
            );
            self.queue.clear();
        }
        failures
    }
}
