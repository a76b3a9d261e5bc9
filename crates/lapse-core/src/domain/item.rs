//! `DelayedItem`: a payload plus the deadline it waits for.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use tokio::time::Instant;

use super::RequestContext;

/// Upper bound on a single delay. Keeps `enqueue_time + delay` from overflowing.
pub const MAX_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Unit for [`DelayedItem::remaining_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    fn scale(self, nanos: i128) -> i128 {
        match self {
            TimeUnit::Nanoseconds => nanos,
            TimeUnit::Microseconds => nanos / 1_000,
            TimeUnit::Milliseconds => nanos / 1_000_000,
            TimeUnit::Seconds => nanos / 1_000_000_000,
        }
    }
}

/// A payload waiting for its deadline.
///
/// Identity (`Eq`, `Hash`) is the payload's id and nothing else: two items
/// with the same id but different delays are the same logical item. Ordering
/// by deadline is available through [`DelayedItem::cmp_deadline`].
///
/// Times come from `tokio::time::Instant`, so a paused test clock drives them.
#[derive(Debug, Clone)]
pub struct DelayedItem<T> {
    payload: T,
    enqueue_time: Instant,
    delay: Duration,
}

impl<T: RequestContext> DelayedItem<T> {
    /// Arm `payload` to become ready `delay` from now.
    pub fn new(payload: T, delay: Duration) -> Self {
        Self::at(payload, Instant::now(), delay)
    }

    /// Arm with a signed millisecond delay (as read from configuration).
    /// Negative delays clamp to zero.
    pub fn from_millis(payload: T, delay_ms: i64) -> Self {
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
        Self::new(payload, delay)
    }

    pub fn at(payload: T, enqueue_time: Instant, delay: Duration) -> Self {
        Self {
            payload,
            enqueue_time,
            delay: delay.min(MAX_DELAY),
        }
    }

    /// The same payload with a fresh enqueue time and a new delay.
    pub fn rearm(self, delay: Duration) -> Self {
        Self::new(self.payload, delay)
    }

    pub fn id(&self) -> &str {
        self.payload.id()
    }
}

impl<T> DelayedItem<T> {
    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn enqueue_time(&self) -> Instant {
        self.enqueue_time
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn deadline(&self) -> Instant {
        self.enqueue_time + self.delay
    }

    /// Time left at `now`, zero once the deadline has passed.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.deadline().saturating_duration_since(now)
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    /// Signed time left in `unit`; negative once overdue.
    pub fn remaining_in(&self, unit: TimeUnit) -> i128 {
        let now = Instant::now();
        let deadline = self.deadline();
        let nanos = if deadline >= now {
            (deadline - now).as_nanos() as i128
        } else {
            -((now - deadline).as_nanos() as i128)
        };
        unit.scale(nanos)
    }

    pub fn remaining_millis(&self) -> i64 {
        i64::try_from(self.remaining_in(TimeUnit::Milliseconds)).unwrap_or(i64::MIN)
    }

    pub fn is_ready(&self) -> bool {
        self.deadline() <= Instant::now()
    }

    /// Soonest deadline first.
    pub fn cmp_deadline(&self, other: &Self) -> Ordering {
        self.deadline().cmp(&other.deadline())
    }
}

impl<T: RequestContext> PartialEq for DelayedItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<T: RequestContext> Eq for DelayedItem<T> {}

impl<T: RequestContext> Hash for DelayedItem<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}
