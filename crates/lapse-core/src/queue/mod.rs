//! Queue module: deadline heap, live-membership guard, and the expiry queue.

mod expiry;
mod membership;
mod scheduled;
mod stats;

pub use expiry::{ExpiryQueue, interruptible};
pub use stats::QueueStats;
