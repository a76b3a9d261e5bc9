//! Ports: the seams the queue's collaborators plug into.
//!
//! - Clock: wall-clock time for diagnostics (deadlines use the monotonic clock)
//! - IdGenerator: request ids
//! - ExpiryHandler: what a consumer does with an expired item

pub mod clock;
pub mod expiry_handler;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::expiry_handler::ExpiryHandler;
pub use self::id_generator::{IdGenerator, UlidGenerator};
