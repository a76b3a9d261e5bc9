//! App layer: producers, consumers, and the monitor that wires them.
//!
//! - **RequestTracker**: producer facade (begin / touch / finish)
//! - **WorkerGroup**: consumer tasks draining the queue into an `ExpiryHandler`
//! - **MonitorBuilder / Monitor**: startup wiring from `MonitorConfig`

pub mod builder;
pub mod tracker;
pub mod worker_loop;

pub use self::builder::{Monitor, MonitorBuilder};
pub use self::tracker::RequestTracker;
pub use self::worker_loop::WorkerGroup;
