//! Domain model (request identity, delayed items, tracked requests).

pub mod ids;
pub mod item;
pub mod request;

pub use ids::RequestId;
pub use item::{DelayedItem, TimeUnit};
pub use request::{RequestContext, TrackedRequest};
