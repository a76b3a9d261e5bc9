//! lapse-core
//!
//! Expiry-ordered work queue with a live-membership guard, and the hang
//! monitor built on it.
//!
//! - **domain**: request ids, `DelayedItem`, `TrackedRequest`
//! - **queue**: `ExpiryQueue` (add / remove / requeue / process_next / clear)
//! - **ports**: `Clock`, `IdGenerator`, `ExpiryHandler`
//! - **app**: `RequestTracker`, `WorkerGroup`, `MonitorBuilder`
//! - **impls**: `LogHandler`, `ChannelHandler`
//! - **config**: `MonitorConfig` (TOML + env overrides)

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{Monitor, MonitorBuilder, RequestTracker, WorkerGroup};
pub use config::MonitorConfig;
pub use domain::{DelayedItem, RequestContext, RequestId, TimeUnit, TrackedRequest};
pub use error::{LapseError, Result};
pub use queue::{ExpiryQueue, QueueStats};
