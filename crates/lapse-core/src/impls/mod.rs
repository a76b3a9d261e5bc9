//! Impls: ready-made `ExpiryHandler`s.
//!
//! - **LogHandler**: writes a hang report through `tracing`
//! - **ChannelHandler**: forwards expired items to an mpsc channel

pub mod channel_handler;
pub mod log_handler;

pub use self::channel_handler::ChannelHandler;
pub use self::log_handler::{HangReport, LogHandler};
