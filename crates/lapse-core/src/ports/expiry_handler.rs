//! ExpiryHandler port: what consumers do with an expired item.

use async_trait::async_trait;

use crate::domain::DelayedItem;
use crate::error::Result;

/// Called by the worker group for every item the queue delivers.
///
/// Errors are logged by the caller and do not stop the loop.
#[async_trait]
pub trait ExpiryHandler<T>: Send + Sync {
    async fn on_expired(&self, item: DelayedItem<T>) -> Result<()>;
}
