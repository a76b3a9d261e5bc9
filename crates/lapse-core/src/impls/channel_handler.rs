use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::DelayedItem;
use crate::error::{LapseError, Result};
use crate::ports::ExpiryHandler;

/// Forwards every expired item to a channel, for consumers that want to
/// handle them in their own task.
pub struct ChannelHandler<T> {
    tx: mpsc::UnboundedSender<DelayedItem<T>>,
}

impl<T> ChannelHandler<T> {
    pub fn new(tx: mpsc::UnboundedSender<DelayedItem<T>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> ExpiryHandler<T> for ChannelHandler<T> {
    async fn on_expired(&self, item: DelayedItem<T>) -> Result<()> {
        self.tx
            .send(item)
            .map_err(|_| LapseError::Handler("expiry channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn forwards_items() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = ChannelHandler::new(tx);

        handler
            .on_expired(DelayedItem::new("r1", Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().id(), "r1");
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handler = ChannelHandler::new(tx);

        let err = handler
            .on_expired(DelayedItem::new("r1", Duration::ZERO))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
