//! Consumer side: worker tasks draining an expiry queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::domain::RequestContext;
use crate::ports::ExpiryHandler;
use crate::queue::{ExpiryQueue, interruptible};

/// Worker group handle.
/// - dropping `shutdown_tx` stops every worker
/// - `shutdown_and_join()` waits for all of them
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers. With `rearm_every` set, delivered items stay live
    /// and come due again after that interval.
    pub fn spawn<T>(
        n: usize,
        queue: Arc<ExpiryQueue<T>>,
        handler: Arc<dyn ExpiryHandler<T>>,
        rearm_every: Option<Duration>,
    ) -> Self
    where
        T: RequestContext + Clone + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let h = Arc::clone(&handler);
            let rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, q, h, rearm_every, rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every worker to stop. A handler call already in flight finishes;
    /// a worker waiting for the next item stops right away.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "expiry worker panicked");
            }
        }
    }
}

async fn worker_loop<T>(
    worker_id: usize,
    queue: Arc<ExpiryQueue<T>>,
    handler: Arc<dyn ExpiryHandler<T>>,
    rearm_every: Option<Duration>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    T: RequestContext + Clone + Send + Sync + 'static,
{
    debug!(worker_id, "expiry worker started");
    loop {
        let next = match rearm_every {
            Some(every) => interruptible(&mut shutdown_rx, queue.process_next_and_rearm(every)).await,
            None => interruptible(&mut shutdown_rx, queue.process_next()).await,
        };
        let Ok(item) = next else {
            break;
        };

        let id = item.id().to_owned();
        if let Err(e) = handler.on_expired(item).await {
            warn!(worker_id, id = id.as_str(), error = %e, "expiry handler failed");
        }
    }
    debug!(worker_id, "expiry worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DelayedItem;
    use crate::error::{LapseError, Result};
    use crate::impls::ChannelHandler;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn workers_hand_expired_items_to_handler() {
        let queue: Arc<ExpiryQueue<&'static str>> = Arc::new(ExpiryQueue::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn ExpiryHandler<&'static str>> = Arc::new(ChannelHandler::new(tx));
        let group = WorkerGroup::spawn(2, Arc::clone(&queue), handler, None);
        assert_eq!(group.len(), 2);

        queue.add_request(DelayedItem::new("r1", ms(20)));
        queue.add_request(DelayedItem::new("r2", ms(10)));

        assert_eq!(rx.recv().await.unwrap().id(), "r2");
        assert_eq!(rx.recv().await.unwrap().id(), "r1");

        group.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_idle_workers() {
        let queue: Arc<ExpiryQueue<&'static str>> = Arc::new(ExpiryQueue::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn ExpiryHandler<&'static str>> = Arc::new(ChannelHandler::new(tx));
        let group = WorkerGroup::spawn(3, queue, handler, None);

        tokio::time::timeout(Duration::from_secs(1), group.shutdown_and_join())
            .await
            .expect("idle workers should stop on shutdown");
    }

    struct FailingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExpiryHandler<&'static str> for FailingHandler {
        async fn on_expired(&self, _item: DelayedItem<&'static str>) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LapseError::Handler("boom".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn handler_errors_do_not_stop_the_worker() {
        let queue: Arc<ExpiryQueue<&'static str>> = Arc::new(ExpiryQueue::new());
        let handler = Arc::new(FailingHandler {
            calls: AtomicUsize::new(0),
        });
        let group = WorkerGroup::spawn(1, Arc::clone(&queue), handler.clone(), None);

        queue.add_request(DelayedItem::new("r1", ms(10)));
        queue.add_request(DelayedItem::new("r2", ms(20)));
        tokio::time::sleep(ms(50)).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        group.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_workers_report_until_removed() {
        let queue: Arc<ExpiryQueue<&'static str>> = Arc::new(ExpiryQueue::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn ExpiryHandler<&'static str>> = Arc::new(ChannelHandler::new(tx));
        let group = WorkerGroup::spawn(1, Arc::clone(&queue), handler, Some(ms(100)));

        queue.add_request(DelayedItem::new("r1", ms(10)));
        assert_eq!(rx.recv().await.unwrap().id(), "r1");
        assert_eq!(rx.recv().await.unwrap().id(), "r1");

        queue.remove_request("r1");
        tokio::time::sleep(ms(500)).await;
        assert!(rx.try_recv().is_err());

        group.shutdown_and_join().await;
    }
}
