//! MonitorBuilder - wires queue, tracker and workers from a `MonitorConfig`.

use std::sync::Arc;

use tracing::info;

use super::{RequestTracker, WorkerGroup};
use crate::config::MonitorConfig;
use crate::domain::TrackedRequest;
use crate::error::Result;
use crate::impls::LogHandler;
use crate::ports::{Clock, ExpiryHandler, IdGenerator, SystemClock, UlidGenerator};
use crate::queue::{ExpiryQueue, QueueStats};

/// Builds a [`Monitor`].
///
/// # Example
/// ```ignore
/// let monitor = MonitorBuilder::new(config).start()?;
/// let request = monitor.tracker().begin("GET /orders");
/// // ...
/// monitor.tracker().finish(request.id());
/// monitor.shutdown().await;
/// ```
///
/// The configuration is validated in `start()`; nothing is spawned when it
/// is invalid.
pub struct MonitorBuilder {
    config: MonitorConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    handler: Option<Arc<dyn ExpiryHandler<TrackedRequest>>>,
}

impl MonitorBuilder {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            clock: None,
            ids: None,
            handler: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replace the default [`LogHandler`].
    pub fn handler(mut self, handler: Arc<dyn ExpiryHandler<TrackedRequest>>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Validate and spawn the workers. Must run inside a tokio runtime.
    pub fn start(self) -> Result<Monitor> {
        self.config.validate()?;
        let threshold = self.config.hang_threshold();

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let handler = self
            .handler
            .unwrap_or_else(|| Arc::new(LogHandler::new(Arc::clone(&clock), threshold)));

        let queue = Arc::new(ExpiryQueue::new());
        let tracker = RequestTracker::new(
            Arc::clone(&queue),
            ids,
            clock,
            threshold,
        );
        let workers = WorkerGroup::spawn(
            self.config.workers,
            Arc::clone(&queue),
            handler,
            self.config.recheck_interval(),
        );
        info!(
            workers = self.config.workers,
            hang_threshold_ms = self.config.hang_threshold_ms,
            recheck_interval_ms = ?self.config.recheck_interval_ms,
            "hang monitor started"
        );

        Ok(Monitor {
            config: self.config,
            queue,
            tracker,
            workers,
        })
    }
}

/// A running hang monitor.
pub struct Monitor {
    config: MonitorConfig,
    queue: Arc<ExpiryQueue<TrackedRequest>>,
    tracker: RequestTracker,
    workers: WorkerGroup,
}

impl Monitor {
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    pub fn queue(&self) -> &Arc<ExpiryQueue<TrackedRequest>> {
        &self.queue
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Stop the workers, then drop everything still tracked.
    pub async fn shutdown(self) -> QueueStats {
        self.workers.shutdown_and_join().await;
        let stats = self.queue.stats();
        self.queue.clear();
        info!(
            delivered = stats.delivered,
            still_live = stats.live,
            "hang monitor stopped"
        );
        stats
    }
}
