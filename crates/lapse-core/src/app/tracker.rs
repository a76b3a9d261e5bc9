//! Producer side: start, refresh and finish tracked requests.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::domain::{DelayedItem, RequestContext, TrackedRequest};
use crate::ports::{Clock, IdGenerator};
use crate::queue::ExpiryQueue;

/// Registers requests with the expiry queue using the configured threshold.
///
/// Cheap to clone; every clone feeds the same queue.
#[derive(Clone)]
pub struct RequestTracker {
    queue: Arc<ExpiryQueue<TrackedRequest>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    threshold: Duration,
}

impl RequestTracker {
    pub fn new(
        queue: Arc<ExpiryQueue<TrackedRequest>>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        threshold: Duration,
    ) -> Self {
        Self {
            queue,
            ids,
            clock,
            threshold,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Start watching a new request and return it.
    pub fn begin(&self, label: impl Into<String>) -> TrackedRequest {
        let request = TrackedRequest::new(self.ids.generate_request_id(), label, self.clock.now());
        if !self.track(request.clone()) {
            warn!(id = request.id(), "generated request id already tracked");
        }
        request
    }

    /// Start watching a request built elsewhere. `false` if its id is
    /// already tracked.
    pub fn track(&self, request: TrackedRequest) -> bool {
        self.queue.add_request(DelayedItem::new(request, self.threshold))
    }

    /// Stop watching. Unknown ids are ignored.
    pub fn finish(&self, id: &str) -> bool {
        self.queue.remove_request(id)
    }

    /// The request made progress: restart its threshold.
    pub fn touch(&self, request: &TrackedRequest) -> bool {
        self.queue
            .requeue_request(DelayedItem::new(request.clone(), self.threshold))
    }

    /// Re-arm with an explicit delay (signed, negative clamps to zero).
    pub fn rearm(&self, request: &TrackedRequest, delay_ms: i64) -> bool {
        self.queue
            .requeue_request(DelayedItem::from_millis(request.clone(), delay_ms))
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.queue.is_live(id)
    }
}
