use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RequestId;

/// Anything the expiry queue can track.
///
/// The id must be stable for the lifetime of the item and unique among
/// currently-live items. The queue reads it, never mutates it.
pub trait RequestContext {
    fn id(&self) -> &str;
}

impl RequestContext for RequestId {
    fn id(&self) -> &str {
        self.as_str()
    }
}

impl RequestContext for String {
    fn id(&self) -> &str {
        self
    }
}

impl RequestContext for &'static str {
    fn id(&self) -> &str {
        self
    }
}

/// An in-flight request watched for hangs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRequest {
    id: RequestId,
    label: String,
    started_at: DateTime<Utc>,
}

impl TrackedRequest {
    pub fn new(id: RequestId, label: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            label: label.into(),
            started_at,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.id
    }

    /// What the request is doing (URI, job name, ...). Only used in reports.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock time since the request started, clamped at zero.
    pub fn elapsed_since_start(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.started_at).max(chrono::Duration::zero())
    }
}

impl RequestContext for TrackedRequest {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}
