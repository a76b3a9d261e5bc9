//! LogHandler - reports hung requests through `tracing`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{DelayedItem, TrackedRequest};
use crate::error::Result;
use crate::ports::{Clock, ExpiryHandler};

/// Diagnostic summary of one hung request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangReport {
    pub id: String,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub running_for_ms: i64,
    pub threshold_ms: u64,
}

impl HangReport {
    /// `threshold` is the configured hang threshold. The item's own delay is
    /// not used: a re-reported item is armed with the recheck interval.
    pub fn new(item: &DelayedItem<TrackedRequest>, now: DateTime<Utc>, threshold: Duration) -> Self {
        let request = item.payload();
        Self {
            id: request.request_id().to_string(),
            label: request.label().to_string(),
            started_at: request.started_at(),
            running_for_ms: request.elapsed_since_start(now).num_milliseconds(),
            threshold_ms: u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl fmt::Display for HangReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request {} ({}) has been running for {}ms, longer than the {}ms threshold (started {})",
            self.id,
            self.label,
            self.running_for_ms,
            self.threshold_ms,
            self.started_at.to_rfc3339(),
        )
    }
}

pub struct LogHandler<C> {
    clock: C,
    threshold: Duration,
    reports: AtomicU64,
}

impl<C: Clock> LogHandler<C> {
    pub fn new(clock: C, threshold: Duration) -> Self {
        Self {
            clock,
            threshold,
            reports: AtomicU64::new(0),
        }
    }

    /// Hang reports written so far.
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<C: Clock> ExpiryHandler<TrackedRequest> for LogHandler<C> {
    async fn on_expired(&self, item: DelayedItem<TrackedRequest>) -> Result<()> {
        let report = HangReport::new(&item, self.clock.now(), self.threshold);
        self.reports.fetch_add(1, Ordering::Relaxed);
        warn!(
            id = report.id.as_str(),
            label = report.label.as_str(),
            running_for_ms = report.running_for_ms,
            threshold_ms = report.threshold_ms,
            "{report}"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequestId;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    fn hung_item() -> (DelayedItem<TrackedRequest>, DateTime<Utc>) {
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let request = TrackedRequest::new(RequestId::from("r1"), "GET /slow", started);
        (DelayedItem::new(request, Duration::from_millis(500)), started)
    }

    #[test]
    fn report_describes_the_request() {
        let (item, started) = hung_item();
        let report = HangReport::new(
            &item,
            started + chrono::Duration::milliseconds(750),
            Duration::from_millis(500),
        );

        assert_eq!(report.id, "r1");
        assert_eq!(report.running_for_ms, 750);
        assert_eq!(report.threshold_ms, 500);

        let text = report.to_string();
        assert!(text.contains("r1"));
        assert!(text.contains("GET /slow"));
        assert!(text.contains("750ms"));
    }

    #[tokio::test]
    async fn handler_counts_reports() {
        let (item, started) = hung_item();
        let handler = LogHandler::new(
            FixedClock::new(started + chrono::Duration::seconds(1)),
            Duration::from_millis(500),
        );

        handler.on_expired(item.clone()).await.unwrap();
        handler.on_expired(item).await.unwrap();
        assert_eq!(handler.reports(), 2);
    }

    #[test]
    fn recheck_report_states_configured_threshold() {
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let request = TrackedRequest::new(RequestId::from("r1"), "GET /stuck", started);
        // A re-reported request comes back armed with the recheck interval.
        let follow_up = DelayedItem::new(request, Duration::from_millis(50));

        let report = HangReport::new(
            &follow_up,
            started + chrono::Duration::milliseconds(150),
            Duration::from_millis(100),
        );
        assert_eq!(report.threshold_ms, 100);
        assert_eq!(report.running_for_ms, 150);
        assert!(report.to_string().contains("the 100ms threshold"));
    }
}
