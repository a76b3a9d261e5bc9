use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use lapse_core::impls::LogHandler;
use lapse_core::ports::{Clock, FixedClock};
use lapse_core::{DelayedItem, ExpiryQueue, MonitorBuilder, MonitorConfig, RequestContext};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn hung_request_is_reported_until_it_finishes() {
    let config = MonitorConfig::from_toml_str(
        "hang_threshold_ms = 100\nrecheck_interval_ms = 50\nworkers = 2\n",
    )
    .unwrap();
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ));
    let handler = Arc::new(LogHandler::new(Arc::clone(&clock), config.hang_threshold()));

    let monitor = MonitorBuilder::new(config)
        .clock(clock)
        .handler(handler.clone())
        .start()
        .unwrap();

    let stuck = monitor.tracker().begin("GET /stuck");
    let quick = monitor.tracker().begin("GET /quick");
    tokio::time::sleep(ms(10)).await;
    monitor.tracker().finish(quick.id());

    // Reported at 100, 150 and 200ms.
    tokio::time::sleep(ms(215)).await;
    assert_eq!(handler.reports(), 3);
    assert!(monitor.tracker().is_tracked(stuck.id()));

    monitor.tracker().finish(stuck.id());
    tokio::time::sleep(ms(500)).await;
    assert_eq!(handler.reports(), 3);

    let stats = monitor.shutdown().await;
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.live, 0);
}

#[tokio::test(start_paused = true)]
async fn touched_request_is_not_reported_while_making_progress() {
    let config = MonitorConfig {
        hang_threshold_ms: 100,
        ..MonitorConfig::default()
    };
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ));
    let handler = Arc::new(LogHandler::new(Arc::clone(&clock), config.hang_threshold()));
    let monitor = MonitorBuilder::new(config)
        .clock(clock)
        .handler(handler.clone())
        .start()
        .unwrap();

    let request = monitor.tracker().begin("batch job");
    for _ in 0..5 {
        tokio::time::sleep(ms(80)).await;
        assert!(monitor.tracker().touch(&request));
    }
    assert_eq!(handler.reports(), 0);

    tokio::time::sleep(ms(150)).await;
    assert_eq!(handler.reports(), 1);
    assert!(!monitor.tracker().is_tracked(request.id()));

    monitor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn producers_and_consumers_on_separate_threads() {
    let queue: Arc<ExpiryQueue<String>> = Arc::new(ExpiryQueue::new());

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let id = format!("p{p}-{i}");
                    assert!(queue.add_request(DelayedItem::new(id.clone(), ms(5))));
                    if i % 5 == 0 {
                        queue.remove_request(&id);
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let mut delivered = 0;
    while let Ok(item) = tokio::time::timeout(ms(200), queue.process_next()).await {
        let seq: u32 = item.id().rsplit('-').next().unwrap().parse().unwrap();
        assert_ne!(seq % 5, 0, "{} was removed", item.id());
        delivered += 1;
    }
    assert_eq!(delivered, 4 * 40);
}
