use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lapse_core::impls::LogHandler;
use lapse_core::ports::{Clock, SystemClock};
use lapse_core::{MonitorBuilder, MonitorConfig, QueueStats, RequestContext};

/// Simulate a request workload and report the requests that hang.
#[derive(Debug, Parser)]
#[command(name = "lapse", version)]
struct Args {
    /// TOML config file (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of simulated requests.
    #[arg(long, default_value_t = 20)]
    requests: usize,

    /// Upper bound for a simulated request's duration.
    #[arg(long, default_value_t = 3_000)]
    max_duration_ms: u64,

    /// Share of requests that report progress half way through (0.0 - 1.0).
    #[arg(long, default_value_t = 0.25, value_parser = parse_ratio)]
    touch_ratio: f64,

    /// RNG seed, for repeatable runs.
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    requests: usize,
    hang_reports: u64,
    stale_entries: usize,
    queue: QueueStats,
}

fn parse_ratio(raw: &str) -> Result<f64, String> {
    let ratio: f64 = raw.parse().map_err(|e| format!("{raw} is not a number: {e}"))?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(format!("{raw} is not within 0.0 - 1.0"));
    }
    Ok(ratio)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LAPSE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "lapse_core=debug,lapse_cli=debug,info"
        } else {
            "lapse_core=info,lapse_cli=info,warn"
        })
    });
    let format = env::var("LAPSE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => registry.with(fmt::layer().json().with_ansi(false)).init(),
        _ => registry.with(fmt::layer().compact()).init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<MonitorConfig> {
    let config = match path {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let handler = Arc::new(LogHandler::new(Arc::clone(&clock), config.hang_threshold()));
    let monitor = MonitorBuilder::new(config)
        .clock(clock)
        .handler(handler.clone())
        .start()?;

    info!(
        requests = args.requests,
        seed = args.seed,
        hang_threshold_ms = monitor.config().hang_threshold_ms,
        "starting simulated workload"
    );
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut workload = JoinSet::new();
    for n in 0..args.requests {
        let tracker = monitor.tracker().clone();
        let duration = Duration::from_millis(rng.gen_range(0..=args.max_duration_ms));
        let touches = rng.gen_bool(args.touch_ratio);

        workload.spawn(async move {
            let request = tracker.begin(format!("simulated request #{n}"));
            if touches {
                tokio::time::sleep(duration / 2).await;
                tracker.touch(&request);
                tokio::time::sleep(duration - duration / 2).await;
            } else {
                tokio::time::sleep(duration).await;
            }
            tracker.finish(request.id());
            debug!(id = request.id(), took_ms = duration.as_millis() as u64, "request finished");
        });
    }

    tokio::select! {
        _ = async { while workload.join_next().await.is_some() {} } => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping early");
            workload.abort_all();
        }
    }

    let queue = monitor.shutdown().await;
    let summary = RunSummary {
        requests: args.requests,
        hang_reports: handler.reports(),
        stale_entries: queue.stale_entries(),
        queue,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", 0.0)]
    #[case("0.25", 0.25)]
    #[case("1.0", 1.0)]
    fn accepts_ratios_in_range(#[case] raw: &str, #[case] expected: f64) {
        assert_eq!(parse_ratio(raw), Ok(expected));
    }

    #[rstest]
    #[case("NaN")]
    #[case("inf")]
    #[case("-0.1")]
    #[case("1.5")]
    #[case("half")]
    fn rejects_ratios_gen_bool_cannot_take(#[case] raw: &str) {
        assert!(parse_ratio(raw).is_err());
    }

    #[test]
    fn touch_ratio_flag_is_validated() {
        assert!(Args::try_parse_from(["lapse", "--touch-ratio", "NaN"]).is_err());
        let args = Args::try_parse_from(["lapse", "--touch-ratio", "0.5"]).unwrap();
        assert_eq!(args.touch_ratio, 0.5);
    }
}
