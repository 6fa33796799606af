pub mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};

use cli::Cli;
use engine::{BreakoutEngine, EngineConfig};
use signal::delivery::{FileSink, HttpSink, SignalSink, StdoutSink};
use signal::emitter::SignalEmitter;
use signal::store::sqlite::SqliteSignalStore;

#[derive(Debug, Deserialize)]
struct FeedRecord {
    instrument_id: String,
    channel: Channel,
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Channel {
    Candles,
    Books,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logger::init_logger("breakout-engine");

    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let store = Arc::new(SqliteSignalStore::new(&args.db).await?);

    let mut sinks: Vec<Arc<dyn SignalSink>> = Vec::new();
    if let Some(url) = &args.webhook {
        sinks.push(Arc::new(HttpSink::new("webhook", url)));
    }
    if let Some(path) = &args.out_file {
        sinks.push(Arc::new(FileSink::new("file", path)));
    }
    if args.stdout {
        sinks.push(Arc::new(StdoutSink::default()));
    }

    let emitter = Arc::new(SignalEmitter::with_recovered_keys(store, sinks).await?);
    let mut engine = BreakoutEngine::new(config, emitter)?;

    let plans_raw = std::fs::read_to_string(&args.plans)
        .with_context(|| format!("reading plans {}", args.plans.display()))?;
    let plans: Vec<serde_json::Value> = serde_json::from_str(&plans_raw)?;
    for plan in plans {
        if let Err(error) = engine.admit_plan_json(&plan.to_string()) {
            warn!(%error, "plan rejected");
        }
    }
    info!(plans = engine.plan_count(), "plans admitted");

    let feed = std::fs::read_to_string(&args.feed)
        .with_context(|| format!("reading feed {}", args.feed.display()))?;

    let mut emitted = 0usize;
    for (line_no, line) in feed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: FeedRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(error) => {
                warn!(line = line_no + 1, %error, "skipping malformed feed line");
                continue;
            }
        };

        let payload = record.payload.to_string();
        let result = match record.channel {
            Channel::Candles => {
                engine
                    .evaluate_tick(&record.instrument_id, Some(&payload), None)
                    .await
            }
            Channel::Books => {
                engine
                    .evaluate_tick(&record.instrument_id, None, Some(&payload))
                    .await
            }
        };

        match result {
            Ok(signals) => emitted += signals.len(),
            Err(error) => warn!(line = line_no + 1, %error, "tick dropped"),
        }
    }

    info!(
        signals = emitted,
        active_plans = engine.active_plan_count(),
        "feed replay complete"
    );

    Ok(())
}
