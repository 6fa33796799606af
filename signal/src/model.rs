//! Signal record and its JSON contract.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "breakout-v1";

/// Terminal plan state a signal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    Triggered,
    Invalid,
    Expired,
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalState::Triggered => f.write_str("triggered"),
            SignalState::Invalid => f.write_str("invalid"),
            SignalState::Expired => f.write_str("expired"),
        }
    }
}

impl FromStr for SignalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "triggered" => Ok(SignalState::Triggered),
            "invalid" => Ok(SignalState::Invalid),
            "expired" => Ok(SignalState::Expired),
            other => Err(format!("unknown signal state '{other}'")),
        }
    }
}

/// Deduplication key; globally unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    pub plan_id: String,
    pub state: SignalState,
    pub timestamp_ms: u64,
}

/// Lifecycle timestamps and the invalidation reason, ISO-8601 UTC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalRuntime {
    pub armed_at: Option<String>,
    pub triggered_at: Option<String>,
    pub invalid_reason: Option<String>,
}

/// Metric snapshot frozen at emission time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMetrics {
    pub rvol: Option<f64>,
    pub natr_pct: Option<f64>,
    pub atr: Option<f64>,
    pub pinbar: bool,
}

/// The emitted signal. Serialized as-is to sinks and persisted as the
/// store's payload blob; `timestamp_ms` keeps the blob self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub plan_id: String,
    pub state: SignalState,
    /// Market timestamp of the triggering tick.
    pub timestamp_ms: u64,
    pub runtime: SignalRuntime,
    pub last_price: f64,
    pub metrics: SignalMetrics,
    pub strength_score: u32,
    pub protocol_version: String,
}

impl Signal {
    pub fn key(&self) -> SignalKey {
        SignalKey {
            plan_id: self.plan_id.clone(),
            state: self.state,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// Format a market timestamp as ISO-8601 UTC with millisecond precision.
pub fn iso_utc(ts_ms: u64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ts_ms as i64)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}
