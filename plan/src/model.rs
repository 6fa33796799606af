//! Breakout plan input model and admission.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::BreakoutParamsPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
        }
    }
}

impl FromStr for Direction {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => Err(AdmissionError::InvalidDirection(other.to_string())),
        }
    }
}

/// Pre-trigger invalidation rules carried inside the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvalidationCondition {
    PriceAbove { level: f64 },
    PriceBelow { level: f64 },
    TimeLimit { duration_seconds: u64 },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntryParams {
    /// Overrides `entry_price` as the breakout trigger level.
    pub level: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtraData {
    pub entry_params: EntryParams,
    pub invalidation_conditions: Vec<InvalidationCondition>,
    pub breakout_params: BreakoutParamsPatch,
}

/// Raw plan admission payload, as submitted by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanInput {
    pub id: String,
    pub instrument_id: String,
    pub direction: Direction,
    pub entry_type: String,
    pub entry_price: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub extra_data: ExtraData,
}

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("malformed plan payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported entry type '{0}', expected 'breakout'")]
    UnsupportedEntryType(String),

    #[error("invalid direction '{0}'")]
    InvalidDirection(String),

    #[error("plan has no positive trigger level")]
    MissingTriggerLevel,

    #[error("plan id must not be empty")]
    EmptyPlanId,

    #[error("instrument id must not be empty")]
    EmptyInstrumentId,
}

/// Validated plan, immutable once accepted.
#[derive(Debug, Clone)]
pub struct BreakoutPlan {
    pub id: String,
    pub instrument_id: String,
    pub direction: Direction,
    pub entry_price: f64,
    /// `entry_params.level` when present, else `entry_price`.
    pub trigger_level: f64,
    pub created_at_ms: u64,
    pub stop_loss: Option<f64>,
    pub invalidation_conditions: Vec<InvalidationCondition>,
    /// Per-plan breakout parameter overrides, merged by the resolver.
    pub overrides: BreakoutParamsPatch,
}

impl BreakoutPlan {
    /// Validate an admission payload into an immutable plan. Parameter
    /// overrides are validated separately after the config merge.
    pub fn from_input(input: PlanInput) -> Result<Self, AdmissionError> {
        if input.id.is_empty() {
            return Err(AdmissionError::EmptyPlanId);
        }
        if input.instrument_id.is_empty() {
            return Err(AdmissionError::EmptyInstrumentId);
        }
        if input.entry_type != "breakout" {
            return Err(AdmissionError::UnsupportedEntryType(input.entry_type));
        }

        let trigger_level = input
            .extra_data
            .entry_params
            .level
            .unwrap_or(input.entry_price);
        if !trigger_level.is_finite() || trigger_level <= 0.0 {
            return Err(AdmissionError::MissingTriggerLevel);
        }

        Ok(Self {
            id: input.id,
            instrument_id: input.instrument_id,
            direction: input.direction,
            entry_price: input.entry_price,
            trigger_level,
            created_at_ms: input.created_at.timestamp_millis().max(0) as u64,
            stop_loss: input.stop_loss,
            invalidation_conditions: input.extra_data.invalidation_conditions,
            overrides: input.extra_data.breakout_params,
        })
    }

    /// The tightest `time_limit` condition, if any.
    pub fn time_limit_seconds(&self) -> Option<u64> {
        self.invalidation_conditions
            .iter()
            .filter_map(|c| match c {
                InvalidationCondition::TimeLimit { duration_seconds } => Some(*duration_seconds),
                _ => None,
            })
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_plan_json() -> serde_json::Value {
        json!({
            "id": "plan-1",
            "instrument_id": "ETH-USDT-SWAP",
            "direction": "long",
            "entry_type": "breakout",
            "entry_price": 3308.0,
            "created_at": "2024-06-01T00:00:00Z"
        })
    }

    #[test]
    fn admits_minimal_plan() {
        let input: PlanInput = serde_json::from_value(base_plan_json()).unwrap();
        let plan = BreakoutPlan::from_input(input).unwrap();

        assert_eq!(plan.id, "plan-1");
        assert_eq!(plan.direction, Direction::Long);
        assert_eq!(plan.trigger_level, 3308.0);
        assert_eq!(plan.created_at_ms, 1_717_200_000_000);
        assert!(plan.invalidation_conditions.is_empty());
    }

    #[test]
    fn entry_level_overrides_entry_price() {
        let mut raw = base_plan_json();
        raw["extra_data"] = json!({ "entry_params": { "level": 3310.5 } });

        let input: PlanInput = serde_json::from_value(raw).unwrap();
        let plan = BreakoutPlan::from_input(input).unwrap();

        assert_eq!(plan.trigger_level, 3310.5);
        assert_eq!(plan.entry_price, 3308.0);
    }

    #[test]
    fn invalidation_conditions_deserialize_by_type_tag() {
        let mut raw = base_plan_json();
        raw["extra_data"] = json!({
            "invalidation_conditions": [
                { "type": "price_below", "level": 3200.0 },
                { "type": "time_limit", "duration_seconds": 3600 }
            ]
        });

        let input: PlanInput = serde_json::from_value(raw).unwrap();
        let plan = BreakoutPlan::from_input(input).unwrap();

        assert_eq!(plan.invalidation_conditions.len(), 2);
        assert_eq!(plan.time_limit_seconds(), Some(3600));
    }

    #[test]
    fn non_breakout_entry_type_is_rejected() {
        let mut raw = base_plan_json();
        raw["entry_type"] = json!("limit");

        let input: PlanInput = serde_json::from_value(raw).unwrap();
        let err = BreakoutPlan::from_input(input).unwrap_err();

        assert!(matches!(err, AdmissionError::UnsupportedEntryType(_)));
    }

    #[test]
    fn unknown_direction_fails_deserialization() {
        let mut raw = base_plan_json();
        raw["direction"] = json!("sideways");

        assert!(serde_json::from_value::<PlanInput>(raw).is_err());
    }

    #[test]
    fn non_positive_trigger_level_is_rejected() {
        let mut raw = base_plan_json();
        raw["entry_price"] = json!(0.0);

        let input: PlanInput = serde_json::from_value(raw).unwrap();
        let err = BreakoutPlan::from_input(input).unwrap_err();

        assert!(matches!(err, AdmissionError::MissingTriggerLevel));
    }
}
