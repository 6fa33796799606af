//! Configuration document and the three-layer parameter resolver.
//!
//! Layers, weakest first: global `defaults`, per-instrument overrides,
//! per-plan `extra_data.breakout_params`. Overrides are typed patches
//! applied field-wise, so the merge is last-write-wins per leaf key.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use market::params::{
    AtrParams, AtrParamsPatch, OrderbookParams, OrderbookParamsPatch, SpikeFilterParams,
    SpikeFilterParamsPatch, VolumeParams, VolumeParamsPatch,
};
use plan::params::{BreakoutParams, BreakoutParamsPatch, ConfigError};
use signal::score::{ScoringParams, ScoringParamsPatch};

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeParams {
    /// Timeframe tag the engine evaluates plans on.
    pub evaluation_timeframe: String,
}

impl Default for TimeParams {
    fn default() -> Self {
        Self {
            evaluation_timeframe: "1m".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeParamsPatch {
    pub evaluation_timeframe: Option<String>,
}

impl TimeParamsPatch {
    pub fn apply(&self, base: &mut TimeParams) {
        if let Some(v) = &self.evaluation_timeframe {
            base.evaluation_timeframe = v.clone();
        }
    }
}

/// The `defaults` document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsDoc {
    pub breakout_params: BreakoutParams,
    pub atr_params: AtrParams,
    pub volume_params: VolumeParams,
    pub orderbook_params: OrderbookParams,
    pub time_params: TimeParams,
    pub scoring_params: ScoringParams,
    pub spike_filter: SpikeFilterParams,
}

/// Per-instrument overrides: the same sections, all optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstrumentOverrides {
    pub breakout_params: BreakoutParamsPatch,
    pub atr_params: AtrParamsPatch,
    pub volume_params: VolumeParamsPatch,
    pub orderbook_params: OrderbookParamsPatch,
    pub time_params: TimeParamsPatch,
    pub scoring_params: ScoringParamsPatch,
    pub spike_filter: SpikeFilterParamsPatch,
}

/// Frozen parameter set handed to the state machine and metrics layer.
#[derive(Debug, Clone)]
pub struct EffectiveParams {
    pub breakout: BreakoutParams,
    pub atr: AtrParams,
    pub volume: VolumeParams,
    pub orderbook: OrderbookParams,
    pub time: TimeParams,
    pub scoring: ScoringParams,
    pub spike_filter: SpikeFilterParams,
}

impl EffectiveParams {
    /// Bar buffer bound: enough closed bars for the slowest indicator,
    /// plus headroom for the developing bar and one replacement.
    pub fn bar_window(&self) -> usize {
        self.atr.period.max(self.volume.rvol_period) + 2
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.breakout.validate()?;

        if self.atr.period < 2 {
            return Err(config_error("atr.period", "must be at least 2", self.atr.period));
        }
        if self.volume.rvol_period < 1 {
            return Err(config_error(
                "volume.rvol_period",
                "must be at least 1",
                self.volume.rvol_period,
            ));
        }
        if self.volume.min_volume_threshold < 0.0 {
            return Err(config_error(
                "volume.min_volume_threshold",
                "must be non-negative",
                self.volume.min_volume_threshold,
            ));
        }
        if self.orderbook.max_levels < 1 {
            return Err(config_error(
                "orderbook.max_levels",
                "must be at least 1",
                self.orderbook.max_levels,
            ));
        }
        if !(0.0..=1.0).contains(&self.orderbook.depletion_threshold) {
            return Err(config_error(
                "orderbook.depletion_threshold",
                "must be within [0, 1]",
                self.orderbook.depletion_threshold,
            ));
        }
        if self.spike_filter.atr_multiplier <= 0.0 {
            return Err(config_error(
                "spike_filter.atr_multiplier",
                "must be positive",
                self.spike_filter.atr_multiplier,
            ));
        }
        if self.spike_filter.fallback_pct <= 0.0 {
            return Err(config_error(
                "spike_filter.fallback_pct",
                "must be positive",
                self.spike_filter.fallback_pct,
            ));
        }
        if self.time.evaluation_timeframe.is_empty() {
            return Err(config_error(
                "time.evaluation_timeframe",
                "must not be empty",
                "\"\"",
            ));
        }

        Ok(())
    }
}

fn config_error(field: &'static str, message: &'static str, value: impl ToString) -> ConfigError {
    ConfigError {
        field,
        message,
        value: value.to_string(),
    }
}

/// Root configuration: global defaults plus instrument overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub defaults: DefaultsDoc,
    pub instruments: HashMap<String, InstrumentOverrides>,
}

impl EngineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Validate the defaults and every instrument layer in isolation.
    /// Plan overrides are validated when the plan is admitted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve("", &BreakoutParamsPatch::default())?;
        for instrument_id in self.instruments.keys() {
            self.resolve(instrument_id, &BreakoutParamsPatch::default())?;
        }
        Ok(())
    }

    /// Merge the three layers for one plan evaluation and validate the
    /// result.
    pub fn resolve(
        &self,
        instrument_id: &str,
        plan_overrides: &BreakoutParamsPatch,
    ) -> Result<EffectiveParams, ConfigError> {
        let mut breakout = self.defaults.breakout_params.clone();
        let mut atr = self.defaults.atr_params.clone();
        let mut volume = self.defaults.volume_params.clone();
        let mut orderbook = self.defaults.orderbook_params.clone();
        let mut time = self.defaults.time_params.clone();
        let mut scoring = self.defaults.scoring_params.clone();
        let mut spike_filter = self.defaults.spike_filter.clone();

        if let Some(overrides) = self.instruments.get(instrument_id) {
            overrides.breakout_params.apply(&mut breakout);
            overrides.atr_params.apply(&mut atr);
            overrides.volume_params.apply(&mut volume);
            overrides.orderbook_params.apply(&mut orderbook);
            overrides.time_params.apply(&mut time);
            overrides.scoring_params.apply(&mut scoring);
            overrides.spike_filter.apply(&mut spike_filter);
        }

        plan_overrides.apply(&mut breakout);

        let effective = EffectiveParams {
            breakout,
            atr,
            volume,
            orderbook,
            time,
            scoring,
            spike_filter,
        };
        effective.validate()?;
        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let config = EngineConfig::default();
        let params = config.resolve("ETH-USDT-SWAP", &BreakoutParamsPatch::default()).unwrap();

        assert_eq!(params.breakout, BreakoutParams::default());
        assert_eq!(params.atr.period, 14);
        assert_eq!(params.volume.rvol_period, 20);
        assert_eq!(params.time.evaluation_timeframe, "1m");
        assert_eq!(params.bar_window(), 22);
    }

    #[test]
    fn yaml_document_round_trips_all_sections() {
        let raw = r#"
defaults:
  breakout_params:
    min_rvol: 2.0
    confirm_close: false
  atr_params:
    period: 10
  volume_params:
    rvol_period: 30
  orderbook_params:
    depletion_threshold: 0.4
  time_params:
    evaluation_timeframe: "5m"
  scoring_params:
    base: 20
  spike_filter:
    atr_multiplier: 8.0
instruments:
  ETH-USDT-SWAP:
    breakout_params:
      min_rvol: 1.2
"#;

        let config = EngineConfig::from_yaml_str(raw).unwrap();
        let params = config.resolve("ETH-USDT-SWAP", &BreakoutParamsPatch::default()).unwrap();

        assert_eq!(params.breakout.min_rvol, 1.2); // instrument wins
        assert!(!params.breakout.confirm_close); // defaults doc
        assert_eq!(params.atr.period, 10);
        assert_eq!(params.volume.rvol_period, 30);
        assert_eq!(params.orderbook.depletion_threshold, 0.4);
        assert_eq!(params.time.evaluation_timeframe, "5m");
        assert_eq!(params.scoring.base, 20);
        assert_eq!(params.spike_filter.atr_multiplier, 8.0);
    }

    #[test]
    fn plan_layer_wins_over_instrument_layer() {
        let mut config = EngineConfig::default();
        config.instruments.insert(
            "ETH-USDT-SWAP".to_string(),
            InstrumentOverrides {
                breakout_params: BreakoutParamsPatch {
                    min_rvol: Some(2.0),
                    retest_band_pct: Some(0.05),
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let plan_patch = BreakoutParamsPatch {
            min_rvol: Some(3.0),
            ..Default::default()
        };
        let params = config.resolve("ETH-USDT-SWAP", &plan_patch).unwrap();

        assert_eq!(params.breakout.min_rvol, 3.0);
        assert_eq!(params.breakout.retest_band_pct, 0.05);
    }

    #[test]
    fn other_instruments_are_unaffected_by_overrides() {
        let mut config = EngineConfig::default();
        config.instruments.insert(
            "ETH-USDT-SWAP".to_string(),
            InstrumentOverrides {
                atr_params: AtrParamsPatch { period: Some(7) },
                ..Default::default()
            },
        );

        let other = config.resolve("BTC-USDT-SWAP", &BreakoutParamsPatch::default()).unwrap();
        assert_eq!(other.atr.period, 14);
    }

    #[test]
    fn invalid_merged_params_fail_resolution() {
        let plan_patch = BreakoutParamsPatch {
            penetration_pct: Some(1.5),
            ..Default::default()
        };

        let err = EngineConfig::default()
            .resolve("ETH-USDT-SWAP", &plan_patch)
            .unwrap_err();
        assert_eq!(err.field, "penetration_pct");
    }

    #[test]
    fn section_validation_covers_metric_params() {
        let mut config = EngineConfig::default();
        config.defaults.atr_params.period = 1;

        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "atr.period");
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let raw = r#"
defaults:
  breakout_params:
    not_a_real_knob: 1
"#;

        assert!(EngineConfig::from_yaml_str(raw).is_err());
    }
}
