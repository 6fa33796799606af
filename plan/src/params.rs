//! Breakout parameter set consumed by the state machine.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid config: {field} {message} (got {value})")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: &'static str,
    pub value: String,
}

impl ConfigError {
    fn new(field: &'static str, message: &'static str, value: impl ToString) -> Self {
        Self {
            field,
            message,
            value: value.to_string(),
        }
    }
}

/// Effective breakout parameters after the config merge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakoutParams {
    /// Minimum move past the level, as a percent of the level.
    pub penetration_pct: f64,
    /// ATR multiple the penetration must also clear when ATR is known.
    pub penetration_natr_mult: f64,
    /// Volume confirmation threshold.
    pub min_rvol: f64,
    /// Require a bar close beyond the level rather than a hold time.
    pub confirm_close: bool,
    /// Hold duration in market milliseconds when `confirm_close` is off.
    pub confirm_time_ms: u64,
    /// Retest entry instead of momentum entry.
    pub allow_retest_entry: bool,
    /// Retest proximity band, as a percent of the level.
    pub retest_band_pct: f64,
    /// Invalidate when a bar closes back on the pre-break side.
    pub fakeout_close_invalidate: bool,
    /// Require a direction-matching order book sweep.
    pub ob_sweep_check: bool,
    /// Break bar range floor, in ATR multiples.
    pub min_break_range_atr: f64,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        Self {
            penetration_pct: 0.05,
            penetration_natr_mult: 0.25,
            min_rvol: 1.5,
            confirm_close: true,
            confirm_time_ms: 750,
            allow_retest_entry: false,
            retest_band_pct: 0.03,
            fakeout_close_invalidate: true,
            ob_sweep_check: true,
            min_break_range_atr: 0.5,
        }
    }
}

impl BreakoutParams {
    /// Validate a merged parameter set. Violations fail the admission of
    /// the entity carrying the overrides, never the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.penetration_pct > 0.0 && self.penetration_pct <= 1.0) {
            return Err(ConfigError::new(
                "penetration_pct",
                "must be within (0, 1]",
                self.penetration_pct,
            ));
        }
        if self.penetration_natr_mult < 0.0 {
            return Err(ConfigError::new(
                "penetration_natr_mult",
                "must be non-negative",
                self.penetration_natr_mult,
            ));
        }
        if self.min_rvol < 0.0 {
            return Err(ConfigError::new(
                "min_rvol",
                "must be non-negative",
                self.min_rvol,
            ));
        }
        if self.confirm_time_ms == 0 {
            return Err(ConfigError::new(
                "confirm_time_ms",
                "must be positive",
                self.confirm_time_ms,
            ));
        }
        if !(self.retest_band_pct > 0.0 && self.retest_band_pct <= 1.0) {
            return Err(ConfigError::new(
                "retest_band_pct",
                "must be within (0, 1]",
                self.retest_band_pct,
            ));
        }
        if self.min_break_range_atr < 0.0 {
            return Err(ConfigError::new(
                "min_break_range_atr",
                "must be non-negative",
                self.min_break_range_atr,
            ));
        }
        Ok(())
    }
}

/// Field-wise overlay for instrument and per-plan overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakoutParamsPatch {
    pub penetration_pct: Option<f64>,
    pub penetration_natr_mult: Option<f64>,
    pub min_rvol: Option<f64>,
    pub confirm_close: Option<bool>,
    pub confirm_time_ms: Option<u64>,
    pub allow_retest_entry: Option<bool>,
    pub retest_band_pct: Option<f64>,
    pub fakeout_close_invalidate: Option<bool>,
    pub ob_sweep_check: Option<bool>,
    pub min_break_range_atr: Option<f64>,
}

impl BreakoutParamsPatch {
    pub fn apply(&self, base: &mut BreakoutParams) {
        if let Some(v) = self.penetration_pct {
            base.penetration_pct = v;
        }
        if let Some(v) = self.penetration_natr_mult {
            base.penetration_natr_mult = v;
        }
        if let Some(v) = self.min_rvol {
            base.min_rvol = v;
        }
        if let Some(v) = self.confirm_close {
            base.confirm_close = v;
        }
        if let Some(v) = self.confirm_time_ms {
            base.confirm_time_ms = v;
        }
        if let Some(v) = self.allow_retest_entry {
            base.allow_retest_entry = v;
        }
        if let Some(v) = self.retest_band_pct {
            base.retest_band_pct = v;
        }
        if let Some(v) = self.fakeout_close_invalidate {
            base.fakeout_close_invalidate = v;
        }
        if let Some(v) = self.ob_sweep_check {
            base.ob_sweep_check = v;
        }
        if let Some(v) = self.min_break_range_atr {
            base.min_break_range_atr = v;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
