//! Metric-calculation parameter sections.
//!
//! Full structs carry the global defaults; the `*Patch` companions hold
//! per-instrument overrides and are applied field-wise (last write wins).

use serde::Deserialize;

/// ATR calculation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AtrParams {
    pub period: usize,
}

impl Default for AtrParams {
    fn default() -> Self {
        Self { period: 14 }
    }
}

/// Volume analysis parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeParams {
    pub rvol_period: usize,
    /// Minimum raw volume required on a closed break bar.
    pub min_volume_threshold: f64,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            rvol_period: 20,
            min_volume_threshold: 1000.0,
        }
    }
}

/// Order book analysis parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderbookParams {
    /// Levels considered per side for depth and sweep computations.
    pub max_levels: usize,
    /// Notional depletion ratio that declares a sweep.
    pub depletion_threshold: f64,
    pub imbalance_threshold: f64,
}

impl Default for OrderbookParams {
    fn default() -> Self {
        Self {
            max_levels: 5,
            depletion_threshold: 0.3,
            imbalance_threshold: 0.3,
        }
    }
}

/// Spike filtering parameters for inbound candles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpikeFilterParams {
    pub enable: bool,
    /// Reject a close further than `atr_multiplier * ATR` from last price.
    pub atr_multiplier: f64,
    /// Fallback band as a fraction of last price while ATR is warming up.
    pub fallback_pct: f64,
}

impl Default for SpikeFilterParams {
    fn default() -> Self {
        Self {
            enable: true,
            atr_multiplier: 10.0,
            fallback_pct: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AtrParamsPatch {
    pub period: Option<usize>,
}

impl AtrParamsPatch {
    pub fn apply(&self, base: &mut AtrParams) {
        if let Some(v) = self.period {
            base.period = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeParamsPatch {
    pub rvol_period: Option<usize>,
    pub min_volume_threshold: Option<f64>,
}

impl VolumeParamsPatch {
    pub fn apply(&self, base: &mut VolumeParams) {
        if let Some(v) = self.rvol_period {
            base.rvol_period = v;
        }
        if let Some(v) = self.min_volume_threshold {
            base.min_volume_threshold = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderbookParamsPatch {
    pub max_levels: Option<usize>,
    pub depletion_threshold: Option<f64>,
    pub imbalance_threshold: Option<f64>,
}

impl OrderbookParamsPatch {
    pub fn apply(&self, base: &mut OrderbookParams) {
        if let Some(v) = self.max_levels {
            base.max_levels = v;
        }
        if let Some(v) = self.depletion_threshold {
            base.depletion_threshold = v;
        }
        if let Some(v) = self.imbalance_threshold {
            base.imbalance_threshold = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpikeFilterParamsPatch {
    pub enable: Option<bool>,
    pub atr_multiplier: Option<f64>,
    pub fallback_pct: Option<f64>,
}

impl SpikeFilterParamsPatch {
    pub fn apply(&self, base: &mut SpikeFilterParams) {
        if let Some(v) = self.enable {
            base.enable = v;
        }
        if let Some(v) = self.atr_multiplier {
            base.atr_multiplier = v;
        }
        if let Some(v) = self.fallback_pct {
            base.fallback_pct = v;
        }
    }
}
