//! Strength scoring for triggered signals.

use serde::Deserialize;

/// Scoring weights. The defaults add up to a 0..=100 scale:
/// 30 base + 25 volume + 25 volatility + 10 pattern + 10 liquidity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringParams {
    pub base: u32,
    pub volume_max: u32,
    pub volatility_bonus: u32,
    /// NATR% band considered a healthy volatility regime.
    pub natr_low_pct: f64,
    pub natr_high_pct: f64,
    pub pattern_bonus: u32,
    pub liquidity_bonus: u32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            base: 30,
            volume_max: 25,
            volatility_bonus: 25,
            natr_low_pct: 0.5,
            natr_high_pct: 5.0,
            pattern_bonus: 10,
            liquidity_bonus: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringParamsPatch {
    pub base: Option<u32>,
    pub volume_max: Option<u32>,
    pub volatility_bonus: Option<u32>,
    pub natr_low_pct: Option<f64>,
    pub natr_high_pct: Option<f64>,
    pub pattern_bonus: Option<u32>,
    pub liquidity_bonus: Option<u32>,
}

impl ScoringParamsPatch {
    pub fn apply(&self, base: &mut ScoringParams) {
        if let Some(v) = self.base {
            base.base = v;
        }
        if let Some(v) = self.volume_max {
            base.volume_max = v;
        }
        if let Some(v) = self.volatility_bonus {
            base.volatility_bonus = v;
        }
        if let Some(v) = self.natr_low_pct {
            base.natr_low_pct = v;
        }
        if let Some(v) = self.natr_high_pct {
            base.natr_high_pct = v;
        }
        if let Some(v) = self.pattern_bonus {
            base.pattern_bonus = v;
        }
        if let Some(v) = self.liquidity_bonus {
            base.liquidity_bonus = v;
        }
    }
}

/// Inputs frozen at trigger time.
#[derive(Debug, Clone, Default)]
pub struct ScoreInputs {
    pub rvol: Option<f64>,
    pub natr_pct: Option<f64>,
    /// The plan's volume gate; the volume component only scores above it.
    pub min_rvol: f64,
    /// A pinbar printed at the retest (retest entries only).
    pub retest_pinbar: bool,
    /// Book sweep matched the breakout direction.
    pub sweep_aligned: bool,
}

/// Strength of a triggered signal, clamped to 0..=100.
///
/// Volume scores `min(volume_max, round((rvol - 1) * 10))` once RVOL
/// clears the gate; volatility pays out inside the NATR band; pattern and
/// liquidity are flat bonuses.
pub fn strength_score(inputs: &ScoreInputs, params: &ScoringParams) -> u32 {
    let mut score = params.base;

    if let Some(rvol) = inputs.rvol {
        if rvol >= inputs.min_rvol {
            let volume = ((rvol - 1.0) * 10.0).round().max(0.0) as u32;
            score += volume.min(params.volume_max);
        }
    }

    if let Some(natr) = inputs.natr_pct {
        if (params.natr_low_pct..=params.natr_high_pct).contains(&natr) {
            score += params.volatility_bonus;
        }
    }

    if inputs.retest_pinbar {
        score += params.pattern_bonus;
    }
    if inputs.sweep_aligned {
        score += params.liquidity_bonus;
    }

    score.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(rvol: f64, natr: f64) -> ScoreInputs {
        ScoreInputs {
            rvol: Some(rvol),
            natr_pct: Some(natr),
            min_rvol: 1.5,
            retest_pinbar: false,
            sweep_aligned: false,
        }
    }

    #[test]
    fn baseline_plus_volume_and_volatility() {
        // rvol 2.0 → min(25, 10) = 10; natr in band → 25.
        assert_eq!(strength_score(&inputs(2.0, 1.3), &ScoringParams::default()), 65);
    }

    #[test]
    fn volume_component_saturates() {
        // rvol 5.0 → round(40) capped at 25.
        assert_eq!(strength_score(&inputs(5.0, 1.3), &ScoringParams::default()), 80);
    }

    #[test]
    fn rvol_below_gate_scores_no_volume() {
        assert_eq!(strength_score(&inputs(1.4, 1.3), &ScoringParams::default()), 55);
    }

    #[test]
    fn natr_outside_band_scores_no_volatility() {
        assert_eq!(strength_score(&inputs(2.0, 8.0), &ScoringParams::default()), 40);
        assert_eq!(strength_score(&inputs(2.0, 0.4), &ScoringParams::default()), 40);
    }

    #[test]
    fn pattern_and_liquidity_bonuses_stack() {
        let score = strength_score(
            &ScoreInputs {
                retest_pinbar: true,
                sweep_aligned: true,
                ..inputs(2.0, 1.3)
            },
            &ScoringParams::default(),
        );

        assert_eq!(score, 85);
    }

    #[test]
    fn missing_metrics_leave_the_baseline() {
        let score = strength_score(&ScoreInputs::default(), &ScoringParams::default());
        assert_eq!(score, 30);
    }

    #[test]
    fn score_is_clamped_to_100() {
        let params = ScoringParams {
            base: 90,
            ..Default::default()
        };

        assert_eq!(strength_score(&inputs(5.0, 1.3), &params), 100);
    }
}
