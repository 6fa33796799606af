//! Order book sweep detection.
//!
//! A sweep is a rapid depletion of resting liquidity on one side of the
//! book between two successive snapshots, implying aggressive absorption
//! in that direction. Detection compares top-of-book notional per side and
//! fires when the depletion ratio clears the configured threshold.

use std::fmt;

use serde::Serialize;

use crate::types::{BookLevel, BookSnap};

/// Side of the book that was swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepSide {
    Bid,
    Ask,
}

impl fmt::Display for SweepSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepSide::Bid => f.write_str("bid"),
            SweepSide::Ask => f.write_str("ask"),
        }
    }
}

/// Total notional (price * size) over the top `max_levels` levels.
pub fn notional(levels: &[BookLevel], max_levels: usize) -> f64 {
    levels
        .iter()
        .take(max_levels)
        .map(|l| l.price * l.size)
        .sum()
}

/// Compare successive snapshots and report the side whose notional
/// depleted past `depletion_threshold`. When both sides qualify the
/// larger depletion wins.
pub fn detect_sweep(
    prev: &BookSnap,
    curr: &BookSnap,
    max_levels: usize,
    depletion_threshold: f64,
) -> Option<SweepSide> {
    let depletion = |before: f64, after: f64| -> Option<f64> {
        if before <= 0.0 {
            return None;
        }
        Some((before - after) / before)
    };

    let bid = depletion(
        notional(&prev.bids, max_levels),
        notional(&curr.bids, max_levels),
    )
    .filter(|d| *d >= depletion_threshold);
    let ask = depletion(
        notional(&prev.asks, max_levels),
        notional(&curr.asks, max_levels),
    )
    .filter(|d| *d >= depletion_threshold);

    match (bid, ask) {
        (Some(b), Some(a)) if b >= a => Some(SweepSide::Bid),
        (Some(_), Some(_)) => Some(SweepSide::Ask),
        (Some(_), None) => Some(SweepSide::Bid),
        (None, Some(_)) => Some(SweepSide::Ask),
        (None, None) => None,
    }
}
