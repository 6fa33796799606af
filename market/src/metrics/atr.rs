//! ATR (Average True Range) and NATR over closed bars.
//!
//! Wilder's method: the first ATR value is a simple average of the first
//! `period` true ranges, every later value is smoothed as
//! `atr = (atr * (period - 1) + tr) / period`.

use crate::types::Candle;

/// ATR over the closed-bar window. Needs `period + 1` bars because each
/// true range consumes the previous close.
pub fn calculate_atr(closed: &[&Candle], period: usize) -> Option<f64> {
    if period == 0 || closed.len() < period + 1 {
        return None;
    }

    let true_ranges: Vec<f64> = closed
        .windows(2)
        .map(|pair| pair[1].true_range(Some(pair[0].close)))
        .collect();

    let mut atr = true_ranges.iter().take(period).sum::<f64>() / period as f64;
    for tr in &true_ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
    }

    Some(atr)
}

/// NATR as a percentage of the last close.
pub fn calculate_natr(atr: f64, last_close: f64) -> Option<f64> {
    if last_close <= 0.0 {
        return None;
    }
    Some(100.0 * atr / last_close)
}
