//! Candle structure analysis: pinbar detection.

use serde::Serialize;

use crate::types::Candle;

/// Maximum body share of the full range for a pinbar.
const PINBAR_MAX_BODY_RATIO: f64 = 0.33;
/// The rejection wick must be at least this multiple of the body.
const PINBAR_MIN_WICK_MULT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinbarKind {
    /// Long lower wick: sellers rejected.
    Bullish,
    /// Long upper wick: buyers rejected.
    Bearish,
}

/// Classify a candle as a pinbar: body at most a third of the range, one
/// wick at least twice the body, the opposite wick no longer than the
/// body. The long wick's side decides the classification.
pub fn detect_pinbar(candle: &Candle) -> Option<PinbarKind> {
    let range = candle.range();
    if range <= 0.0 {
        return None;
    }

    let body = (candle.close - candle.open).abs();
    let upper_wick = candle.high - candle.open.max(candle.close);
    let lower_wick = candle.open.min(candle.close) - candle.low;

    if body > PINBAR_MAX_BODY_RATIO * range {
        return None;
    }

    if lower_wick >= PINBAR_MIN_WICK_MULT * body && upper_wick <= body {
        return Some(PinbarKind::Bullish);
    }
    if upper_wick >= PINBAR_MIN_WICK_MULT * body && lower_wick <= body {
        return Some(PinbarKind::Bearish);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            ts_ms: 0,
            open,
            high,
            low,
            close,
            volume: 1.0,
            is_closed: true,
        }
    }

    #[test]
    fn long_lower_wick_is_bullish() {
        // body 0.2, lower wick 1.5, upper wick 0.1 over a 1.8 range
        let c = candle(99.9, 100.2, 98.4, 100.1);
        assert_eq!(detect_pinbar(&c), Some(PinbarKind::Bullish));
    }

    #[test]
    fn long_upper_wick_is_bearish() {
        let c = candle(100.1, 101.8, 99.9, 99.95);
        assert_eq!(detect_pinbar(&c), Some(PinbarKind::Bearish));
    }

    #[test]
    fn large_body_is_not_a_pinbar() {
        let c = candle(99.0, 101.0, 98.9, 100.9);
        assert_eq!(detect_pinbar(&c), None);
    }

    #[test]
    fn symmetric_wicks_are_not_a_pinbar() {
        // Both wicks long: neither side "rejected".
        let c = candle(99.95, 101.0, 99.0, 100.05);
        assert_eq!(detect_pinbar(&c), None);
    }

    #[test]
    fn flat_candle_is_not_a_pinbar() {
        let c = candle(100.0, 100.0, 100.0, 100.0);
        assert_eq!(detect_pinbar(&c), None);
    }
}
