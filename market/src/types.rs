use serde::{Deserialize, Serialize};

/// Normalized candlestick with a market timestamp in milliseconds.
///
/// A candle is either *developing* (`is_closed == false`, still mutable at
/// the head of the buffer) or *closed* (immutable history). Only closed
/// candles feed indicators and the volume history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base-currency volume.
    pub volume: f64,
    pub is_closed: bool,
}

impl Candle {
    /// High-low range of this candle.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// True range versus the previous close. Falls back to the plain
    /// high-low range when no previous close exists.
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => (self.high - self.low)
                .max((self.high - pc).abs())
                .max((self.low - pc).abs()),
            None => self.high - self.low,
        }
    }
}

/// Single order book level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Order book snapshot with sorted levels: bids descending, asks ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnap {
    pub ts_ms: u64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl BookSnap {
    /// Best bid price, `None` when the bid side is empty.
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    /// Best ask price, `None` when the ask side is empty.
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Mid price between best bid and ask.
    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    /// Bid-ask spread.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }

    /// Depth imbalance over the top `max_levels` levels:
    /// (bid_depth - ask_depth) / (bid_depth + ask_depth), in [-1, 1].
    /// `None` when both sides are empty.
    pub fn imbalance(&self, max_levels: usize) -> Option<f64> {
        let bid_depth: f64 = self.bids.iter().take(max_levels).map(|l| l.size).sum();
        let ask_depth: f64 = self.asks.iter().take(max_levels).map(|l| l.size).sum();
        let total = bid_depth + ask_depth;

        if total <= 0.0 {
            return None;
        }
        Some((bid_depth - ask_depth) / total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64, size: f64) -> BookLevel {
        BookLevel { price, size }
    }

    #[test]
    fn book_derived_prices() {
        let book = BookSnap {
            ts_ms: 1_000,
            bids: vec![level(99.5, 2.0), level(99.0, 5.0)],
            asks: vec![level(100.5, 1.0), level(101.0, 4.0)],
        };

        assert_eq!(book.best_bid(), Some(99.5));
        assert_eq!(book.best_ask(), Some(100.5));
        assert_eq!(book.mid(), Some(100.0));
        assert_eq!(book.spread(), Some(1.0));
    }

    #[test]
    fn book_imbalance_is_normalized() {
        let book = BookSnap {
            ts_ms: 1_000,
            bids: vec![level(99.5, 6.0)],
            asks: vec![level(100.5, 2.0)],
        };

        // (6 - 2) / (6 + 2) = 0.5
        assert_eq!(book.imbalance(5), Some(0.5));
    }

    #[test]
    fn empty_book_has_no_derived_values() {
        let book = BookSnap {
            ts_ms: 1_000,
            bids: vec![],
            asks: vec![],
        };

        assert_eq!(book.mid(), None);
        assert_eq!(book.imbalance(5), None);
    }

    #[test]
    fn true_range_uses_previous_close() {
        let candle = Candle {
            ts_ms: 0,
            open: 100.0,
            high: 101.0,
            low: 99.5,
            close: 100.5,
            volume: 10.0,
            is_closed: true,
        };

        // Gap down from 103: |high - prev_close| dominates.
        assert_eq!(candle.true_range(Some(103.0)), 3.5);
        assert_eq!(candle.true_range(None), 1.5);
    }
}
