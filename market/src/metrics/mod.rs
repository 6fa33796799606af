//! Metric derivation over the instrument data store.
//!
//! All indicator inputs are closed bars; the developing bar never leaks
//! into ATR/NATR/RVOL. Metrics are recomputed lazily per call and carry
//! the timestamp of the most recent closed bar they were derived from.

pub mod atr;
pub mod candle;
pub mod orderbook;
pub mod volume;

use crate::params::{AtrParams, OrderbookParams, VolumeParams};
use crate::store::InstrumentDataStore;

pub use candle::PinbarKind;
pub use orderbook::SweepSide;

/// Point-in-time view of all derived metrics for one instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Timestamp of the latest closed bar the metrics were computed from.
    pub ts_ms: Option<u64>,
    pub atr: Option<f64>,
    pub natr_pct: Option<f64>,
    pub rvol: Option<f64>,
    /// Pinbar classification of the latest closed bar.
    pub pinbar: Option<PinbarKind>,
    /// True range of the latest closed bar.
    pub bar_range: Option<f64>,
    /// Book sweep detected between the two most recent snapshots.
    pub sweep: Option<SweepSide>,
    /// Depth imbalance of the current book, in [-1, 1].
    pub imbalance: Option<f64>,
}

/// Stateless calculator; all history lives in the data store.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    atr_period: usize,
    rvol_period: usize,
    max_levels: usize,
    depletion_threshold: f64,
}

impl MetricsCalculator {
    pub fn new(atr: &AtrParams, volume: &VolumeParams, orderbook: &OrderbookParams) -> Self {
        Self {
            atr_period: atr.period,
            rvol_period: volume.rvol_period,
            max_levels: orderbook.max_levels,
            depletion_threshold: orderbook.depletion_threshold,
        }
    }

    /// ATR over the closed bars of `timeframe`, for spike-filter context.
    pub fn atr(&self, store: &InstrumentDataStore, timeframe: &str) -> Option<f64> {
        atr::calculate_atr(&store.closed_bars(timeframe), self.atr_period)
    }

    /// Derive a full metrics snapshot from the store.
    pub fn snapshot(&self, store: &InstrumentDataStore, timeframe: &str) -> MetricsSnapshot {
        let closed = store.closed_bars(timeframe);

        let atr = atr::calculate_atr(&closed, self.atr_period);
        let last_close = closed.last().map(|c| c.close);
        let natr_pct = match (atr, last_close) {
            (Some(atr), Some(close)) => atr::calculate_natr(atr, close),
            _ => None,
        };

        let rvol = volume::calculate_rvol(&store.volume_history(timeframe), self.rvol_period);

        let (pinbar, bar_range) = match closed.last() {
            Some(last) => {
                let prev_close = closed
                    .len()
                    .checked_sub(2)
                    .map(|i| closed[i].close);
                (candle::detect_pinbar(last), Some(last.true_range(prev_close)))
            }
            None => (None, None),
        };

        let sweep = match (store.prev_book(), store.curr_book()) {
            (Some(prev), Some(curr)) => orderbook::detect_sweep(
                prev,
                curr,
                self.max_levels,
                self.depletion_threshold,
            ),
            _ => None,
        };

        let imbalance = store
            .curr_book()
            .and_then(|b| b.imbalance(self.max_levels));

        MetricsSnapshot {
            ts_ms: closed.last().map(|c| c.ts_ms),
            atr,
            natr_pct,
            rvol,
            pinbar,
            bar_range,
            sweep,
            imbalance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;

    fn closed(ts_ms: u64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            ts_ms,
            open,
            high,
            low,
            close,
            volume,
            is_closed: true,
        }
    }

    fn calculator() -> MetricsCalculator {
        MetricsCalculator::new(
            &AtrParams { period: 3 },
            &VolumeParams {
                rvol_period: 3,
                min_volume_threshold: 0.0,
            },
            &OrderbookParams::default(),
        )
    }

    fn warm_store(bars: usize) -> InstrumentDataStore {
        let mut store = InstrumentDataStore::new(32);
        for i in 0..bars as u64 {
            store.apply_candle(
                "1m",
                closed(i * 60_000, 100.0, 101.0, 99.0, 100.0, 1_000.0),
            );
        }
        store
    }

    #[test]
    fn cold_store_yields_empty_snapshot() {
        let snap = calculator().snapshot(&InstrumentDataStore::new(8), "1m");

        assert_eq!(snap, MetricsSnapshot::default());
    }

    #[test]
    fn warm_snapshot_has_all_bar_metrics() {
        let snap = calculator().snapshot(&warm_store(5), "1m");

        assert_eq!(snap.ts_ms, Some(4 * 60_000));
        // Identical 2.0-range bars: ATR is exactly 2.0, NATR 2%.
        assert_eq!(snap.atr, Some(2.0));
        assert_eq!(snap.natr_pct, Some(2.0));
        assert_eq!(snap.rvol, Some(1.0));
        assert_eq!(snap.bar_range, Some(2.0));
        assert!(snap.sweep.is_none());
    }

    #[test]
    fn developing_bar_does_not_move_metrics() {
        let mut store = warm_store(5);
        let before = calculator().snapshot(&store, "1m");

        store.apply_candle(
            "1m",
            Candle {
                ts_ms: 5 * 60_000,
                open: 100.0,
                high: 140.0,
                low: 100.0,
                close: 140.0,
                volume: 9_999.0,
                is_closed: false,
            },
        );
        let after = calculator().snapshot(&store, "1m");

        assert_eq!(before.atr, after.atr);
        assert_eq!(before.rvol, after.rvol);
        assert_eq!(before.ts_ms, after.ts_ms);
    }

    #[test]
    fn snapshot_before_warmup_is_none() {
        // 3 closed bars < period + 1.
        let snap = calculator().snapshot(&warm_store(3), "1m");

        assert!(snap.atr.is_none());
        assert!(snap.rvol.is_none());
        // Pinbar and range only need one closed bar.
        assert!(snap.bar_range.is_some());
    }
}
