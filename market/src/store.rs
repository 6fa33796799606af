//! Per-instrument rolling data store.
//!
//! Owns the bounded bar buffer per timeframe, the parallel volume history
//! (one entry per closed bar), the two most recent book snapshots, and the
//! last trade price. Mutated only by the engine coordinator; readers get a
//! consistent view because each instrument is driven by a single worker.

use std::collections::HashMap;

use tracing::debug;

use crate::rolling_window::RollingWindow;
use crate::types::{BookSnap, Candle};

/// What applying a candle did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Appended,
    Replaced,
    /// Candle older than the buffer head, or an attempt to reopen a
    /// closed bar. Nothing was mutated.
    Skipped,
}

#[derive(Debug)]
struct BarSeries {
    bars: RollingWindow<Candle>,
    vol_history: RollingWindow<f64>,
}

impl BarSeries {
    fn new(capacity: usize) -> Self {
        Self {
            bars: RollingWindow::new(capacity),
            vol_history: RollingWindow::new(capacity),
        }
    }
}

#[derive(Debug)]
pub struct InstrumentDataStore {
    series: HashMap<String, BarSeries>,
    capacity: usize,
    prev_book: Option<BookSnap>,
    curr_book: Option<BookSnap>,
    last_price: Option<f64>,
    last_ts_ms: Option<u64>,
}

impl InstrumentDataStore {
    /// `capacity` bounds both the bar buffer and the volume history per
    /// timeframe; callers size it as `max(atr.period, rvol_period) + margin`.
    pub fn new(capacity: usize) -> Self {
        Self {
            series: HashMap::new(),
            capacity,
            prev_book: None,
            curr_book: None,
            last_price: None,
            last_ts_ms: None,
        }
    }

    /// Apply one normalized candle, in market-timestamp order.
    ///
    /// - same timestamp as the buffer head: the developing head is
    ///   replaced in place; the replacement closing it appends exactly one
    ///   volume entry, a closed-over-closed replacement rewrites the last
    ///   entry;
    /// - later timestamp: a still-developing head is force-closed into
    ///   history first, then the candle is appended;
    /// - earlier timestamp: skipped.
    pub fn apply_candle(&mut self, timeframe: &str, candle: Candle) -> ApplyOutcome {
        let capacity = self.capacity;
        let series = self
            .series
            .entry(timeframe.to_string())
            .or_insert_with(|| BarSeries::new(capacity));

        let head = series.bars.latest().map(|h| (h.ts_ms, h.is_closed, h.volume));

        let outcome = match head {
            Some((head_ts, _, _)) if candle.ts_ms < head_ts => {
                debug!(
                    ts_ms = candle.ts_ms,
                    head_ts_ms = head_ts,
                    timeframe,
                    "skipping stale candle"
                );
                return ApplyOutcome::Skipped;
            }
            Some((head_ts, head_closed, _)) if candle.ts_ms == head_ts => {
                if head_closed && !candle.is_closed {
                    debug!(ts_ms = candle.ts_ms, timeframe, "ignoring reopen of closed bar");
                    return ApplyOutcome::Skipped;
                }

                if candle.is_closed {
                    if head_closed {
                        // Closed bar re-sent: keep history aligned.
                        if let Some(v) = series.vol_history.latest_mut() {
                            *v = candle.volume;
                        }
                    } else {
                        series.vol_history.push(candle.volume);
                    }
                }
                *series.bars.latest_mut().expect("head exists") = candle.clone();
                ApplyOutcome::Replaced
            }
            _ => {
                // The feed moved on without confirming the previous bar:
                // close it so indicators see a complete history.
                if let Some((_, false, head_volume)) = head {
                    series
                        .bars
                        .latest_mut()
                        .expect("head exists")
                        .is_closed = true;
                    series.vol_history.push(head_volume);
                }

                if candle.is_closed {
                    series.vol_history.push(candle.volume);
                }
                series.bars.push(candle.clone());
                ApplyOutcome::Appended
            }
        };

        self.last_price = Some(candle.close);
        self.last_ts_ms = Some(candle.ts_ms);
        outcome
    }

    /// Apply a book snapshot, shifting the previous one aside for sweep
    /// detection. Refreshes the last price from the mid when available.
    pub fn apply_book(&mut self, book: BookSnap) {
        if let Some(mid) = book.mid() {
            self.last_price = Some(mid);
            self.last_ts_ms = Some(book.ts_ms);
        }
        self.prev_book = self.curr_book.take();
        self.curr_book = Some(book);
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    pub fn last_ts_ms(&self) -> Option<u64> {
        self.last_ts_ms
    }

    pub fn curr_book(&self) -> Option<&BookSnap> {
        self.curr_book.as_ref()
    }

    pub fn prev_book(&self) -> Option<&BookSnap> {
        self.prev_book.as_ref()
    }

    /// Latest bar regardless of confirmation state.
    pub fn latest_bar(&self, timeframe: &str) -> Option<&Candle> {
        self.series.get(timeframe).and_then(|s| s.bars.latest())
    }

    /// Latest bar still under construction, if any.
    pub fn developing_bar(&self, timeframe: &str) -> Option<&Candle> {
        self.latest_bar(timeframe).filter(|c| !c.is_closed)
    }

    /// Most recent closed bar.
    pub fn last_closed_bar(&self, timeframe: &str) -> Option<&Candle> {
        let series = self.series.get(timeframe)?;
        series.bars.iter().rev().find(|c| c.is_closed)
    }

    /// Closed bars in timestamp order. Only the buffer head can be
    /// developing, so this is the whole buffer minus at most one entry.
    pub fn closed_bars(&self, timeframe: &str) -> Vec<&Candle> {
        match self.series.get(timeframe) {
            Some(series) => series.bars.iter().filter(|c| c.is_closed).collect(),
            None => Vec::new(),
        }
    }

    /// Volume history (one entry per closed bar), oldest first.
    pub fn volume_history(&self, timeframe: &str) -> Vec<f64> {
        match self.series.get(timeframe) {
            Some(series) => series.vol_history.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    pub fn bar_count(&self, timeframe: &str) -> usize {
        self.series.get(timeframe).map_or(0, |s| s.bars.len())
    }
}
