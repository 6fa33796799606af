//! Exchange payload parsing.
//!
//! Payloads arrive wrapped in a `{code, msg, data}` envelope. Candlestick
//! `data` rows are 9-element string tuples
//! `[ts_ms, open, high, low, close, vol_base, vol_quote, vol_quote_alt, confirm_flag]`;
//! order book `data` holds `{asks, bids, ts}` with `[price, size, _, _]`
//! levels. All numeric fields are strings on the wire.
//!
//! The parser is stateless and pure: it validates, converts, and returns
//! canonical `Candle` / `BookSnap` values. Spike filtering is a separate
//! check the coordinator runs per candle against the instrument's last
//! price, so a rejected bar never reaches the data store.

use serde::Deserialize;
use thiserror::Error;

use crate::params::SpikeFilterParams;
use crate::types::{BookLevel, BookSnap, Candle};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed payload: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("exchange error - code: {code}, msg: {msg}")]
    Exchange { code: String, msg: String },

    #[error("candle row must have at least 9 fields, got {0}")]
    ShortCandleRow(usize),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid price '{0}'")]
    InvalidPrice(String),

    #[error("invalid volume '{0}'")]
    InvalidVolume(String),

    #[error("ohlc inconsistent: o={open} h={high} l={low} c={close}")]
    OhlcInconsistent {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("invalid {side} level at index {index}: {reason}")]
    InvalidLevel {
        side: &'static str,
        index: usize,
        reason: String,
    },

    #[error("crossed book: bid {bid} >= ask {ask}")]
    CrossedBook { bid: f64, ask: f64 },

    #[error("order book payload has no levels")]
    EmptyBook,

    #[error("price spike: close {close} deviates {delta} from last price {last_price} (limit {limit})")]
    PriceSpike {
        close: f64,
        last_price: f64,
        delta: f64,
        limit: f64,
    },
}

impl ParseError {
    /// Spike rejections drop a single bar; everything else drops the tick.
    pub fn is_spike(&self) -> bool {
        matches!(self, ParseError::PriceSpike { .. })
    }
}

#[derive(Debug, Deserialize)]
struct CandleEnvelope {
    code: String,
    #[serde(default)]
    msg: String,
    data: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct BookEnvelope {
    code: String,
    #[serde(default)]
    msg: String,
    data: Vec<RawBook>,
}

#[derive(Debug, Deserialize)]
struct RawBook {
    #[serde(default)]
    asks: Vec<Vec<String>>,
    #[serde(default)]
    bids: Vec<Vec<String>>,
    ts: String,
}

fn check_exchange_code(code: &str, msg: &str) -> Result<(), ParseError> {
    if code != "0" {
        return Err(ParseError::Exchange {
            code: code.to_string(),
            msg: msg.to_string(),
        });
    }
    Ok(())
}

/// Parse a candlestick payload into normalized candles, ascending by
/// timestamp. `confirm_flag == "1"` marks a closed bar.
pub fn parse_candlesticks(raw: &str) -> Result<Vec<Candle>, ParseError> {
    let env: CandleEnvelope = serde_json::from_str(raw)?;
    check_exchange_code(&env.code, &env.msg)?;

    let mut candles = Vec::with_capacity(env.data.len());
    for row in &env.data {
        candles.push(parse_candle_row(row)?);
    }

    candles.sort_by_key(|c| c.ts_ms);
    Ok(candles)
}

fn parse_candle_row(row: &[String]) -> Result<Candle, ParseError> {
    if row.len() < 9 {
        return Err(ParseError::ShortCandleRow(row.len()));
    }

    let ts_ms: u64 = row[0]
        .parse()
        .map_err(|_| ParseError::InvalidTimestamp(row[0].clone()))?;

    let parse_price = |s: &String| -> Result<f64, ParseError> {
        let v: f64 = s
            .parse()
            .map_err(|_| ParseError::InvalidPrice(s.clone()))?;
        if !v.is_finite() || v <= 0.0 {
            return Err(ParseError::InvalidPrice(s.clone()));
        }
        Ok(v)
    };

    let open = parse_price(&row[1])?;
    let high = parse_price(&row[2])?;
    let low = parse_price(&row[3])?;
    let close = parse_price(&row[4])?;

    let volume: f64 = row[5]
        .parse()
        .map_err(|_| ParseError::InvalidVolume(row[5].clone()))?;
    if !volume.is_finite() || volume < 0.0 {
        return Err(ParseError::InvalidVolume(row[5].clone()));
    }

    if high < open.max(close) || low > open.min(close) {
        return Err(ParseError::OhlcInconsistent {
            open,
            high,
            low,
            close,
        });
    }

    Ok(Candle {
        ts_ms,
        open,
        high,
        low,
        close,
        volume,
        is_closed: row[8] == "1",
    })
}

/// Parse an order book payload into a snapshot with bids descending and
/// asks ascending. Zero-size levels are dropped; a crossed book is
/// rejected.
pub fn parse_orderbook(raw: &str, max_levels: usize) -> Result<BookSnap, ParseError> {
    let env: BookEnvelope = serde_json::from_str(raw)?;
    check_exchange_code(&env.code, &env.msg)?;

    let book = env.data.first().ok_or(ParseError::EmptyBook)?;

    let ts_ms: u64 = book
        .ts
        .parse()
        .map_err(|_| ParseError::InvalidTimestamp(book.ts.clone()))?;

    let mut bids = parse_levels(&book.bids, "bid", max_levels)?;
    let mut asks = parse_levels(&book.asks, "ask", max_levels)?;

    if bids.is_empty() && asks.is_empty() {
        return Err(ParseError::EmptyBook);
    }

    bids.sort_by(|a, b| b.price.total_cmp(&a.price));
    asks.sort_by(|a, b| a.price.total_cmp(&b.price));

    if let (Some(bid), Some(ask)) = (bids.first(), asks.first()) {
        if bid.price >= ask.price {
            return Err(ParseError::CrossedBook {
                bid: bid.price,
                ask: ask.price,
            });
        }
    }

    Ok(BookSnap { ts_ms, bids, asks })
}

fn parse_levels(
    raw: &[Vec<String>],
    side: &'static str,
    max_levels: usize,
) -> Result<Vec<BookLevel>, ParseError> {
    let mut levels = Vec::new();

    for (index, row) in raw.iter().take(max_levels).enumerate() {
        if row.len() < 2 {
            return Err(ParseError::InvalidLevel {
                side,
                index,
                reason: format!("expected at least 2 fields, got {}", row.len()),
            });
        }

        let price: f64 = row[0].parse().map_err(|_| ParseError::InvalidLevel {
            side,
            index,
            reason: format!("bad price '{}'", row[0]),
        })?;
        let size: f64 = row[1].parse().map_err(|_| ParseError::InvalidLevel {
            side,
            index,
            reason: format!("bad size '{}'", row[1]),
        })?;

        if !price.is_finite() || price <= 0.0 {
            return Err(ParseError::InvalidLevel {
                side,
                index,
                reason: format!("non-positive price {price}"),
            });
        }
        if !size.is_finite() || size < 0.0 {
            return Err(ParseError::InvalidLevel {
                side,
                index,
                reason: format!("negative size {size}"),
            });
        }

        // Zero-size levels are deletions on most feeds.
        if size == 0.0 {
            continue;
        }

        levels.push(BookLevel { price, size });
    }

    Ok(levels)
}

/// Reject candles whose close jumps implausibly far from the last known
/// price. With ATR available the band is `atr_multiplier * atr`; before
/// warm-up it falls back to `fallback_pct * last_price`.
pub fn check_spike(
    candle: &Candle,
    last_price: f64,
    atr: Option<f64>,
    cfg: &SpikeFilterParams,
) -> Result<(), ParseError> {
    if !cfg.enable || last_price <= 0.0 {
        return Ok(());
    }

    let limit = match atr {
        Some(atr) if atr > 0.0 => cfg.atr_multiplier * atr,
        _ => cfg.fallback_pct * last_price,
    };

    let delta = (candle.close - last_price).abs();
    if delta > limit {
        return Err(ParseError::PriceSpike {
            close: candle.close,
            last_price,
            delta,
            limit,
        });
    }

    Ok(())
}
