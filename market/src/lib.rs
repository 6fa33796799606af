//! Market data subsystem: payload normalization, per-instrument rolling
//! state, and metric derivation over closed bars.
//!
//! Data flow:
//! raw payload → parser → `InstrumentDataStore` → `MetricsCalculator`

pub mod metrics;
pub mod params;
pub mod parser;
pub mod rolling_window;
pub mod store;
pub mod types;

pub use parser::ParseError;
pub use store::InstrumentDataStore;
pub use types::{BookLevel, BookSnap, Candle};
