//! Signal emission: the signal record and JSON contract, strength
//! scoring, the durable store, delivery sinks, and the idempotent
//! emitter that ties them together.

pub mod delivery;
pub mod emitter;
pub mod model;
pub mod score;
pub mod store;

pub use emitter::{EmitOutcome, SignalEmitter};
pub use model::{Signal, SignalKey, SignalMetrics, SignalRuntime, SignalState, PROTOCOL_VERSION};
pub use score::{strength_score, ScoreInputs, ScoringParams};
pub use store::{SignalStore, StoreError};
