//! Breakout plan lifecycle: admission, parameters, and the tick-driven
//! state machine.

pub mod machine;
pub mod model;
pub mod params;
pub mod runtime;
pub mod state;

pub use machine::{evaluate, TickContext, Transition};
pub use model::{BreakoutPlan, Direction, InvalidationCondition, PlanInput};
pub use params::{BreakoutParams, BreakoutParamsPatch, ConfigError};
pub use runtime::PlanRuntime;
pub use state::{InvalidReason, PlanState};
