//! Per-plan runtime: applies state machine transitions and tracks signal
//! emission for idempotency.

use tracing::info;

use crate::machine::{self, TickContext};
use crate::model::BreakoutPlan;
use crate::params::BreakoutParams;
use crate::state::PlanState;

/// Upper bound on cascaded transitions within one tick. The lifecycle DAG
/// has four ranks, so anything close to this indicates a machine bug.
const MAX_CASCADE: usize = 8;

#[derive(Debug)]
pub struct PlanRuntime {
    state: PlanState,
    signal_emitted: bool,
}

impl Default for PlanRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanRuntime {
    pub fn new() -> Self {
        Self {
            state: PlanState::Pending,
            signal_emitted: false,
        }
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    pub fn signal_emitted(&self) -> bool {
        self.signal_emitted
    }

    /// Mark the terminal signal as successfully handed to the store.
    pub fn mark_emitted(&mut self) {
        self.signal_emitted = true;
    }

    /// Run the state machine to a fixpoint for this tick. A break can be
    /// seen, confirmed and triggered within one tick, so evaluation
    /// cascades until the machine has nothing more to say.
    ///
    /// Returns whether a signal-emitting transition occurred.
    pub fn advance(
        &mut self,
        plan: &BreakoutPlan,
        params: &BreakoutParams,
        min_volume_threshold: f64,
        tick: &TickContext,
    ) -> bool {
        let mut emit = false;

        for _ in 0..MAX_CASCADE {
            let Some(transition) =
                machine::evaluate(plan, &self.state, params, min_volume_threshold, tick)
            else {
                break;
            };

            debug_assert!(
                transition.next.rank() >= self.state.rank(),
                "non-monotonic transition {} -> {} for plan {}",
                self.state.name(),
                transition.next.name(),
                plan.id
            );

            if transition.next.name() != self.state.name() {
                info!(
                    plan_id = %plan.id,
                    instrument_id = %plan.instrument_id,
                    from = self.state.name(),
                    to = transition.next.name(),
                    ts_ms = tick.now_ms,
                    price = tick.last_price,
                    "plan state transition"
                );
            }

            emit |= transition.emit_signal;
            let terminal = transition.next.is_terminal();
            self.state = transition.next;

            if terminal {
                break;
            }
        }

        emit
    }
}
