//! Tick coordinator.
//!
//! Per tick and per instrument: order book → candles (spike-filtered) →
//! one metrics snapshot → every bound plan in admission order → signal
//! emission. Everything up to emission is pure in-memory computation;
//! only the signal store insert awaits on IO.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use market::metrics::{MetricsCalculator, MetricsSnapshot};
use market::parser;
use market::store::InstrumentDataStore;
use plan::machine::{self, TickContext};
use plan::model::{AdmissionError, BreakoutPlan, PlanInput};
use plan::runtime::PlanRuntime;
use plan::state::PlanState;
use signal::emitter::{EmitOutcome, SignalEmitter};
use signal::model::{iso_utc, Signal, SignalMetrics, SignalRuntime, SignalState, PROTOCOL_VERSION};
use signal::score::{strength_score, ScoreInputs};

use crate::config::{EffectiveParams, EngineConfig};
use crate::error::EngineError;

struct PlanEntry {
    plan: BreakoutPlan,
    /// Frozen at admission; plan overrides only touch the breakout
    /// section.
    params: EffectiveParams,
    runtime: PlanRuntime,
    /// Terminal signal awaiting a successful store insert.
    pending: Option<Signal>,
}

struct InstrumentState {
    store: InstrumentDataStore,
    calculator: MetricsCalculator,
    /// Instrument-level parameters (defaults + instrument overrides).
    params: EffectiveParams,
    /// Bound plans, in admission order.
    plans: Vec<PlanEntry>,
}

impl InstrumentState {
    fn new(params: EffectiveParams) -> Self {
        Self {
            store: InstrumentDataStore::new(params.bar_window()),
            calculator: MetricsCalculator::new(&params.atr, &params.volume, &params.orderbook),
            params,
            plans: Vec::new(),
        }
    }
}

pub struct BreakoutEngine {
    config: EngineConfig,
    emitter: Arc<SignalEmitter>,
    instruments: HashMap<String, InstrumentState>,
}

impl BreakoutEngine {
    pub fn new(
        config: EngineConfig,
        emitter: Arc<SignalEmitter>,
    ) -> Result<Self, plan::params::ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            emitter,
            instruments: HashMap::new(),
        })
    }

    /// Admit a plan for evaluation. Rejection is all-or-nothing: a plan
    /// that fails validation leaves no trace in the engine.
    pub fn admit_plan(&mut self, input: PlanInput) -> Result<(), EngineError> {
        let plan = BreakoutPlan::from_input(input)?;

        if self.find_plan(&plan.id).is_some() {
            return Err(EngineError::DuplicatePlan(plan.id));
        }

        let params = self
            .config
            .resolve(&plan.instrument_id, &plan.overrides)
            .map_err(|source| EngineError::PlanConfig {
                plan_id: plan.id.clone(),
                source,
            })?;

        let instrument_id = plan.instrument_id.clone();
        let state = self.instrument_state_mut(&instrument_id);

        info!(
            plan_id = %plan.id,
            instrument_id = %instrument_id,
            direction = %plan.direction,
            trigger_level = plan.trigger_level,
            "admitted breakout plan"
        );

        state.plans.push(PlanEntry {
            plan,
            params,
            runtime: PlanRuntime::new(),
            pending: None,
        });

        Ok(())
    }

    /// Admit a plan from its JSON admission payload.
    pub fn admit_plan_json(&mut self, raw: &str) -> Result<(), EngineError> {
        let input: PlanInput = serde_json::from_str(raw).map_err(AdmissionError::Malformed)?;
        self.admit_plan(input)
    }

    /// Drop a plan from evaluation. Instrument data is kept.
    pub fn remove_plan(&mut self, plan_id: &str) -> bool {
        for state in self.instruments.values_mut() {
            if let Some(index) = state.plans.iter().position(|e| e.plan.id == plan_id) {
                state.plans.remove(index);
                info!(plan_id, "removed plan from evaluation");
                return true;
            }
        }
        false
    }

    /// Current lifecycle state of a plan.
    pub fn plan_state(&self, plan_id: &str) -> Option<&PlanState> {
        self.find_plan(plan_id).map(|e| e.runtime.state())
    }

    pub fn plan_count(&self) -> usize {
        self.instruments.values().map(|s| s.plans.len()).sum()
    }

    /// Plans not yet in a terminal state.
    pub fn active_plan_count(&self) -> usize {
        self.instruments
            .values()
            .flat_map(|s| s.plans.iter())
            .filter(|e| !e.runtime.state().is_terminal())
            .count()
    }

    /// Process one market data tick for an instrument.
    ///
    /// Payload order is fixed: the book first, then candles. Malformed
    /// payloads drop the whole tick; a spike-filtered candle drops only
    /// itself. Returns the signals that were durably emitted this tick.
    pub async fn evaluate_tick(
        &mut self,
        instrument_id: &str,
        candlestick_payload: Option<&str>,
        orderbook_payload: Option<&str>,
    ) -> Result<Vec<Signal>, EngineError> {
        let emitter = self.emitter.clone();

        let Some(state) = self.instruments.get_mut(instrument_id) else {
            debug!(instrument_id, "tick for untracked instrument ignored");
            return Ok(Vec::new());
        };

        let timeframe = state.params.time.evaluation_timeframe.clone();

        if let Some(raw) = orderbook_payload {
            let book = parser::parse_orderbook(raw, state.params.orderbook.max_levels)?;
            state.store.apply_book(book);
        }

        if let Some(raw) = candlestick_payload {
            for candle in parser::parse_candlesticks(raw)? {
                if let Some(last_price) = state.store.last_price() {
                    let atr = state.calculator.atr(&state.store, &timeframe);
                    if let Err(error) =
                        parser::check_spike(&candle, last_price, atr, &state.params.spike_filter)
                    {
                        warn!(
                            instrument_id,
                            ts_ms = candle.ts_ms,
                            %error,
                            "dropping spike-filtered candle"
                        );
                        continue;
                    }
                }
                state.store.apply_candle(&timeframe, candle);
            }
        }

        // Market time comes from the payloads; nothing to evaluate until
        // some data has arrived.
        let (Some(now_ms), Some(last_price)) = (state.store.last_ts_ms(), state.store.last_price())
        else {
            return Ok(Vec::new());
        };

        let metrics = state.calculator.snapshot(&state.store, &timeframe);

        let developing = state.store.developing_bar(&timeframe);
        let last_closed = state.store.last_closed_bar(&timeframe);

        for entry in state.plans.iter_mut() {
            if entry.runtime.state().is_terminal() {
                continue;
            }

            let tick = TickContext {
                now_ms,
                last_price,
                developing,
                last_closed,
                metrics: &metrics,
            };

            let fired = entry.runtime.advance(
                &entry.plan,
                &entry.params.breakout,
                entry.params.volume.min_volume_threshold,
                &tick,
            );

            if fired && !entry.runtime.signal_emitted() && entry.pending.is_none() {
                entry.pending = Some(build_signal(
                    &entry.plan,
                    &entry.params,
                    entry.runtime.state(),
                    &metrics,
                    last_price,
                ));
            }
        }

        // Emission pass: pending signals survive store failures and are
        // retried on the next tick.
        let mut emitted = Vec::new();
        for entry in state.plans.iter_mut() {
            let Some(pending) = entry.pending.as_ref() else {
                continue;
            };

            match emitter.emit_if_new(pending).await {
                Ok(EmitOutcome::Emitted) => {
                    emitted.push(pending.clone());
                    entry.runtime.mark_emitted();
                    entry.pending = None;
                }
                Ok(EmitOutcome::Duplicate) => {
                    debug!(plan_id = %entry.plan.id, "terminal signal already persisted");
                    entry.runtime.mark_emitted();
                    entry.pending = None;
                }
                Err(error) => {
                    warn!(
                        plan_id = %entry.plan.id,
                        %error,
                        "signal store unavailable; emission retried next tick"
                    );
                }
            }
        }

        Ok(emitted)
    }

    fn find_plan(&self, plan_id: &str) -> Option<&PlanEntry> {
        self.instruments
            .values()
            .flat_map(|s| s.plans.iter())
            .find(|e| e.plan.id == plan_id)
    }

    fn instrument_state_mut(&mut self, instrument_id: &str) -> &mut InstrumentState {
        if !self.instruments.contains_key(instrument_id) {
            let params = self
                .config
                .resolve(instrument_id, &Default::default())
                .expect("instrument config validated at construction");
            self.instruments
                .insert(instrument_id.to_string(), InstrumentState::new(params));
        }
        self.instruments
            .get_mut(instrument_id)
            .expect("state inserted above")
    }
}

/// Freeze a terminal state into its signal. Market time only: the
/// timestamp is the tick timestamp recorded by the transition.
fn build_signal(
    plan: &BreakoutPlan,
    params: &EffectiveParams,
    state: &PlanState,
    metrics: &MetricsSnapshot,
    last_price: f64,
) -> Signal {
    let (signal_state, timestamp_ms, invalid_reason, retest_pinbar) = match state {
        PlanState::Triggered {
            triggered_at,
            retest_pinbar,
            ..
        } => (SignalState::Triggered, *triggered_at, None, *retest_pinbar),
        PlanState::Invalid { reason, at, .. } => {
            (SignalState::Invalid, *at, Some(reason.to_string()), false)
        }
        PlanState::Expired { at } => (SignalState::Expired, *at, None, false),
        other => unreachable!("signal requested for non-terminal state {}", other.name()),
    };

    let strength = match signal_state {
        SignalState::Triggered => {
            let sweep_aligned = metrics.sweep == Some(machine::resisting_side(plan.direction));
            strength_score(
                &ScoreInputs {
                    rvol: metrics.rvol,
                    natr_pct: metrics.natr_pct,
                    min_rvol: params.breakout.min_rvol,
                    retest_pinbar,
                    sweep_aligned,
                },
                &params.scoring,
            )
        }
        _ => 0,
    };

    Signal {
        plan_id: plan.id.clone(),
        state: signal_state,
        timestamp_ms,
        runtime: SignalRuntime {
            armed_at: state.armed_at().and_then(iso_utc),
            triggered_at: state.triggered_at().and_then(iso_utc),
            invalid_reason,
        },
        last_price,
        metrics: SignalMetrics {
            rvol: metrics.rvol,
            natr_pct: metrics.natr_pct,
            atr: metrics.atr,
            pinbar: metrics.pinbar.is_some(),
        },
        strength_score: strength,
        protocol_version: PROTOCOL_VERSION.to_string(),
    }
}
