//! Breakout state machine.
//!
//! `evaluate` is a pure function from (state, tick inputs, parameters) to
//! an optional transition. It never performs IO and never mutates its
//! inputs; the runtime applies transitions and the coordinator handles
//! signal emission. Invalidation always wins over progression when both
//! fire on the same tick.

use market::metrics::{MetricsSnapshot, SweepSide};
use market::types::Candle;
use tracing::debug;

use crate::model::{BreakoutPlan, Direction, InvalidationCondition};
use crate::params::BreakoutParams;
use crate::state::{InvalidReason, PlanState};

/// Per-tick market inputs. All timestamps are market milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub now_ms: u64,
    pub last_price: f64,
    /// Latest bar still under construction, if any.
    pub developing: Option<&'a Candle>,
    /// Most recent closed bar, if any.
    pub last_closed: Option<&'a Candle>,
    pub metrics: &'a MetricsSnapshot,
}

impl<'a> TickContext<'a> {
    /// Open timestamp of the latest bar, developing or closed.
    fn latest_bar_ts(&self) -> Option<u64> {
        self.developing
            .map(|c| c.ts_ms)
            .or_else(|| self.last_closed.map(|c| c.ts_ms))
    }

    /// The latest bar, developing or closed.
    fn latest_bar(&self) -> Option<&'a Candle> {
        self.developing.or(self.last_closed)
    }
}

/// Result of one evaluation step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: PlanState,
    pub emit_signal: bool,
}

/// Evaluate one tick. Returns `None` when the state is unchanged.
pub fn evaluate(
    plan: &BreakoutPlan,
    state: &PlanState,
    params: &BreakoutParams,
    min_volume_threshold: f64,
    tick: &TickContext,
) -> Option<Transition> {
    if state.is_terminal() {
        return None;
    }

    // 1) Price-level invalidation conditions and stop loss.
    if let Some(reason) = price_invalidation(plan, tick.last_price) {
        return Some(invalidate(state, reason, tick.now_ms));
    }

    // 2) Time limit.
    if let Some(limit_s) = plan.time_limit_seconds() {
        if tick.now_ms.saturating_sub(plan.created_at_ms) > limit_s * 1_000 {
            let transition = match state {
                // Expiry only exists before confirmation; an armed plan
                // whose clock runs out invalidates.
                PlanState::BreakConfirmed { .. } => {
                    invalidate(state, InvalidReason::TimeLimit, tick.now_ms)
                }
                _ => Transition {
                    next: PlanState::Expired { at: tick.now_ms },
                    emit_signal: true,
                },
            };
            return Some(transition);
        }
    }

    // 3) Fakeout: a bar at or after the break bar closing back on the
    //    pre-break side of the level.
    if params.fakeout_close_invalidate {
        if let (Some(break_bar_ts), Some(bar)) = (state.break_bar_ts(), tick.last_closed) {
            if bar.ts_ms >= break_bar_ts && closed_back_inside(bar, plan.trigger_level, plan.direction)
            {
                return Some(invalidate(state, InvalidReason::FakeoutClose, tick.now_ms));
            }
        }
    }

    // 4) Progression.
    match state {
        PlanState::Pending => eval_pending(plan, params, min_volume_threshold, tick),
        PlanState::BreakSeen {
            break_ts,
            break_bar_ts,
        } => eval_break_seen(plan, params, tick, *break_ts, *break_bar_ts),
        PlanState::BreakConfirmed {
            break_ts,
            break_bar_ts,
            armed_at,
            retest_seen,
            retest_pinbar,
        } => eval_retest(
            plan,
            params,
            tick,
            *break_ts,
            *break_bar_ts,
            *armed_at,
            *retest_seen,
            *retest_pinbar,
        ),
        _ => None,
    }
}

/// Penetration distance required past the level: the percentage branch,
/// stretched by volatility when ATR is known.
pub fn penetration_threshold(level: f64, params: &BreakoutParams, atr: Option<f64>) -> f64 {
    let pct_dist = level * params.penetration_pct / 100.0;
    match atr {
        Some(atr) if params.penetration_natr_mult > 0.0 => {
            pct_dist.max(atr * params.penetration_natr_mult)
        }
        _ => pct_dist,
    }
}

/// Signed distance past the level in the plan's direction.
fn signed_penetration(direction: Direction, level: f64, price: f64) -> f64 {
    match direction {
        Direction::Long => price - level,
        Direction::Short => level - price,
    }
}

/// Most favourable observed price on the breakout side: last price, or
/// the developing bar's extreme when it reaches further.
fn break_price(direction: Direction, tick: &TickContext) -> f64 {
    match (direction, tick.developing) {
        (Direction::Long, Some(bar)) => tick.last_price.max(bar.high),
        (Direction::Short, Some(bar)) => tick.last_price.min(bar.low),
        _ => tick.last_price,
    }
}

fn closed_back_inside(bar: &Candle, level: f64, direction: Direction) -> bool {
    match direction {
        Direction::Long => bar.close < level,
        Direction::Short => bar.close > level,
    }
}

fn price_invalidation(plan: &BreakoutPlan, price: f64) -> Option<InvalidReason> {
    for condition in &plan.invalidation_conditions {
        match condition {
            InvalidationCondition::PriceAbove { level } if price > *level => {
                return Some(InvalidReason::PriceAbove)
            }
            InvalidationCondition::PriceBelow { level } if price < *level => {
                return Some(InvalidReason::PriceBelow)
            }
            _ => {}
        }
    }

    if let Some(stop) = plan.stop_loss {
        let stopped = match plan.direction {
            Direction::Long => price <= stop,
            Direction::Short => price >= stop,
        };
        if stopped {
            return Some(InvalidReason::StopLoss);
        }
    }

    None
}

fn invalidate(state: &PlanState, reason: InvalidReason, now_ms: u64) -> Transition {
    Transition {
        next: PlanState::Invalid {
            reason,
            at: now_ms,
            armed_at: state.armed_at(),
        },
        emit_signal: true,
    }
}

fn eval_pending(
    plan: &BreakoutPlan,
    params: &BreakoutParams,
    min_volume_threshold: f64,
    tick: &TickContext,
) -> Option<Transition> {
    let level = plan.trigger_level;
    let threshold = penetration_threshold(level, params, tick.metrics.atr);
    let penetration = signed_penetration(plan.direction, level, break_price(plan.direction, tick));

    // Strictly beyond the threshold; touching it is not a break.
    if penetration <= threshold {
        return None;
    }

    // A closed break bar must carry real volume.
    if let Some(bar) = tick.latest_bar() {
        if bar.is_closed && min_volume_threshold > 0.0 && bar.volume < min_volume_threshold {
            debug!(
                plan_id = %plan.id,
                volume = bar.volume,
                min_volume_threshold,
                "break ignored: closed break bar below volume floor"
            );
            return None;
        }
    }

    Some(Transition {
        next: PlanState::BreakSeen {
            break_ts: tick.now_ms,
            break_bar_ts: tick.latest_bar_ts().unwrap_or(tick.now_ms),
        },
        emit_signal: false,
    })
}

/// Book side that resists the breakout; a sweep there is absorption in
/// the breakout direction.
pub fn resisting_side(direction: Direction) -> SweepSide {
    match direction {
        Direction::Long => SweepSide::Ask,
        Direction::Short => SweepSide::Bid,
    }
}

/// Volume, range and sweep gates shared by both confirmation modes.
/// Missing metrics fail closed.
fn confirmation_gates(
    params: &BreakoutParams,
    metrics: &MetricsSnapshot,
    direction: Direction,
) -> Result<(), &'static str> {
    if params.min_rvol > 0.0 {
        match metrics.rvol {
            Some(rvol) if rvol >= params.min_rvol => {}
            _ => return Err("rvol"),
        }
    }

    if params.min_break_range_atr > 0.0 {
        match (metrics.atr, metrics.bar_range) {
            (Some(atr), Some(range)) if range >= params.min_break_range_atr * atr => {}
            _ => return Err("range"),
        }
    }

    if params.ob_sweep_check && metrics.sweep != Some(resisting_side(direction)) {
        return Err("sweep");
    }

    Ok(())
}

fn eval_break_seen(
    plan: &BreakoutPlan,
    params: &BreakoutParams,
    tick: &TickContext,
    break_ts: u64,
    break_bar_ts: u64,
) -> Option<Transition> {
    let state = PlanState::BreakSeen {
        break_ts,
        break_bar_ts,
    };
    let level = plan.trigger_level;

    if params.confirm_close {
        // The window closes when a bar at or after the break bar closes.
        let bar = tick.last_closed.filter(|b| b.ts_ms >= break_bar_ts)?;

        let threshold = penetration_threshold(level, params, tick.metrics.atr);
        if signed_penetration(plan.direction, level, bar.close) <= threshold {
            debug!(plan_id = %plan.id, close = bar.close, "close confirmation failed");
            return Some(invalidate(&state, InvalidReason::ConfirmationFailed, tick.now_ms));
        }
    } else {
        // Time confirmation: a single decision once the hold elapses.
        if tick.now_ms.saturating_sub(break_ts) < params.confirm_time_ms {
            return None;
        }

        let held = match plan.direction {
            Direction::Long => tick.last_price >= level,
            Direction::Short => tick.last_price <= level,
        };
        if !held {
            debug!(plan_id = %plan.id, price = tick.last_price, "price fell back during hold");
            return Some(invalidate(&state, InvalidReason::ConfirmationFailed, tick.now_ms));
        }
    }

    if let Err(gate) = confirmation_gates(params, tick.metrics, plan.direction) {
        debug!(plan_id = %plan.id, gate, "confirmation gate failed");
        return Some(invalidate(&state, InvalidReason::ConfirmationFailed, tick.now_ms));
    }

    if params.allow_retest_entry {
        Some(Transition {
            next: PlanState::BreakConfirmed {
                break_ts,
                break_bar_ts,
                armed_at: tick.now_ms,
                retest_seen: false,
                retest_pinbar: false,
            },
            emit_signal: false,
        })
    } else {
        // Momentum entry: confirmation and trigger collapse into one tick.
        Some(Transition {
            next: PlanState::Triggered {
                armed_at: tick.now_ms,
                triggered_at: tick.now_ms,
                retest_pinbar: false,
            },
            emit_signal: true,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn eval_retest(
    plan: &BreakoutPlan,
    params: &BreakoutParams,
    tick: &TickContext,
    break_ts: u64,
    break_bar_ts: u64,
    armed_at: u64,
    retest_seen: bool,
    retest_pinbar: bool,
) -> Option<Transition> {
    let level = plan.trigger_level;
    let band = level * params.retest_band_pct / 100.0;
    let price = tick.last_price;

    if (price - level).abs() <= band {
        let pinbar = retest_pinbar || tick.metrics.pinbar.is_some();
        if !retest_seen || pinbar != retest_pinbar {
            return Some(Transition {
                next: PlanState::BreakConfirmed {
                    break_ts,
                    break_bar_ts,
                    armed_at,
                    retest_seen: true,
                    retest_pinbar: pinbar,
                },
                emit_signal: false,
            });
        }
        return None;
    }

    if retest_seen {
        let resumed = match plan.direction {
            Direction::Long => price > level + band,
            Direction::Short => price < level - band,
        };
        if resumed {
            return Some(Transition {
                next: PlanState::Triggered {
                    armed_at,
                    triggered_at: tick.now_ms,
                    retest_pinbar,
                },
                emit_signal: true,
            });
        }
    }

    None
}
