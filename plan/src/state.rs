//! Plan lifecycle states.
//!
//! The lifecycle is a DAG:
//! `Pending → BreakSeen → BreakConfirmed → Triggered`, with `Invalid`
//! reachable from any non-terminal state and `Expired` from the
//! pre-confirmation states. Terminal states are absorbing.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    PriceAbove,
    PriceBelow,
    StopLoss,
    FakeoutClose,
    ConfirmationFailed,
    TimeLimit,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvalidReason::PriceAbove => "price_above",
            InvalidReason::PriceBelow => "price_below",
            InvalidReason::StopLoss => "stop_loss",
            InvalidReason::FakeoutClose => "fakeout_close",
            InvalidReason::ConfirmationFailed => "confirmation_failed",
            InvalidReason::TimeLimit => "time_limit",
        };
        f.write_str(s)
    }
}

impl FromStr for InvalidReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_above" => Ok(InvalidReason::PriceAbove),
            "price_below" => Ok(InvalidReason::PriceBelow),
            "stop_loss" => Ok(InvalidReason::StopLoss),
            "fakeout_close" => Ok(InvalidReason::FakeoutClose),
            "confirmation_failed" => Ok(InvalidReason::ConfirmationFailed),
            "time_limit" => Ok(InvalidReason::TimeLimit),
            other => Err(format!("unknown invalid reason '{other}'")),
        }
    }
}

/// Runtime state of one plan. All timestamps are market milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanState {
    Pending,
    BreakSeen {
        /// Tick timestamp at which raw penetration was first observed.
        break_ts: u64,
        /// Open timestamp of the bar that carried the break; closed bars
        /// at or after this one participate in confirmation and fakeout
        /// checks.
        break_bar_ts: u64,
    },
    BreakConfirmed {
        break_ts: u64,
        break_bar_ts: u64,
        armed_at: u64,
        /// Price has already pulled back into the retest band.
        retest_seen: bool,
        /// A pinbar printed while price sat in the retest band.
        retest_pinbar: bool,
    },
    Triggered {
        armed_at: u64,
        triggered_at: u64,
        retest_pinbar: bool,
    },
    Invalid {
        reason: InvalidReason,
        at: u64,
        armed_at: Option<u64>,
    },
    Expired {
        at: u64,
    },
}

impl PlanState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanState::Triggered { .. } | PlanState::Invalid { .. } | PlanState::Expired { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlanState::Pending => "pending",
            PlanState::BreakSeen { .. } => "break_seen",
            PlanState::BreakConfirmed { .. } => "break_confirmed",
            PlanState::Triggered { .. } => "triggered",
            PlanState::Invalid { .. } => "invalid",
            PlanState::Expired { .. } => "expired",
        }
    }

    /// Position along the lifecycle DAG; transitions may only keep or
    /// increase the rank.
    pub fn rank(&self) -> u8 {
        match self {
            PlanState::Pending => 0,
            PlanState::BreakSeen { .. } => 1,
            PlanState::BreakConfirmed { .. } => 2,
            PlanState::Triggered { .. } | PlanState::Invalid { .. } | PlanState::Expired { .. } => 3,
        }
    }

    /// Timestamp of the break, while one is being tracked.
    pub fn break_ts(&self) -> Option<u64> {
        match self {
            PlanState::BreakSeen { break_ts, .. } | PlanState::BreakConfirmed { break_ts, .. } => {
                Some(*break_ts)
            }
            _ => None,
        }
    }

    /// Open timestamp of the break bar, while one is being tracked.
    pub fn break_bar_ts(&self) -> Option<u64> {
        match self {
            PlanState::BreakSeen { break_bar_ts, .. }
            | PlanState::BreakConfirmed { break_bar_ts, .. } => Some(*break_bar_ts),
            _ => None,
        }
    }

    /// When the plan was armed, if it got that far.
    pub fn armed_at(&self) -> Option<u64> {
        match self {
            PlanState::BreakConfirmed { armed_at, .. } | PlanState::Triggered { armed_at, .. } => {
                Some(*armed_at)
            }
            PlanState::Invalid { armed_at, .. } => *armed_at,
            _ => None,
        }
    }

    pub fn triggered_at(&self) -> Option<u64> {
        match self {
            PlanState::Triggered { triggered_at, .. } => Some(*triggered_at),
            _ => None,
        }
    }

    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        match self {
            PlanState::Invalid { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_absorbing_rank() {
        assert!(!PlanState::Pending.is_terminal());
        assert!(PlanState::Expired { at: 1 }.is_terminal());
        assert!(PlanState::Triggered {
            armed_at: 1,
            triggered_at: 1,
            retest_pinbar: false
        }
        .is_terminal());

        assert!(PlanState::Pending.rank() < PlanState::Expired { at: 1 }.rank());
    }

    #[test]
    fn invalid_reason_round_trips_as_text() {
        for reason in [
            InvalidReason::PriceAbove,
            InvalidReason::PriceBelow,
            InvalidReason::StopLoss,
            InvalidReason::FakeoutClose,
            InvalidReason::ConfirmationFailed,
            InvalidReason::TimeLimit,
        ] {
            let text = reason.to_string();
            assert_eq!(text.parse::<InvalidReason>().unwrap(), reason);
        }
    }
}
