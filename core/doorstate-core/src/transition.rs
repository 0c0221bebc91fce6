//! Pure transition rules for door claims.
//!
//! `apply_claim` looks only at the latest opening period and decides how
//! the store should change. It never touches storage; the daemon applies
//! the returned update and then records the claim in the last-update
//! marker, no-ops included.

use crate::door::{DoorState, OpeningPeriod};
use crate::error::{DoorstateError, Result};

/// Store mutation decided for an accepted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUpdate {
    /// Start a new opening period.
    Append { opened: i64 },
    /// Close the latest (open) period.
    Close { closed: i64 },
    /// Accept the claim without touching the period store.
    Skip,
}

/// Result of an accepted claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub update: PeriodUpdate,
    /// Door state after the claim.
    pub state: DoorState,
    /// Timestamp of the last actual change: the claim time for mutations,
    /// the already-recorded change for duplicates, 0 before any history.
    pub time: i64,
    /// Human-readable summary for the reply body.
    pub text: String,
}

/// Decides what an authenticated claim does to the period store.
///
/// Claims that repeat the current state are accepted as no-ops. Claims
/// that would change state must advance strictly past the latest recorded
/// change; equal timestamps are rejected. With no history at all, a
/// `closed` claim is a no-op (the door starts closed) and the first real
/// period begins with an `opened` claim.
pub fn apply_claim(
    latest: Option<&OpeningPeriod>,
    time: i64,
    state: DoorState,
) -> Result<ClaimOutcome> {
    match (latest, state) {
        (None, DoorState::Closed) => Ok(already_closed(0)),
        (None, DoorState::Opened) => Ok(now_open(time)),
        (Some(period), DoorState::Opened) if period.is_open() => Ok(ClaimOutcome {
            update: PeriodUpdate::Skip,
            state: DoorState::Opened,
            time: period.opened,
            text: "The door is already open.".to_string(),
        }),
        (Some(period), DoorState::Closed) if !period.is_open() => {
            Ok(already_closed(period.last_change()))
        }
        (Some(period), DoorState::Closed) => {
            if time <= period.last_change() {
                return Err(DoorstateError::NonMonotonicTime);
            }
            Ok(ClaimOutcome {
                update: PeriodUpdate::Close { closed: time },
                state: DoorState::Closed,
                time,
                text: "The door is now closed.".to_string(),
            })
        }
        (Some(period), DoorState::Opened) => {
            if time <= period.last_change() {
                return Err(DoorstateError::NonMonotonicTime);
            }
            Ok(now_open(time))
        }
    }
}

fn now_open(time: i64) -> ClaimOutcome {
    ClaimOutcome {
        update: PeriodUpdate::Append { opened: time },
        state: DoorState::Opened,
        time,
        text: "The door is now open.".to_string(),
    }
}

fn already_closed(time: i64) -> ClaimOutcome {
    ClaimOutcome {
        update: PeriodUpdate::Skip,
        state: DoorState::Closed,
        time,
        text: "The door is already closed.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_period(opened: i64) -> OpeningPeriod {
        OpeningPeriod {
            opened,
            closed: None,
        }
    }

    fn closed_period(opened: i64, closed: i64) -> OpeningPeriod {
        OpeningPeriod {
            opened,
            closed: Some(closed),
        }
    }

    #[test]
    fn closed_claim_without_history_is_a_noop() {
        let outcome = apply_claim(None, 500, DoorState::Closed).expect("outcome");
        assert_eq!(outcome.update, PeriodUpdate::Skip);
        assert_eq!(outcome.state, DoorState::Closed);
        assert_eq!(outcome.time, 0);
    }

    #[test]
    fn opened_claim_without_history_starts_a_period() {
        let outcome = apply_claim(None, 500, DoorState::Opened).expect("outcome");
        assert_eq!(outcome.update, PeriodUpdate::Append { opened: 500 });
        assert_eq!(outcome.state, DoorState::Opened);
        assert_eq!(outcome.time, 500);
    }

    #[test]
    fn repeated_opened_claim_is_a_noop() {
        let period = open_period(100);
        let outcome = apply_claim(Some(&period), 500, DoorState::Opened).expect("outcome");
        assert_eq!(outcome.update, PeriodUpdate::Skip);
        assert_eq!(outcome.state, DoorState::Opened);
        // The reply carries the original opening, not the claim time.
        assert_eq!(outcome.time, 100);
    }

    #[test]
    fn repeated_closed_claim_is_a_noop() {
        let period = closed_period(100, 200);
        let outcome = apply_claim(Some(&period), 500, DoorState::Closed).expect("outcome");
        assert_eq!(outcome.update, PeriodUpdate::Skip);
        assert_eq!(outcome.state, DoorState::Closed);
        assert_eq!(outcome.time, 200);
    }

    #[test]
    fn closing_an_open_period_sets_closed() {
        let period = open_period(100);
        let outcome = apply_claim(Some(&period), 180, DoorState::Closed).expect("outcome");
        assert_eq!(outcome.update, PeriodUpdate::Close { closed: 180 });
        assert_eq!(outcome.state, DoorState::Closed);
        assert_eq!(outcome.time, 180);
    }

    #[test]
    fn reopening_after_a_closed_period_appends() {
        let period = closed_period(100, 200);
        let outcome = apply_claim(Some(&period), 300, DoorState::Opened).expect("outcome");
        assert_eq!(outcome.update, PeriodUpdate::Append { opened: 300 });
        assert_eq!(outcome.state, DoorState::Opened);
        assert_eq!(outcome.time, 300);
    }

    #[test]
    fn closing_requires_strictly_newer_time() {
        let period = open_period(100);
        assert_eq!(
            apply_claim(Some(&period), 100, DoorState::Closed),
            Err(DoorstateError::NonMonotonicTime)
        );
        assert_eq!(
            apply_claim(Some(&period), 99, DoorState::Closed),
            Err(DoorstateError::NonMonotonicTime)
        );
        assert!(apply_claim(Some(&period), 101, DoorState::Closed).is_ok());
    }

    #[test]
    fn reopening_requires_strictly_newer_time() {
        let period = closed_period(100, 200);
        assert_eq!(
            apply_claim(Some(&period), 200, DoorState::Opened),
            Err(DoorstateError::NonMonotonicTime)
        );
        assert_eq!(
            apply_claim(Some(&period), 150, DoorState::Opened),
            Err(DoorstateError::NonMonotonicTime)
        );
        assert!(apply_claim(Some(&period), 201, DoorState::Opened).is_ok());
    }

    #[test]
    fn noop_claims_never_check_monotonicity() {
        // A duplicate with an older timestamp is still accepted as a no-op.
        let period = closed_period(100, 200);
        let outcome = apply_claim(Some(&period), 150, DoorState::Closed).expect("outcome");
        assert_eq!(outcome.update, PeriodUpdate::Skip);

        let period = open_period(100);
        let outcome = apply_claim(Some(&period), 50, DoorState::Opened).expect("outcome");
        assert_eq!(outcome.update, PeriodUpdate::Skip);
    }

    #[test]
    fn replies_describe_the_resulting_state() {
        let outcome = apply_claim(None, 500, DoorState::Opened).expect("outcome");
        assert_eq!(outcome.text, "The door is now open.");

        let period = open_period(500);
        let outcome = apply_claim(Some(&period), 600, DoorState::Closed).expect("outcome");
        assert_eq!(outcome.text, "The door is now closed.");

        let outcome = apply_claim(None, 500, DoorState::Closed).expect("outcome");
        assert_eq!(outcome.text, "The door is already closed.");
    }
}
