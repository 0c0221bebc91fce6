//! Read-side state derivation and staleness.
//!
//! The daemon keeps a single last-update marker holding the timestamp of
//! the most recently accepted claim, no-ops included. Readers trust the
//! recorded door state only while that marker is fresh; a silent sensor
//! degrades the answer to `Unknown` instead of a confident stale one.

use crate::door::{DerivedState, OpeningPeriod};

/// Seconds after the last accepted claim before readers stop trusting the
/// recorded state.
pub const STALE_AFTER_SECS: i64 = 600; // 10 minutes

/// Whether the last-update marker is too old to trust.
pub fn is_stale(last_update: i64, now: i64) -> bool {
    now - last_update > STALE_AFTER_SECS
}

/// Current door state as a reader should see it.
pub fn derive_state(latest: Option<&OpeningPeriod>, last_update: i64, now: i64) -> DerivedState {
    match latest {
        None => DerivedState::Unknown,
        Some(_) if is_stale(last_update, now) => DerivedState::Unknown,
        Some(period) if period.is_open() => DerivedState::Open,
        Some(_) => DerivedState::Closed,
    }
}

/// Reader-facing door status summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorStatus {
    pub state: DerivedState,
    /// Timestamp of the last recorded change, 0 before the first period.
    pub time: i64,
    pub text: String,
}

/// Builds the status summary served to readers.
pub fn status_for(latest: Option<&OpeningPeriod>, last_update: i64, now: i64) -> DoorStatus {
    let state = derive_state(latest, last_update, now);
    let time = latest.map(|period| period.last_change()).unwrap_or(0);
    let text = match state {
        DerivedState::Unknown => {
            "No current information about the door state is available.".to_string()
        }
        DerivedState::Open => format!(
            "The door has been open for {}.",
            human_duration(now - time)
        ),
        DerivedState::Closed => {
            format!("The door was last open {} ago.", human_duration(now - time))
        }
    };
    DoorStatus { state, time, text }
}

/// Coarse single-unit duration rendering ("45 seconds", "5 minutes",
/// "3 hours", "2 days").
pub fn human_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let (count, unit) = if secs < 60 {
        (secs, "second")
    } else if secs < 3600 {
        (secs / 60, "minute")
    } else if secs < 86_400 {
        (secs / 3600, "hour")
    } else {
        (secs / 86_400, "day")
    };
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
