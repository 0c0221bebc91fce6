//! Claim handling over the period store.
//!
//! Composes the pure transition rules with the SQLite store: read the
//! latest period, decide, apply the single mutating statement, then record
//! the claim in the last-update marker. The HTTP layer serializes claims
//! through one writer lock, so the read-decide-write sequence here never
//! interleaves with another claim.

use tracing::debug;

use doorstate_core::{
    apply_claim, status_for, ClaimOutcome, DoorState, DoorStatus, DoorstateError, OpeningPeriod,
    PeriodUpdate,
};
use doorstate_protocol::HISTORY_ROW_LIMIT;

use crate::db::Db;

/// Applies an authenticated claim to the store.
///
/// Rejected claims leave the store untouched, marker included. Accepted
/// no-ops touch only the marker.
pub fn handle_claim(db: &Db, time: i64, state: DoorState) -> Result<ClaimOutcome, DoorstateError> {
    let latest = db.latest_period().map_err(DoorstateError::storage)?;
    let outcome = apply_claim(latest.as_ref(), time, state)?;

    match outcome.update {
        PeriodUpdate::Append { opened } => {
            db.append_period(opened).map_err(DoorstateError::storage)?;
            debug!(opened, "Started new opening period");
        }
        PeriodUpdate::Close { closed } => {
            db.close_latest(closed).map_err(DoorstateError::storage)?;
            debug!(closed, "Closed latest opening period");
        }
        PeriodUpdate::Skip => {
            debug!(time, state = state.as_str(), "Claim repeated current state");
        }
    }

    // No-ops count as accepted claims: the marker keeps readers from
    // degrading to unknown while the sensor reports an unchanged state.
    db.touch_last_update(time).map_err(DoorstateError::storage)?;

    Ok(outcome)
}

/// Current reader-facing status.
pub fn current_status(db: &Db, now: i64) -> Result<DoorStatus, String> {
    let latest = db.latest_period()?;
    let last_update = db.last_update()?;
    Ok(status_for(latest.as_ref(), last_update, now))
}

/// History rows overlapping `[from, to]`, capped at the protocol row
/// limit.
pub fn history(db: &Db, from: i64, to: i64) -> Result<Vec<OpeningPeriod>, String> {
    db.query_periods(from, to, HISTORY_ROW_LIMIT)
}
