//! # doorstate-core
//!
//! Domain logic for the door state service: claim authentication, the
//! transition rules that maintain opening periods, read-side staleness,
//! and open-time aggregation.
//!
//! ## Design Principles
//!
//! - **Pure over stateful**: nothing here reads the clock or touches the
//!   period store. Callers pass `now` and the latest period in, which
//!   keeps every rule testable with plain values.
//! - **UTC at rest**: timestamps are UTC epoch seconds everywhere; local
//!   wall-clock time exists only inside [`aggregate`].
//! - **Explicit dependencies**: keys and timezones arrive as values at
//!   construction, never from globals.

pub mod aggregate;
pub mod auth;
pub mod door;
pub mod error;
pub mod staleness;
pub mod transition;

pub use aggregate::{open_hours_by_week, open_segments_by_day, DaySegment};
pub use auth::{ClaimValidator, MAX_CLOCK_SKEW_SECS};
pub use door::{DerivedState, DoorState, OpeningPeriod};
pub use error::{DoorstateError, Result};
pub use staleness::{
    derive_state, human_duration, is_stale, status_for, DoorStatus, STALE_AFTER_SECS,
};
pub use transition::{apply_claim, ClaimOutcome, PeriodUpdate};
