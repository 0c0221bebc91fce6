//! Door state data model.
//!
//! All timestamps are UTC epoch seconds. Conversion to wall-clock time is
//! confined to the aggregation module.

use serde::{Deserialize, Serialize};

/// A door state as claimed by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Opened,
    Closed,
}

impl DoorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorState::Opened => "opened",
            DoorState::Closed => "closed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "opened" => Some(DoorState::Opened),
            "closed" => Some(DoorState::Closed),
            _ => None,
        }
    }
}

/// One contiguous interval during which the door was open.
///
/// `closed` is `None` while the door is still open. Stored periods satisfy
/// `closed > opened`, are ordered by `opened`, never overlap, and are never
/// deleted; at most one period is open and it is always the latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningPeriod {
    pub opened: i64,
    pub closed: Option<i64>,
}

impl OpeningPeriod {
    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }

    /// Timestamp of the most recent state change this period records:
    /// `opened` while open, `closed` once closed.
    pub fn last_change(&self) -> i64 {
        self.closed.unwrap_or(self.opened)
    }

    /// End of the period, substituting `now` while the door is still open.
    pub fn end_or(&self, now: i64) -> i64 {
        self.closed.unwrap_or(now)
    }
}

/// Door state as presented to readers, after staleness is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedState {
    Unknown,
    Open,
    Closed,
}

impl DerivedState {
    /// Wire spelling; uses the same vocabulary as claims.
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedState::Unknown => "unknown",
            DerivedState::Open => "opened",
            DerivedState::Closed => "closed",
        }
    }
}
