//! Wire types shared between the doorstate daemon and its clients.
//!
//! The HTTP API is deliberately small: a claim submission, a status
//! summary, and a history listing. Claim fields travel as raw strings so
//! the daemon can authenticate the exact bytes the sensor signed before
//! interpreting them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 8888;

/// Maximum number of periods a history response may carry.
pub const HISTORY_ROW_LIMIT: usize = 2000;

/// Default history window when the caller gives no `from` bound, in days
/// before now.
pub const HISTORY_DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// A door state claim as submitted by the sensor.
///
/// All fields are optional at the wire level; presence is validated
/// server-side so a missing field can be reported against its name.
/// Decodes from a JSON body or a form-encoded one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoorClaim {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub hmac: Option<String>,
}

/// Door status summary.
///
/// Served on reads and echoed after accepted claims: `time` is the last
/// recorded change (which a no-op claim does not move), `state` uses the
/// claim vocabulary plus `"unknown"`, and `text` is a human-readable
/// summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReply {
    pub time: i64,
    pub state: String,
    pub text: String,
}

/// Query bounds for the history listing, kept as raw strings so malformed
/// values can be rejected field-by-field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Validation failure body: one offending field mapped to one message,
/// e.g. `{"hmac": "HMAC digest is wrong. Do you have the right key?"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<String, String>);

impl FieldErrors {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), message.into());
        FieldErrors(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_tolerates_missing_fields() {
        let claim: DoorClaim = serde_json::from_str(r#"{"time": "123"}"#).unwrap();
        assert_eq!(claim.time.as_deref(), Some("123"));
        assert_eq!(claim.state, None);
        assert_eq!(claim.hmac, None);
    }

    #[test]
    fn claim_ignores_unknown_fields() {
        let claim: DoorClaim =
            serde_json::from_str(r#"{"time": "1", "state": "opened", "extra": true}"#).unwrap();
        assert_eq!(claim.state.as_deref(), Some("opened"));
    }

    #[test]
    fn field_errors_serialize_as_a_flat_map() {
        let errors = FieldErrors::new("time", "Time has to be an integer timestamp.");
        let json = serde_json::to_string(&errors).unwrap();
        assert_eq!(json, r#"{"time":"Time has to be an integer timestamp."}"#);
    }

    #[test]
    fn status_reply_round_trips() {
        let reply = StatusReply {
            time: 1700000000,
            state: "opened".to_string(),
            text: "The door is now open.".to_string(),
        };
        let json = serde_json::to_string(&reply).unwrap();
        let parsed: StatusReply = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reply);
    }
}
