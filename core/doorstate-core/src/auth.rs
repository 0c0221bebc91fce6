//! Claim authentication.
//!
//! Claims are authenticated with HMAC-SHA256 over the exact string
//! `"<time>:<state>"`, using the raw field values as supplied on the wire.
//! The digest is verified before any semantic validation of the fields it
//! covers, so a caller without the key learns nothing about how times are
//! interpreted.

use std::path::Path;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::door::DoorState;
use crate::error::{DoorstateError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum tolerated difference between a claimed time and the server
/// clock, in seconds.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Validates claim payloads against a shared secret key.
///
/// The same key signs outgoing claims on the sensor side and verifies
/// incoming ones on the daemon side.
#[derive(Clone, Debug)]
pub struct ClaimValidator {
    key: Vec<u8>,
}

impl ClaimValidator {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Loads the shared key from a file, stripping the surrounding
    /// whitespace editors tend to add. An empty key file is a
    /// configuration error.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let raw = fs_err::read(path)
            .map_err(|err| DoorstateError::storage(format!("Failed to read key file: {}", err)))?;
        let key = trim_ascii_whitespace(&raw);
        if key.is_empty() {
            return Err(DoorstateError::storage(format!(
                "Key file {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(key.to_vec()))
    }

    /// Lowercase hex digest authenticating `time` and `state`.
    pub fn sign(&self, time: &str, state: &str) -> Result<String> {
        Ok(hex::encode(self.digest(time, state)?))
    }

    /// Validates a raw claim against the key and the server clock and
    /// returns the parsed timestamp and door state.
    ///
    /// Checks run in a fixed order: field presence, digest, time syntax,
    /// clock skew, state value. Monotonicity against the stored history is
    /// not checked here; that belongs to the transition rules.
    pub fn validate(
        &self,
        time: Option<&str>,
        state: Option<&str>,
        digest: Option<&str>,
        server_now: i64,
    ) -> Result<(i64, DoorState)> {
        let time = require_field("time", time)?;
        let state = require_field("state", state)?;
        let digest = require_field("hmac", digest)?;

        if !self.verify(time, state, digest)? {
            return Err(DoorstateError::Authentication);
        }

        if !time.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DoorstateError::MalformedTime);
        }
        let timestamp: i64 = time.parse().map_err(|_| DoorstateError::MalformedTime)?;

        if (timestamp - server_now).abs() > MAX_CLOCK_SKEW_SECS {
            return Err(DoorstateError::ClockSkew);
        }

        let state = DoorState::from_str(state).ok_or_else(|| DoorstateError::InvalidStateValue {
            value: state.to_string(),
        })?;

        Ok((timestamp, state))
    }

    fn digest(&self, time: &str, state: &str) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|err| DoorstateError::storage(format!("Failed to key HMAC: {}", err)))?;
        mac.update(time.as_bytes());
        mac.update(b":");
        mac.update(state.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Constant-time digest comparison. A digest that is not valid hex or
    /// has the wrong length is simply wrong.
    fn verify(&self, time: &str, state: &str, supplied_hex: &str) -> Result<bool> {
        let expected = self.digest(time, state)?;
        let supplied = match hex::decode(supplied_hex) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };
        if supplied.len() != expected.len() {
            return Ok(false);
        }
        Ok(expected.ct_eq(supplied.as_slice()).into())
    }
}

fn require_field<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DoorstateError::MissingField { field }),
    }
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ClaimValidator {
        ClaimValidator::new(b"test-key".to_vec())
    }

    fn signed(time: &str, state: &str) -> String {
        validator().sign(time, state).expect("sign claim")
    }

    #[test]
    fn valid_claim_parses() {
        let digest = signed("1000", "opened");
        let result = validator().validate(Some("1000"), Some("opened"), Some(&digest), 1000);
        assert_eq!(result, Ok((1000, DoorState::Opened)));
    }

    #[test]
    fn absent_or_empty_fields_are_missing() {
        let validator = validator();
        assert_eq!(
            validator.validate(None, Some("opened"), Some("ab"), 0),
            Err(DoorstateError::MissingField { field: "time" })
        );
        assert_eq!(
            validator.validate(Some("1"), None, Some("ab"), 0),
            Err(DoorstateError::MissingField { field: "state" })
        );
        assert_eq!(
            validator.validate(Some("1"), Some("opened"), Some(""), 0),
            Err(DoorstateError::MissingField { field: "hmac" })
        );
    }

    #[test]
    fn wrong_digest_is_rejected() {
        let digest = signed("1000", "closed");
        let result = validator().validate(Some("1000"), Some("opened"), Some(&digest), 1000);
        assert_eq!(result, Err(DoorstateError::Authentication));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let digest = ClaimValidator::new(b"other-key".to_vec())
            .sign("1000", "opened")
            .expect("sign claim");
        let result = validator().validate(Some("1000"), Some("opened"), Some(&digest), 1000);
        assert_eq!(result, Err(DoorstateError::Authentication));
    }

    #[test]
    fn non_hex_digest_is_rejected() {
        let result = validator().validate(Some("1000"), Some("opened"), Some("zz!"), 1000);
        assert_eq!(result, Err(DoorstateError::Authentication));
    }

    #[test]
    fn digest_is_checked_before_time_syntax() {
        // An unauthenticated caller must not be able to distinguish a
        // malformed time from a well-formed one.
        let result = validator().validate(Some("garbage"), Some("opened"), Some("00ff"), 1000);
        assert_eq!(result, Err(DoorstateError::Authentication));

        // With a valid digest the syntax error surfaces.
        let digest = signed("garbage", "opened");
        let result = validator().validate(Some("garbage"), Some("opened"), Some(&digest), 1000);
        assert_eq!(result, Err(DoorstateError::MalformedTime));
    }

    #[test]
    fn negative_time_is_malformed() {
        let digest = signed("-5", "opened");
        let result = validator().validate(Some("-5"), Some("opened"), Some(&digest), 0);
        assert_eq!(result, Err(DoorstateError::MalformedTime));
    }

    #[test]
    fn skew_boundary_is_inclusive() {
        let digest = signed("1060", "opened");
        // Exactly 60 seconds ahead is still accepted.
        let result = validator().validate(Some("1060"), Some("opened"), Some(&digest), 1000);
        assert_eq!(result, Ok((1060, DoorState::Opened)));

        let digest = signed("1061", "opened");
        let result = validator().validate(Some("1061"), Some("opened"), Some(&digest), 1000);
        assert_eq!(result, Err(DoorstateError::ClockSkew));

        let digest = signed("939", "opened");
        let result = validator().validate(Some("939"), Some("opened"), Some(&digest), 1000);
        assert_eq!(result, Err(DoorstateError::ClockSkew));
    }

    #[test]
    fn unknown_state_is_rejected_after_skew() {
        let digest = signed("1000", "ajar");
        let result = validator().validate(Some("1000"), Some("ajar"), Some(&digest), 1000);
        assert_eq!(
            result,
            Err(DoorstateError::InvalidStateValue {
                value: "ajar".to_string()
            })
        );

        // A skewed time wins over the bad state value.
        let digest = signed("99", "ajar");
        let result = validator().validate(Some("99"), Some("ajar"), Some(&digest), 1000);
        assert_eq!(result, Err(DoorstateError::ClockSkew));
    }

    #[test]
    fn key_files_are_trimmed_on_load() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("door.key");
        fs_err::write(&path, b"  shared secret\n").expect("write key");

        let loaded = ClaimValidator::from_key_file(&path).expect("load key");
        assert_eq!(loaded.key, b"shared secret".to_vec());
    }

    #[test]
    fn empty_key_file_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("door.key");
        fs_err::write(&path, b" \n\t ").expect("write key");

        let err = ClaimValidator::from_key_file(&path).unwrap_err();
        assert!(err.to_string().contains("empty"), "unexpected error: {}", err);
    }

    #[test]
    fn missing_key_file_is_an_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        assert!(ClaimValidator::from_key_file(&temp.path().join("nope.key")).is_err());
    }

    #[test]
    fn whitespace_trimming_handles_edge_cases() {
        assert_eq!(trim_ascii_whitespace(b"abc"), b"abc");
        assert_eq!(trim_ascii_whitespace(b"\n abc \t"), b"abc");
        assert_eq!(trim_ascii_whitespace(b"   "), b"");
        assert_eq!(trim_ascii_whitespace(b""), b"");
    }
}
