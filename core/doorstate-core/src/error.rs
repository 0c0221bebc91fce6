//! Error types for door state operations.
//! Claim validation errors map onto single-field HTTP error bodies.

/// All errors that can occur while validating and applying door claims.
///
/// Display strings double as the client-facing messages, so they stay
/// stable; the offending field name is carried separately via [`field`].
///
/// [`field`]: DoorstateError::field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DoorstateError {
    // ─────────────────────────────────────────────────────────────────────
    // Claim Validation Errors
    // ─────────────────────────────────────────────────────────────────────
    /// A required claim parameter was absent or empty.
    #[error("Parameter is missing")]
    MissingField { field: &'static str },

    /// The supplied digest does not authenticate the claim.
    #[error("HMAC digest is wrong. Do you have the right key?")]
    Authentication,

    /// The time parameter is not a non-negative integer literal.
    #[error("Time has to be an integer timestamp.")]
    MalformedTime,

    /// The claimed time is more than the tolerated skew away from the
    /// server clock.
    #[error("Time is too far in the future or past. Use NTP and UTC!")]
    ClockSkew,

    /// The claimed time does not advance past the latest recorded change.
    #[error("New entry must be newer than the latest entry.")]
    NonMonotonicTime,

    /// The state parameter is not one of the known door states.
    #[error("State has to be one of opened, closed.")]
    InvalidStateValue { value: String },

    // ─────────────────────────────────────────────────────────────────────
    // Infrastructure Errors
    // ─────────────────────────────────────────────────────────────────────
    /// The period store (or another internal facility) failed.
    #[error("{0}")]
    Storage(String),
}

impl DoorstateError {
    pub fn storage(message: impl Into<String>) -> Self {
        DoorstateError::Storage(message.into())
    }

    /// The claim field this error should be reported against, or `None`
    /// for internal failures that are not the client's fault.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DoorstateError::MissingField { field } => Some(field),
            DoorstateError::Authentication => Some("hmac"),
            DoorstateError::MalformedTime
            | DoorstateError::ClockSkew
            | DoorstateError::NonMonotonicTime => Some("time"),
            DoorstateError::InvalidStateValue { .. } => Some("state"),
            DoorstateError::Storage(_) => None,
        }
    }
}

/// Convenience alias for operations that can fail with [`DoorstateError`].
pub type Result<T> = std::result::Result<T, DoorstateError>;

impl From<DoorstateError> for String {
    fn from(err: DoorstateError) -> Self {
        err.to_string()
    }
}
