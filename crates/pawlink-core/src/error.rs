//! Chat error taxonomy.
//!
//! One enum covers the four failure classes the engine surfaces:
//! connection establishment, authentication, transient fetch/write
//! failures, and local validation. Callers use [`ChatError::is_transient`]
//! to decide whether a retry makes sense; auth and validation failures
//! never do.

use thiserror::Error;

/// Errors surfaced by the chat engine and its I/O layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The live transport could not be established.
    ///
    /// Recoverable by retry; surfaced as a non-blocking condition, never
    /// a crash of the room view.
    #[error("connection failed: {reason}")]
    Connection {
        /// Underlying transport failure.
        reason: String,
    },

    /// A REST call lacked a credential or the credential was rejected.
    ///
    /// Not retried automatically; the caller should route to
    /// re-authentication.
    #[error("authentication failed: {reason}")]
    Auth {
        /// What was missing or rejected.
        reason: String,
    },

    /// A history load or durable write failed transiently.
    ///
    /// Recoverable by user-initiated retry.
    #[error("fetch failed: {reason}")]
    Fetch {
        /// Network or server failure detail.
        reason: String,
    },

    /// Input was rejected locally before any network call.
    #[error("validation failed: {reason}")]
    Validation {
        /// Why the input was rejected.
        reason: String,
    },
}

impl ChatError {
    /// Returns true if this error may succeed on retry.
    ///
    /// Connection and fetch failures are transient. Auth failures need a
    /// new credential and validation failures need different input, so
    /// retrying either verbatim is pointless.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Fetch { .. })
    }

    /// Shorthand for a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_are_transient() {
        assert!(ChatError::Connection { reason: "refused".to_string() }.is_transient());
        assert!(ChatError::Fetch { reason: "503".to_string() }.is_transient());
    }

    #[test]
    fn auth_and_validation_are_terminal() {
        assert!(!ChatError::Auth { reason: "missing token".to_string() }.is_transient());
        assert!(!ChatError::validation("empty message").is_transient());
    }
}
