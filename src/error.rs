//! Error taxonomy for the control surface
//!
//! Remote failures have exactly one shape ([`DispatchError`]) whether the
//! switcher answered with an error or did not answer in time, so callers
//! handle both on the same path.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure to establish the control channel.
///
/// The message is the underlying failure text, kept verbatim for display.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ConnectionError {
    pub message: String,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why a dispatched request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchFailure {
    /// The switcher rejected the request or answered with something unexpected
    Protocol,
    /// No answer within the request timeout
    Timeout,
}

/// A remote request that did not succeed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{verb} failed: {message}")]
pub struct DispatchError {
    pub verb: &'static str,
    pub kind: DispatchFailure,
    pub message: String,
}

impl DispatchError {
    pub fn protocol(verb: &'static str, message: impl Into<String>) -> Self {
        Self {
            verb,
            kind: DispatchFailure::Protocol,
            message: message.into(),
        }
    }

    pub fn timeout(verb: &'static str, after: Duration) -> Self {
        Self {
            verb,
            kind: DispatchFailure::Timeout,
            message: format!("no response within {} ms", after.as_millis()),
        }
    }

    /// The reply arrived but did not have the shape the request implies
    pub fn unexpected_reply(verb: &'static str) -> Self {
        Self::protocol(verb, "unexpected reply shape")
    }
}

/// A request rejected locally, before anything was sent
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("scene '{0}' is not in the scene list")]
    UnknownScene(String),

    #[error("no preview scene selected")]
    NoPreviewScene,

    #[error("preview scene '{0}' is already on program")]
    PreviewIsProgram(String),

    #[error("transition '{0}' is not available")]
    UnknownTransition(String),

    #[error("a transition is already in progress")]
    TransitionPending,
}

/// Error returned by every operation that may reach the switcher
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Short-circuited locally, nothing was sent
    #[error("not connected to OBS")]
    NotConnected,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchFailure::Protocol => write!(f, "protocol"),
            DispatchFailure::Timeout => write!(f, "timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_and_protocol_share_shape() {
        let timeout = DispatchError::timeout("GetSceneList", Duration::from_millis(250));
        let protocol = DispatchError::protocol("GetSceneList", "boom");
        assert_eq!(timeout.kind, DispatchFailure::Timeout);
        assert_eq!(protocol.kind, DispatchFailure::Protocol);
        assert_eq!(timeout.to_string(), "GetSceneList failed: no response within 250 ms");
        assert_eq!(protocol.to_string(), "GetSceneList failed: boom");
    }

    #[test]
    fn test_connection_error_is_verbatim() {
        let err = ConnectionError::new("Authentication failed.");
        assert_eq!(err.to_string(), "Authentication failed.");
    }
}
