// ── Core error types ──
//
// User-facing errors from vzclient-core. Consumers see a small taxonomy
// (connectivity, HTTP status, malformed response, not found) rather than
// raw transport errors. The `From<vzclient_api::Error>` impl performs the
// translation. `CoreError` is `Clone` so it can travel inside stream states.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to middleware at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    // ── Server errors ────────────────────────────────────────────────
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Channel not found: {uuid}")]
    ChannelNotFound { uuid: String },

    #[error("Channel {uuid} is a group and has no measurements of its own")]
    GroupNotQueryable { uuid: String },

    // ── Local errors ─────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Channel cache error: {message}")]
    Storage { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Map an API error for a request about one specific channel, turning
    /// "unknown entity" answers into [`CoreError::ChannelNotFound`].
    pub fn for_channel(err: vzclient_api::Error, uuid: &str) -> Self {
        if err.is_not_found() {
            Self::ChannelNotFound { uuid: uuid.to_owned() }
        } else {
            err.into()
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ChannelNotFound { .. })
    }

    /// Whether a manual retry has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vzclient_api::Error> for CoreError {
    fn from(err: vzclient_api::Error) -> Self {
        match err {
            vzclient_api::Error::Transport(ref e) => {
                let url = e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string);
                if e.is_timeout() {
                    CoreError::Timeout { url }
                } else if let Some(status) = e.status() {
                    CoreError::Http {
                        status: status.as_u16(),
                        message: e.to_string(),
                    }
                } else if e.is_decode() {
                    CoreError::MalformedResponse {
                        message: e.to_string(),
                    }
                } else {
                    CoreError::ConnectionFailed {
                        url,
                        reason: e.to_string(),
                    }
                }
            }
            vzclient_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid server URL: {e}"),
            },
            vzclient_api::Error::Tls(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            vzclient_api::Error::Http { status, message } => CoreError::Http { status, message },
            vzclient_api::Error::Api {
                kind,
                message,
                status,
            } => CoreError::Http {
                status,
                message: format!("{kind}: {message}"),
            },
            vzclient_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedResponse { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_entity_maps_to_channel_not_found() {
        let err = vzclient_api::Error::Api {
            kind: "Exception".into(),
            message: "No entity found with UUID: 'abc'".into(),
            status: 400,
        };
        let core = CoreError::for_channel(err, "abc");
        assert!(core.is_not_found());
        assert_eq!(core.to_string(), "Channel not found: abc");
    }

    #[test]
    fn middleware_exception_keeps_type_and_message() {
        let err = vzclient_api::Error::Api {
            kind: "InvalidArgumentException".into(),
            message: "Invalid tuple count".into(),
            status: 400,
        };
        let core = CoreError::for_channel(err, "abc");
        match core {
            CoreError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "InvalidArgumentException: Invalid tuple count");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_body_is_malformed_response() {
        let err = vzclient_api::Error::Deserialization {
            message: "expected value at line 1".into(),
            body: "<html>".into(),
        };
        let core = CoreError::from(err);
        assert!(matches!(core, CoreError::MalformedResponse { .. }));
        assert!(!core.is_retryable());
    }
}
