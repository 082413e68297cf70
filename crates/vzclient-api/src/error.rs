use thiserror::Error;

/// Lowercased prefix of the middleware's exception for an unknown UUID.
const UNKNOWN_ENTITY: &str = "no entity found";

/// Top-level error type for the `vzclient-api` crate.
///
/// Covers every failure mode of a single request: transport, HTTP status,
/// the middleware's own exception envelope, and body decoding.
/// `vzclient-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Middleware ──────────────────────────────────────────────────
    /// Non-success HTTP status without a parseable exception body.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Exception reported by the middleware
    /// (`{"exception": {"type": "...", "message": "..."}}`).
    #[error("Middleware error ({kind}): {message}")]
    Api {
        kind: String,
        message: String,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a transport-level timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Returns `true` if the server reported that the requested entity
    /// does not exist.
    ///
    /// The middleware answers unknown UUIDs with a 400 and a
    /// "No entity found" exception rather than a 404. Other exceptions,
    /// such as a routing error for a wrong base path, are not matched.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status, .. } => *status == 404,
            Self::Api {
                message, status, ..
            } => *status == 404 || message.to_lowercase().contains(UNKNOWN_ENTITY),
            _ => false,
        }
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Http { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
