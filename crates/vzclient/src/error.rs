//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use vzclient_config::ConfigError;
use vzclient_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to middleware at {url}")]
    #[diagnostic(
        code(vzc::connection_failed),
        help(
            "Check that the middleware is running and reachable.\n\
             {reason}\n\
             Try: vzc server info --url <middleware URL>"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to {url} timed out")]
    #[diagnostic(
        code(vzc::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { url: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed (HTTP {status})")]
    #[diagnostic(
        code(vzc::auth_failed),
        help(
            "Verify the username and password of profile '{profile}'.\n\
             Run: vzc config set-password --profile {profile}"
        )
    )]
    AuthFailed { status: u16, profile: String },

    #[error("No password configured for user '{username}' in profile '{profile}'")]
    #[diagnostic(
        code(vzc::no_credentials),
        help(
            "Store one with: vzc config set-password --profile {profile}\n\
             Or set the VZ_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String, username: String },

    // ── Channels ─────────────────────────────────────────────────────
    #[error("Channel '{uuid}' not found")]
    #[diagnostic(
        code(vzc::not_found),
        help("Run: vzc channels list to see available channels")
    )]
    ChannelNotFound { uuid: String },

    #[error("Channel '{uuid}' is not in the local cache")]
    #[diagnostic(
        code(vzc::not_cached),
        help("Run: vzc channels refresh to populate the cache")
    )]
    NotCached { uuid: String },

    #[error("Channel '{uuid}' is a group")]
    #[diagnostic(
        code(vzc::group_not_queryable),
        help("Groups have no measurements of their own; query one of their channels instead.")
    )]
    GroupNotQueryable { uuid: String },

    // ── Middleware ───────────────────────────────────────────────────
    #[error("HTTP {status}: {message}")]
    #[diagnostic(code(vzc::http))]
    Http { status: u16, message: String },

    #[error("Unexpected response from middleware: {message}")]
    #[diagnostic(
        code(vzc::malformed_response),
        help("Check that the URL points at middleware.php of a Volkszaehler installation.")
    )]
    MalformedResponse { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vzc::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vzc::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vzc config init --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Profile '{name}' already exists")]
    #[diagnostic(
        code(vzc::profile_exists),
        help("Use --force to overwrite it, or change single values with: vzc config set")
    )]
    ProfileExists { name: String },

    #[error("{0}")]
    #[diagnostic(code(vzc::config))]
    Config(String),

    #[error("Channel cache error: {0}")]
    #[diagnostic(
        code(vzc::cache),
        help("Delete the cache file or run with --no-cache.")
    )]
    Cache(String),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(vzc::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ChannelNotFound { .. } | Self::NotCached { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::GroupNotQueryable { .. }
            | Self::ProfileNotFound { .. }
            | Self::ProfileExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Name the profile in authentication help text.
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { status, .. } => Self::AuthFailed {
                status,
                profile: name.into(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Timeout { url } => Self::Timeout { url },
            CoreError::Http { status, .. } if matches!(status, 401 | 403) => {
                Self::AuthFailed {
                    status,
                    profile: "current".into(),
                }
            }
            CoreError::Http { status, message } => Self::Http { status, message },
            CoreError::MalformedResponse { message } => Self::MalformedResponse { message },
            CoreError::ChannelNotFound { uuid } => Self::ChannelNotFound { uuid },
            CoreError::GroupNotQueryable { uuid } => Self::GroupNotQueryable { uuid },
            CoreError::Config { message } => Self::Validation {
                field: "url".into(),
                reason: message,
            },
            CoreError::Storage { message } => Self::Cache(message),
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile, username } => {
                Self::NoCredentials { profile, username }
            }
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: "(see: vzc config profiles)".into(),
            },
            ConfigError::UnknownKey { key } => Self::Validation {
                field: key,
                reason: format!(
                    "unknown key; expected one of: {}",
                    vzclient_config::PROFILE_KEYS.join(", ")
                ),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_exit_codes() {
        let cases = [
            (
                CoreError::ConnectionFailed {
                    url: "http://vz".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::Timeout {
                    url: "http://vz".into(),
                },
                exit_code::TIMEOUT,
            ),
            (
                CoreError::ChannelNotFound { uuid: "c1".into() },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::Http {
                    status: 401,
                    message: "Unauthorized".into(),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::Http {
                    status: 500,
                    message: "boom".into(),
                },
                exit_code::GENERAL,
            ),
            (
                CoreError::GroupNotQueryable { uuid: "g1".into() },
                exit_code::USAGE,
            ),
        ];

        for (core, code) in cases {
            let label = core.to_string();
            assert_eq!(CliError::from(core).exit_code(), code, "{label}");
        }
    }

    #[test]
    fn unknown_config_key_lists_valid_keys() {
        let err = CliError::from(ConfigError::UnknownKey { key: "colour".into() });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        match err {
            CliError::Validation { field, reason } => {
                assert_eq!(field, "colour");
                assert!(reason.contains("private_channels"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
