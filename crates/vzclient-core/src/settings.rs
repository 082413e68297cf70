// ── Runtime settings snapshot ──
//
// Immutable per-operation view of the user's configuration. Where these
// values are persisted is the caller's concern; the repository only ever
// sees a complete `Settings` value.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use vzclient_api::Endpoint;

use crate::error::CoreError;

pub const DEFAULT_SERVER_URL: &str = "http://demo.volkszaehler.org/middleware.php";
pub const DEFAULT_TUPLES: u32 = 1000;

/// Ordering of channel listings.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SortMode {
    /// Groups first, then by title.
    #[default]
    Groups,
    Title,
    Type,
    /// Most recently updated first; channels without a reading last.
    LastUpdate,
}

/// HTTP basic-auth credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Everything a request needs to know about the user's configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Middleware root URL.
    pub server_url: String,
    pub credentials: Option<Credentials>,
    /// Private channel UUIDs. When non-empty these are loaded one by one
    /// instead of the public entity tree.
    pub private_channels: Vec<String>,
    /// Default tuple count for data requests.
    pub tuples: u32,
    pub zero_based_y_axis: bool,
    pub auto_reload: bool,
    pub sort_mode: SortMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            credentials: None,
            private_channels: Vec::new(),
            tuples: DEFAULT_TUPLES,
            zero_based_y_axis: false,
            auto_reload: false,
            sort_mode: SortMode::default(),
        }
    }
}

impl Settings {
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password,
        });
        self
    }

    pub fn with_private_channels(mut self, uuids: Vec<String>) -> Self {
        self.private_channels = uuids;
        self
    }

    pub fn uses_private_channels(&self) -> bool {
        !self.private_channels.is_empty()
    }

    /// Request target for this snapshot.
    pub fn endpoint(&self) -> Result<Endpoint, CoreError> {
        let endpoint = Endpoint::parse(&self.server_url).map_err(|e| CoreError::Config {
            message: format!("invalid server URL '{}': {e}", self.server_url),
        })?;
        Ok(match &self.credentials {
            Some(creds) if !creds.username.is_empty() => {
                endpoint.with_basic_auth(creds.username.clone(), creds.password.clone())
            }
            _ => endpoint,
        })
    }
}

/// Split a comma-separated UUID list, trimming entries and dropping empties.
pub fn parse_private_channels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
