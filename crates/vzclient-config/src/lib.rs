//! Shared configuration for Volkszaehler clients.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to the runtime [`Settings`] snapshot and HTTP
//! [`TransportConfig`]. [`SettingsStore`] writes every change straight
//! back to disk, so there is no separate "save" step.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vzclient_api::{TlsMode, TransportConfig};
use vzclient_core::settings::{DEFAULT_SERVER_URL, DEFAULT_TUPLES, parse_private_channels};
use vzclient_core::{Credentials, Settings, SortMode};

const KEYRING_SERVICE: &str = "vzclient";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password found for user '{username}' in profile '{profile}'")]
    NoCredentials { profile: String, username: String },

    #[error("unknown profile '{name}'")]
    UnknownProfile { name: String },

    #[error("unknown setting '{key}'")]
    UnknownKey { key: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Connect and read timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named middleware profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Middleware root URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Username for HTTP basic auth. No username means no auth.
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Comma-separated private channel UUIDs. When set, these channels are
    /// loaded instead of the public entity list.
    #[serde(default)]
    pub private_channels: String,

    /// Default tuple count for data requests.
    #[serde(default = "default_tuples")]
    pub tuples: u32,

    #[serde(default)]
    pub zero_based_y_axis: bool,

    #[serde(default)]
    pub auto_reload: bool,

    #[serde(default)]
    pub sort_mode: SortMode,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: None,
            password: None,
            password_env: None,
            private_channels: String::new(),
            tuples: DEFAULT_TUPLES,
            zero_based_y_axis: false,
            auto_reload: false,
            sort_mode: SortMode::default(),
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_url() -> String {
    DEFAULT_SERVER_URL.into()
}
fn default_tuples() -> u32 {
    DEFAULT_TUPLES
}

/// Keys accepted by [`Profile::set`].
pub const PROFILE_KEYS: &[&str] = &[
    "url",
    "username",
    "password",
    "password_env",
    "private_channels",
    "tuples",
    "zero_based_y_axis",
    "auto_reload",
    "sort_mode",
    "ca_cert",
    "insecure",
    "timeout",
];

impl Profile {
    /// Parsed private channel list.
    pub fn private_channel_list(&self) -> Vec<String> {
        parse_private_channels(&self.private_channels)
    }

    /// Set one field from its string form, validating the value. An empty
    /// value clears optional fields.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let optional = || (!value.is_empty()).then(|| value.to_owned());

        match key {
            "url" => {
                validate_url(value)?;
                value.clone_into(&mut self.url);
            }
            "username" => self.username = optional(),
            "password" => self.password = optional(),
            "password_env" => self.password_env = optional(),
            "private_channels" => {
                let list = parse_private_channels(value);
                validate_channel_uuids(&list)?;
                self.private_channels = list.join(",");
            }
            "tuples" => self.tuples = parse_field(key, value)?,
            "zero_based_y_axis" => self.zero_based_y_axis = parse_field(key, value)?,
            "auto_reload" => self.auto_reload = parse_field(key, value)?,
            "sort_mode" => self.sort_mode = parse_field(key, value)?,
            "ca_cert" => self.ca_cert = optional().map(PathBuf::from),
            "insecure" => {
                self.insecure = optional().map(|v| parse_field(key, &v)).transpose()?;
            }
            "timeout" => {
                self.timeout = optional().map(|v| parse_field(key, &v)).transpose()?;
            }
            other => {
                return Err(ConfigError::UnknownKey { key: other.into() });
            }
        }
        Ok(())
    }
}

fn parse_field<T>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| invalid(field, e.to_string()))
}

fn validate_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw
        .parse()
        .map_err(|_| invalid("url", format!("invalid URL: {raw}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid("url", format!("unsupported scheme '{other}'"))),
    }
}

fn validate_channel_uuids(uuids: &[String]) -> Result<(), ConfigError> {
    for raw in uuids {
        uuid::Uuid::parse_str(raw)
            .map_err(|e| invalid("private_channels", format!("'{raw}' is not a UUID: {e}")))?;
    }
    Ok(())
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "volkszaehler", "vzclient")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Channel cache file for a profile.
pub fn cache_path(profile_name: &str) -> PathBuf {
    let file = format!("channels-{profile_name}.json");
    project_dirs().map_or_else(
        || dirs_fallback().join("cache").join(&file),
        |dirs| dirs.cache_dir().join(&file),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vzclient");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the TOML file at `path`, then `VZ_`-prefixed env vars
/// (nested keys separated by `__`, e.g. `VZ_PROFILES__HOME__URL`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = file_figment(path)
        .merge(Env::prefixed("VZ_").split("__"))
        .extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the profile's password: the profile's `password_env` variable,
/// then `VZ_PASSWORD`, then the system keyring, then plaintext config.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    if let Ok(pw) = std::env::var("VZ_PASSWORD") {
        return Some(SecretString::from(pw));
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Some(SecretString::from(pw));
        }
    }

    profile
        .password
        .as_ref()
        .map(|pw| SecretString::from(pw.clone()))
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))?;
    entry.set_password(password)?;
    Ok(())
}

/// Basic-auth credentials, or `None` for an anonymous profile.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<Credentials>, ConfigError> {
    let Some(username) = profile
        .username
        .clone()
        .or_else(|| std::env::var("VZ_USERNAME").ok())
        .filter(|u| !u.is_empty())
    else {
        return Ok(None);
    };

    let password =
        resolve_password(profile, profile_name).ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            username: username.clone(),
        })?;

    Ok(Some(Credentials { username, password }))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the runtime settings snapshot for a profile.
pub fn profile_to_settings(profile: &Profile, profile_name: &str) -> Result<Settings, ConfigError> {
    validate_url(&profile.url)?;
    let private_channels = profile.private_channel_list();
    validate_channel_uuids(&private_channels)?;

    Ok(Settings {
        server_url: profile.url.clone(),
        credentials: resolve_credentials(profile, profile_name)?,
        private_channels,
        tuples: profile.tuples,
        zero_based_y_axis: profile.zero_based_y_axis,
        auto_reload: profile.auto_reload,
        sort_mode: profile.sort_mode,
    })
}

/// HTTP transport for a profile, falling back to global defaults.
pub fn profile_to_transport(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    TransportConfig::default()
        .with_tls(tls)
        .with_timeout(Duration::from_secs(
            profile.timeout.unwrap_or(defaults.timeout),
        ))
}

// ── SettingsStore ───────────────────────────────────────────────────

/// Write-through view of the config file.
///
/// Reads the file layer only (no env overrides), so values persisted by
/// [`update`](Self::update) are exactly what the user set.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    config: Config,
}

impl SettingsStore {
    /// Open the canonical config file (missing file = defaults).
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(config_path())
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config: Config = file_figment(&path).extract()?;
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `requested`, else the configured default, else `"default"`.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.config.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.config.profiles.get(name)
    }

    /// Apply `f` to the named profile (created with defaults if missing)
    /// and persist immediately.
    pub fn update<F>(&mut self, name: &str, f: F) -> Result<&Profile, ConfigError>
    where
        F: FnOnce(&mut Profile) -> Result<(), ConfigError>,
    {
        let mut profile = self.config.profiles.get(name).cloned().unwrap_or_default();
        f(&mut profile)?;
        self.config.profiles.insert(name.to_owned(), profile);
        save_config_to(&self.config, &self.path)?;
        self.profile(name).ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }

    /// Set one profile field by key and persist.
    pub fn set(&mut self, name: &str, key: &str, value: &str) -> Result<&Profile, ConfigError> {
        self.update(name, |p| p.set(key, value))
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.config.profiles.contains_key(name) {
            return Err(ConfigError::UnknownProfile { name: name.into() });
        }
        self.config.default_profile = Some(name.to_owned());
        save_config_to(&self.config, &self.path)
    }

    pub fn remove_profile(&mut self, name: &str) -> Result<Profile, ConfigError> {
        let removed = self
            .config
            .profiles
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })?;
        save_config_to(&self.config, &self.path)?;
        Ok(removed)
    }

    /// Runtime settings for a profile; an unconfigured profile yields the
    /// built-in defaults.
    pub fn settings(&self, name: &str) -> Result<Settings, ConfigError> {
        match self.profile(name) {
            Some(profile) => profile_to_settings(profile, name),
            None => profile_to_settings(&Profile::default(), name),
        }
    }
}
