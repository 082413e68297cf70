//! CLI configuration: a thin wrapper around `vzclient_config`.
//!
//! Resolves the active profile and applies `GlobalOpts` flag overrides
//! (--url, --insecure, --timeout) before building the repository.

use std::path::PathBuf;
use std::sync::Arc;

use vzclient_api::VzClient;
use vzclient_config::{Config, Profile, SettingsStore};
use vzclient_core::{ChannelRepository, ChannelStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file selected by `--config`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(vzclient_config::config_path)
}

/// Full config: file plus `VZ_` environment overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(vzclient_config::load_config_from(&config_path(global))?)
}

/// Write-through store over the config file only.
pub fn open_store(global: &GlobalOpts) -> Result<SettingsStore, CliError> {
    Ok(SettingsStore::open(config_path(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The active profile with CLI flag overrides applied.
///
/// An explicitly requested profile must exist; the implicit default may be
/// absent, in which case built-in defaults are used.
pub fn resolve_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    let mut profile = match config.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut available: Vec<_> = config.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => Profile::default(),
    };

    if let Some(ref url) = global.url {
        profile.set("url", url)?;
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    Ok((name, profile))
}

/// Build a repository for the active profile.
///
/// The channel cache lives in the platform cache directory, one file per
/// profile, unless `--no-cache` is given.
pub fn build_repository(global: &GlobalOpts) -> Result<(String, ChannelRepository), CliError> {
    let config = load(global)?;
    let (name, profile) = resolve_profile(global, &config)?;

    let settings = vzclient_config::profile_to_settings(&profile, &name)?;
    let transport = vzclient_config::profile_to_transport(&profile, &config.defaults);
    let client = VzClient::new(&transport).map_err(vzclient_core::CoreError::from)?;

    let store = if global.no_cache {
        ChannelStore::in_memory()
    } else {
        ChannelStore::open(vzclient_config::cache_path(&name))?
    };

    tracing::debug!(profile = %name, url = %settings.server_url, "repository configured");
    Ok((name, ChannelRepository::new(client, Arc::new(store), settings)))
}
