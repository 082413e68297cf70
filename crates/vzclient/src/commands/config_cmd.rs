//! Config subcommand handlers.
//!
//! Operate on the config file only; `VZ_` environment overrides are
//! neither shown nor persisted. Every change is written immediately.

use std::io::BufRead;

use tabled::Tabled;
use vzclient_config::{Config, SettingsStore};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "User")]
    username: String,
    #[tabled(rename = "Private channels")]
    private: usize,
    #[tabled(rename = "Default")]
    default: String,
}

#[derive(serde::Serialize)]
struct ProfileEntry {
    name: String,
    url: String,
    username: Option<String>,
    private_channels: Vec<String>,
    default: bool,
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with plaintext passwords masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    cfg
}

fn profile_entries(store: &SettingsStore) -> Vec<ProfileEntry> {
    let cfg = store.config();
    let default = cfg.default_profile.as_deref();
    let mut entries: Vec<ProfileEntry> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileEntry {
            name: name.clone(),
            url: p.url.clone(),
            username: p.username.clone(),
            private_channels: p.private_channel_list(),
            default: default == Some(name.as_str()),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

fn read_password() -> Result<String, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "no password on standard input".into(),
        });
    }
    Ok(password)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut store = config::open_store(global)?;
    let name = store.profile_name(global.profile.as_deref());

    match args.command {
        ConfigCommand::Init {
            server,
            username,
            private_channels,
            force,
        } => {
            if store.profile(&name).is_some() && !force {
                return Err(CliError::ProfileExists { name });
            }
            store.update(&name, |p| {
                *p = vzclient_config::Profile::default();
                if let Some(ref url) = server.or_else(|| global.url.clone()) {
                    p.set("url", url)?;
                }
                if let Some(ref user) = username {
                    p.set("username", user)?;
                }
                if let Some(ref list) = private_channels {
                    p.set("private_channels", list)?;
                }
                Ok(())
            })?;

            let default_missing = store
                .config()
                .default_profile
                .as_deref()
                .is_none_or(|d| store.profile(d).is_none());
            if default_missing {
                store.set_default_profile(&name)?;
            }
            if !global.quiet {
                eprintln!(
                    "Profile '{name}' written to {}",
                    store.path().display()
                );
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(store.config());
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_default(),
                |c| c.default_profile.clone().unwrap_or_default(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            store.set(&name, &key, &value)?;
            if !global.quiet {
                eprintln!("Set {key} for profile '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let password = read_password()?;
            vzclient_config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password for profile '{name}' stored in system keyring");
                if store.profile(&name).and_then(|p| p.username.as_ref()).is_none() {
                    eprintln!("Note: profile '{name}' has no username; set one with: vzc config set username <name>");
                }
            }
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&store.path().display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let entries = profile_entries(&store);
            let out = output::render_list(
                &global.output,
                &entries,
                |e| ProfileRow {
                    name: e.name.clone(),
                    url: e.url.clone(),
                    username: e.username.clone().unwrap_or_default(),
                    private: e.private_channels.len(),
                    default: if e.default { "*".into() } else { String::new() },
                },
                |e| e.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            store.set_default_profile(&name)?;
            if !global.quiet {
                eprintln!("Default profile is now '{name}'");
            }
            Ok(())
        }

        ConfigCommand::Remove { name } => {
            store.remove_profile(&name)?;
            if !global.quiet {
                eprintln!("Profile '{name}' removed");
            }
            Ok(())
        }
    }
}
