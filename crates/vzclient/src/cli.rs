//! Clap derive structures for the `vzc` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use vzclient_core::{Grouping, SortMode, TimeRange};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vzc -- channels and measurements from a Volkszaehler middleware
#[derive(Debug, Parser)]
#[command(
    name = "vzc",
    version,
    about = "Browse Volkszaehler channels and measurements from the command line",
    long_about = "Lists the channels a Volkszaehler middleware exposes (public entities\n\
        or a private list of channel UUIDs), keeps a local channel cache, and\n\
        fetches measurement windows with statistics.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "VZ_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Middleware URL (overrides profile)
    #[arg(long, short = 'u', env = "VZ_URL", global = true)]
    pub url: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "VZ_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Keep the channel cache in memory only
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VZ_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "VZ_INSECURE", global = true)]
    pub insecure: bool,

    /// Connect and read timeout in seconds (overrides profile)
    #[arg(long, env = "VZ_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List, inspect and select channels
    #[command(alias = "ch", alias = "c")]
    Channels(ChannelsArgs),

    /// Fetch measurements for a channel
    #[command(alias = "d")]
    Data(DataArgs),

    /// Inspect the middleware
    Server(ServerArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Channels ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ChannelsArgs {
    #[command(subcommand)]
    pub command: ChannelsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ChannelsCommand {
    /// List channels from the server, or from the local cache with --cached
    #[command(alias = "ls")]
    List(ChannelListArgs),

    /// Show one channel by UUID
    Get {
        /// Channel UUID
        uuid: String,
    },

    /// Refetch all channels and replace the local cache
    Refresh,

    /// Mark a cached channel as selected
    Check {
        /// Channel UUID
        uuid: String,
    },

    /// Clear the selection flag of a cached channel
    Uncheck {
        /// Channel UUID
        uuid: String,
    },

    /// Drop cached channels (all of them when no UUID is given)
    Forget {
        /// Channel UUIDs
        uuids: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct ChannelListArgs {
    /// Read the local cache instead of the server
    #[arg(long)]
    pub cached: bool,

    /// Only channels of this type tag (e.g. power, temperature)
    #[arg(long = "type", short = 't')]
    pub channel_type: Option<String>,

    /// Only selected channels (implies --cached)
    #[arg(long)]
    pub checked: bool,

    /// Case-insensitive search over title, UUID, type and description
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Sort order: groups, title, type, last-update (defaults to profile)
    #[arg(long)]
    pub sort: Option<SortMode>,

    /// Show groups as an indented tree instead of a flat list
    #[arg(long, conflicts_with_all = ["leaves", "groups"])]
    pub tree: bool,

    /// Leaf channels only
    #[arg(long, conflicts_with = "groups")]
    pub leaves: bool,

    /// Groups only
    #[arg(long)]
    pub groups: bool,
}

// ── Data ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DataArgs {
    /// Channel UUID
    pub uuid: String,

    /// Window preset ending now: hour, day, week, month, year
    #[arg(long, short = 'r', conflicts_with_all = ["from", "to"])]
    pub range: Option<TimeRange>,

    /// Window start (epoch milliseconds or RFC 3339)
    #[arg(long)]
    pub from: Option<String>,

    /// Window end (epoch milliseconds or RFC 3339)
    #[arg(long)]
    pub to: Option<String>,

    /// Number of tuples to request (defaults to profile)
    #[arg(long, short = 'n')]
    pub tuples: Option<u32>,

    /// Server-side grouping: hour, day, week, month, year
    #[arg(long, short = 'g')]
    pub group: Option<Grouping>,

    /// Print only the statistics, not the tuples
    #[arg(long)]
    pub stats: bool,
}

// ── Server ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServerArgs {
    #[command(subcommand)]
    pub command: ServerCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServerCommand {
    /// Probe the capabilities endpoint
    Info,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a profile (the active one unless --profile is given)
    Init {
        /// Middleware URL
        #[arg(long)]
        server: Option<String>,

        /// Username for HTTP basic auth
        #[arg(long)]
        username: Option<String>,

        /// Comma-separated private channel UUIDs
        #[arg(long)]
        private_channels: Option<String>,

        /// Overwrite an existing profile
        #[arg(long)]
        force: bool,
    },

    /// Display the configuration file with secrets masked
    Show,

    /// Set a profile value
    Set {
        /// Profile key (url, username, private_channels, tuples, sort_mode, ...)
        key: String,

        /// Value to set; empty clears optional keys
        value: String,
    },

    /// Store the profile password in the system keyring (read from stdin)
    SetPassword,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },

    /// Delete a profile
    Remove {
        /// Profile name
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
