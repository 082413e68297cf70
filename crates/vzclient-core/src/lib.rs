//! Channel data access layer between `vzclient-api` and consumers (CLI or UI).
//!
//! This crate owns the domain model, the wire-to-domain mapping, and the
//! local channel cache for Volkszaehler clients:
//!
//! - **[`ChannelRepository`]**: Single source of truth for "which channels
//!   exist" and "what is their latest data". Chooses between the public
//!   entity tree and the configured private channel list, and delivers every
//!   operation as a [`RequestStream`] of `Loading` then exactly one terminal
//!   [`RequestState`].
//!
//! - **[`ChannelStore`]**: Concurrent channel cache keyed by UUID
//!   (`DashMap` + `tokio::sync::watch` snapshot), optionally persisted to a
//!   JSON file so a channel list is available before the network answers.
//!
//! - **[`convert`]**: Pure functions collapsing the middleware's entity tree,
//!   single entity, and legacy flat channel shapes into [`Channel`], plus
//!   tuple parsing and unit derivation.
//!
//! - **[`Settings`]**: Immutable runtime configuration snapshot. The
//!   repository swaps snapshots atomically and reads exactly one per
//!   operation.

pub mod convert;
pub mod error;
pub mod model;
pub mod repository;
pub mod settings;
pub mod state;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::CoreError;
pub use repository::{ChannelRepository, DataRequest, ServerInfo};
pub use settings::{Credentials, Settings, SortMode};
pub use state::{RequestState, RequestStream};
pub use store::{ChannelFilter, ChannelQuery, ChannelStore};
pub use stream::ChannelStream;

pub use model::{Channel, ChannelData, ChannelType, DataTuple, Statistics, TimeRange};

// The wire-level grouping is part of the public request surface.
pub use vzclient_api::Grouping;
