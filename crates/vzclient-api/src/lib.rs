// vzclient-api: Async Rust client for the Volkszaehler middleware REST/JSON API

pub mod capabilities;
pub mod client;
pub mod data;
pub mod entity;
pub mod error;
pub mod models;
pub mod transport;

pub use capabilities::CapabilitiesEnvelope;
pub use client::{BasicAuth, Endpoint, VzClient};
pub use data::{DataQuery, Grouping};
pub use error::Error;
pub use models::{
    DataDto, DataEnvelope, EntityDto, EntityEnvelope, EntityPayload, LegacyChannelDto,
};
pub use transport::{TlsMode, TransportConfig};
