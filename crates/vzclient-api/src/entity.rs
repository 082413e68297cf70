// Entity endpoints
//
// Channel and group metadata: the public hierarchy, single-entity lookups
// (public detail or private channel by UUID), and the legacy flat list.

use tracing::debug;

use crate::client::{Endpoint, VzClient};
use crate::error::Error;
use crate::models::EntityEnvelope;

impl VzClient {
    /// Fetch the full public entity hierarchy.
    ///
    /// `GET /entity.json`
    pub async fn list_entities(&self, endpoint: &Endpoint) -> Result<EntityEnvelope, Error> {
        let url = endpoint.url(&["entity.json"])?;
        debug!("listing public entities");
        self.get(endpoint, url, &[]).await
    }

    /// Fetch a single entity by UUID.
    ///
    /// `GET /entity/{uuid}.json`
    ///
    /// Works for public entities and, with credentials, for private channels
    /// that are not part of the public listing.
    pub async fn get_entity(&self, endpoint: &Endpoint, uuid: &str) -> Result<EntityEnvelope, Error> {
        let file = format!("{}.json", uuid.trim());
        let url = endpoint.url(&["entity", &file])?;
        debug!(uuid, "fetching entity");
        self.get(endpoint, url, &[]).await
    }

    /// Fetch the legacy flat channel list.
    ///
    /// `GET /channel.json`
    pub async fn list_channels(&self, endpoint: &Endpoint) -> Result<EntityEnvelope, Error> {
        let url = endpoint.url(&["channel.json"])?;
        debug!("listing legacy channels");
        self.get(endpoint, url, &[]).await
    }
}
