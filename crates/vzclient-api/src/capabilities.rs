// Capabilities endpoint
//
// Server self-description (version, known entity definitions). Used as a
// connectivity and credential check.

use serde::Deserialize;
use tracing::debug;

use crate::client::{Endpoint, VzClient};
use crate::error::Error;

/// Body of `GET /capabilities.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilitiesEnvelope {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub capabilities: serde_json::Map<String, serde_json::Value>,
}

impl CapabilitiesEnvelope {
    /// Middleware software version, if the server reports one.
    pub fn server_version(&self) -> Option<&str> {
        self.capabilities
            .get("version")
            .and_then(|v| v.get("version"))
            .and_then(serde_json::Value::as_str)
    }
}

impl VzClient {
    /// Fetch server capabilities, optionally restricted to one section
    /// (`"definitions"`, `"version"`, ...).
    ///
    /// `GET /capabilities.json` or `GET /capabilities/{section}.json`
    pub async fn get_capabilities(
        &self,
        endpoint: &Endpoint,
        section: Option<&str>,
    ) -> Result<CapabilitiesEnvelope, Error> {
        let url = match section {
            Some(section) => {
                let file = format!("{section}.json");
                endpoint.url(&["capabilities", &file])?
            }
            None => endpoint.url(&["capabilities.json"])?,
        };
        debug!(?section, "fetching capabilities");
        self.get(endpoint, url, &[]).await
    }
}
