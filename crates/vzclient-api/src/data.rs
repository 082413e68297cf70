// Time-series endpoints
//
// `GET /data/{uuid}.json` with optional window bounds, tuple count and
// server-side grouping.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::client::{Endpoint, VzClient};
use crate::error::Error;
use crate::models::DataEnvelope;

/// Server-side time-bucket aggregation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Grouping {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Parameters of a single data request. Unset fields are omitted from the
/// query string and the server picks its own defaults ("most recent").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuery {
    /// Window start, epoch milliseconds (inclusive).
    pub from: Option<i64>,
    /// Window end, epoch milliseconds (exclusive).
    pub to: Option<i64>,
    /// Requested number of tuples; the server downsamples to roughly this many.
    pub tuples: Option<u32>,
    pub group: Option<Grouping>,
}

impl DataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, from: i64) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: i64) -> Self {
        self.to = Some(to);
        self
    }

    pub fn tuples(mut self, tuples: u32) -> Self {
        self.tuples = Some(tuples);
        self
    }

    pub fn group(mut self, group: Grouping) -> Self {
        self.group = Some(group);
        self
    }

    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(from) = self.from {
            pairs.push(("from", from.to_string()));
        }
        if let Some(to) = self.to {
            pairs.push(("to", to.to_string()));
        }
        if let Some(group) = self.group {
            pairs.push(("group", group.to_string()));
        }
        if let Some(tuples) = self.tuples {
            pairs.push(("tuples", tuples.to_string()));
        }
        pairs
    }
}

impl VzClient {
    /// Fetch a time-series window for one channel.
    ///
    /// `GET /data/{uuid}.json?from&to&group&tuples`
    ///
    /// Groups cannot be queried directly; the middleware rejects them with
    /// an exception.
    pub async fn get_channel_data(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        query: &DataQuery,
    ) -> Result<DataEnvelope, Error> {
        let file = format!("{}.json", uuid.trim());
        let url = endpoint.url(&["data", &file])?;
        debug!(uuid, ?query, "fetching channel data");
        self.get(endpoint, url, &query.to_pairs()).await
    }
}
