// ── Channel repository ──
//
// Single source of truth for which channels exist and what their latest
// data is. Reconciles the middleware, the local cache and the current
// settings snapshot. Each operation comes in two forms: a spawned
// `RequestStream` (Loading, then one terminal state) and a plain async
// method. Nothing here retries or deduplicates; identical concurrent
// requests all reach the network.

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use vzclient_api::{DataQuery, Endpoint, Grouping, VzClient};

use crate::convert::{channel_data_from_dto, channels_from_payload, flatten_including_groups};
use crate::error::CoreError;
use crate::model::data::grouping_for_span;
use crate::model::{Channel, ChannelData, TimeRange};
use crate::settings::Settings;
use crate::state::RequestStream;
use crate::store::ChannelStore;

/// Requests allowed in flight at once across all repository operations.
pub const DEFAULT_REQUEST_LIMIT: usize = 8;

// ── DataRequest ──────────────────────────────────────────────────

/// Window and resolution of a data fetch. Unset bounds mean "most recent";
/// an unset tuple count falls back to the settings default; an unset
/// grouping is chosen from the span when both bounds are given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataRequest {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub tuples: Option<u32>,
    pub grouping: Option<Grouping>,
}

impl DataRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(from: i64, to: i64) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    /// The preset's span ending now.
    pub fn last(range: TimeRange) -> Self {
        Self::ending_at(range, Utc::now().timestamp_millis())
    }

    pub fn ending_at(range: TimeRange, now_ms: i64) -> Self {
        let (from, to) = range.window_ending_at(now_ms);
        Self::between(from, to)
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

    pub fn grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = Some(grouping);
        self
    }

    fn to_query(self, settings: &Settings) -> DataQuery {
        let group = self.grouping.or_else(|| match (self.from, self.to) {
            (Some(from), Some(to)) => grouping_for_span(to.saturating_sub(from)),
            _ => None,
        });
        DataQuery {
            from: self.from,
            to: self.to,
            tuples: Some(self.tuples.unwrap_or(settings.tuples)),
            group,
        }
    }
}

// ── ServerInfo ───────────────────────────────────────────────────

/// Result of a capabilities probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub url: String,
    /// Version of the JSON API envelope.
    pub api_version: Option<String>,
    /// Middleware software version.
    pub server_version: Option<String>,
    /// Capability sections the server advertises.
    pub sections: Vec<String>,
}

// ── ChannelRepository ────────────────────────────────────────────

/// Entry point for consumers.
///
/// Cheaply cloneable via `Arc<RepositoryInner>`. Settings are swapped
/// atomically with [`update_settings`](Self::update_settings); every
/// operation reads one snapshot when it starts and uses it throughout.
#[derive(Clone)]
pub struct ChannelRepository {
    inner: Arc<RepositoryInner>,
}

struct RepositoryInner {
    client: VzClient,
    store: Arc<ChannelStore>,
    settings: ArcSwap<Settings>,
    permits: Arc<Semaphore>,
}

impl ChannelRepository {
    pub fn new(client: VzClient, store: Arc<ChannelStore>, settings: Settings) -> Self {
        Self::with_request_limit(client, store, settings, DEFAULT_REQUEST_LIMIT)
    }

    pub fn with_request_limit(
        client: VzClient,
        store: Arc<ChannelStore>,
        settings: Settings,
        limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(RepositoryInner {
                client,
                store,
                settings: ArcSwap::from_pointee(settings),
                permits: Arc::new(Semaphore::new(limit.max(1))),
            }),
        }
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<Settings> {
        self.inner.settings.load_full()
    }

    /// Takes effect for operations started after this call.
    pub fn update_settings(&self, settings: Settings) {
        self.inner.settings.store(Arc::new(settings));
        debug!("settings snapshot replaced");
    }

    pub fn store(&self) -> &Arc<ChannelStore> {
        &self.inner.store
    }

    // ── Streamed operations ──────────────────────────────────────

    /// Top-level channels (hierarchy preserved) from the public entity tree,
    /// or from the private UUID list when one is configured. Does not touch
    /// the cache.
    pub fn get_channels(&self) -> RequestStream<Vec<Channel>> {
        let this = self.clone();
        self.spawn(async move { this.fetch_channels().await })
    }

    /// One channel by UUID. Updates the cached metadata of the channel and
    /// its descendants.
    pub fn get_channel(&self, uuid: impl Into<String>) -> RequestStream<Channel> {
        let this = self.clone();
        let uuid = uuid.into();
        self.spawn(async move { this.fetch_channel(&uuid).await })
    }

    /// A data window for a leaf channel. Updates the cached last reading.
    pub fn get_channel_data(
        &self,
        uuid: impl Into<String>,
        request: DataRequest,
    ) -> RequestStream<ChannelData> {
        let this = self.clone();
        let uuid = uuid.into();
        self.spawn(async move { this.fetch_channel_data(&uuid, request).await })
    }

    /// Refetch and replace the cache wholesale.
    pub fn refresh_channels(&self) -> RequestStream<Vec<Channel>> {
        let this = self.clone();
        self.spawn(async move { this.sync_channels().await })
    }

    fn spawn<T, F>(&self, work: F) -> RequestStream<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        RequestStream::spawn(Arc::clone(&self.inner.permits), work)
    }

    // ── Awaitable operations ─────────────────────────────────────

    pub async fn fetch_channels(&self) -> Result<Vec<Channel>, CoreError> {
        let settings = self.settings();
        self.load_roots(&settings).await
    }

    pub async fn fetch_channel(&self, uuid: &str) -> Result<Channel, CoreError> {
        let settings = self.settings();
        let endpoint = settings.endpoint()?;
        let mut channel = self.load_entity(&endpoint, uuid).await?;

        let store = &self.inner.store;
        store.upsert_many(flatten_including_groups(std::slice::from_ref(&channel)));
        self.persist_cache().await;
        if let Some(cached) = store.get(&channel.uuid) {
            channel.checked = cached.checked;
            channel.last_value = cached.last_value;
            channel.last_timestamp = cached.last_timestamp;
        }
        Ok(channel)
    }

    pub async fn fetch_channel_data(
        &self,
        uuid: &str,
        request: DataRequest,
    ) -> Result<ChannelData, CoreError> {
        if self.inner.store.get(uuid).is_some_and(|c| c.is_group()) {
            return Err(CoreError::GroupNotQueryable {
                uuid: uuid.to_owned(),
            });
        }

        let settings = self.settings();
        let endpoint = settings.endpoint()?;
        let query = request.to_query(&settings);

        let envelope = self
            .inner
            .client
            .get_channel_data(&endpoint, uuid, &query)
            .await
            .map_err(|e| CoreError::for_channel(e, uuid))?;
        let dto = envelope.data.ok_or_else(|| CoreError::MalformedResponse {
            message: format!("no data in response for channel {uuid}"),
        })?;

        let data = channel_data_from_dto(dto, uuid, (query.from, query.to));
        if let Some(last) = data.last_tuple() {
            self.inner
                .store
                .update_last_reading(uuid, last.value, last.timestamp);
            self.persist_cache().await;
        }
        Ok(data)
    }

    /// Fetch with the same strategy as [`fetch_channels`](Self::fetch_channels)
    /// and replace the cache with every node, groups included. Returns the
    /// flattened set that was stored.
    pub async fn sync_channels(&self) -> Result<Vec<Channel>, CoreError> {
        let settings = self.settings();
        let roots = self.load_roots(&settings).await?;
        let flat = flatten_including_groups(&roots);
        self.inner.store.replace_all(flat.clone());
        self.persist_cache().await;
        info!(count = flat.len(), "channel cache refreshed");
        Ok(flat)
    }

    /// Probe the server's capabilities endpoint.
    pub async fn fetch_server_info(&self) -> Result<ServerInfo, CoreError> {
        let settings = self.settings();
        let endpoint = settings.endpoint()?;
        let caps = self.inner.client.get_capabilities(&endpoint, None).await?;
        Ok(ServerInfo {
            url: endpoint.base_url.to_string(),
            server_version: caps.server_version().map(str::to_owned),
            sections: caps.capabilities.keys().cloned().collect(),
            api_version: caps.version,
        })
    }

    /// The cache is a convenience; a failed write is logged, not returned.
    async fn persist_cache(&self) {
        if let Err(e) = self.inner.store.persist().await {
            warn!(error = %e, "failed to persist channel cache");
        }
    }

    // ── Loading strategies ───────────────────────────────────────

    async fn load_roots(&self, settings: &Settings) -> Result<Vec<Channel>, CoreError> {
        let endpoint = settings.endpoint()?;
        if settings.uses_private_channels() {
            return Ok(self
                .load_private(&endpoint, &settings.private_channels)
                .await);
        }
        let envelope = self.inner.client.list_entities(&endpoint).await?;
        Ok(channels_from_payload(envelope.into_payload()))
    }

    /// Fetch each UUID independently. Failures are logged and the channel
    /// omitted; the order of the successes follows `uuids`.
    async fn load_private(&self, endpoint: &Endpoint, uuids: &[String]) -> Vec<Channel> {
        let fetches = uuids.iter().map(|uuid| async move {
            let result = self.load_entity(endpoint, uuid).await;
            (uuid, result)
        });

        join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(uuid, result)| match result {
                Ok(channel) => Some(channel),
                Err(e) => {
                    warn!(uuid = %uuid, error = %e, "skipping private channel");
                    None
                }
            })
            .collect()
    }

    async fn load_entity(&self, endpoint: &Endpoint, uuid: &str) -> Result<Channel, CoreError> {
        let envelope = self
            .inner
            .client
            .get_entity(endpoint, uuid)
            .await
            .map_err(|e| CoreError::for_channel(e, uuid))?;
        pick_entity(channels_from_payload(envelope.into_payload()), uuid)
    }
}

/// The requested channel out of a single-entity response. Older servers
/// wrap it in a list.
fn pick_entity(mut channels: Vec<Channel>, uuid: &str) -> Result<Channel, CoreError> {
    if let Some(pos) = channels
        .iter()
        .position(|c| c.uuid.eq_ignore_ascii_case(uuid))
    {
        return Ok(channels.swap_remove(pos));
    }
    match channels.len() {
        1 => Ok(channels.swap_remove(0)),
        _ => Err(CoreError::ChannelNotFound {
            uuid: uuid.to_owned(),
        }),
    }
}
