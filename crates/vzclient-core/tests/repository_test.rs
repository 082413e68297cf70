#![allow(clippy::unwrap_used)]
// Integration tests for `ChannelRepository` against a mocked middleware.

use std::sync::Arc;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vzclient_api::{TransportConfig, VzClient};
use vzclient_core::{
    Channel, ChannelRepository, ChannelStore, CoreError, DataRequest, DataTuple, RequestState,
    Settings,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(settings: impl FnOnce(Settings) -> Settings) -> (MockServer, ChannelRepository) {
    let server = MockServer::start().await;
    let settings = settings(Settings::default().with_server_url(base_url(&server)));
    let client = VzClient::new(&TransportConfig::default()).unwrap();
    let repo = ChannelRepository::new(client, Arc::new(ChannelStore::in_memory()), settings);
    (server, repo)
}

fn base_url(server: &MockServer) -> String {
    format!("{}/middleware.php", server.uri())
}

fn entity_tree() -> Value {
    json!({
        "version": "0.3",
        "entities": [
            {
                "uuid": "g1",
                "type": "group",
                "title": "House",
                "children": [
                    { "uuid": "c1", "type": "power", "title": "Fridge", "children": [] },
                    { "uuid": "c2", "type": "gas", "title": "Boiler" }
                ]
            },
            { "uuid": "c3", "type": "temperature", "title": "Outside" }
        ]
    })
}

async fn mount_json(server: &MockServer, at: &str, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

fn uuids<'a>(channels: impl IntoIterator<Item = &'a Channel>) -> Vec<String> {
    channels.into_iter().map(|c| c.uuid.clone()).collect()
}

// ── get_channels ────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_channels_streams_loading_then_tree() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 200, entity_tree()).await;

    let states: Vec<_> = repo.get_channels().collect().await;
    assert_eq!(states.len(), 2);
    assert!(states[0].is_loading());

    let RequestState::Success(roots) = &states[1] else {
        panic!("expected success, got {:?}", states[1]);
    };
    assert_eq!(uuids(roots), vec!["g1", "c3"]);
    assert_eq!(roots[0].children.len(), 2);
    assert_eq!(roots[0].children[0].unit, "W");

    // Listing never writes the cache.
    assert!(repo.store().is_empty());
}

#[tokio::test]
async fn test_private_channels_skip_failures_and_keep_order() {
    let (server, repo) = setup(|s| {
        s.with_private_channels(vec!["A".into(), "B".into(), "C".into()])
    })
    .await;

    mount_json(
        &server,
        "/middleware.php/entity/A.json",
        200,
        json!({ "entity": { "uuid": "A", "type": "power" } }),
    )
    .await;
    mount_json(
        &server,
        "/middleware.php/entity/B.json",
        500,
        json!({ "exception": { "type": "Exception", "message": "boom" } }),
    )
    .await;
    mount_json(
        &server,
        "/middleware.php/entity/C.json",
        200,
        json!({ "entity": { "uuid": "C", "type": "gas" } }),
    )
    .await;

    let channels = repo.get_channels().outcome().await.unwrap();
    assert_eq!(uuids(&channels), vec!["A", "C"]);
}

#[tokio::test]
async fn test_public_tree_failure_is_an_error_state() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 503, json!({})).await;

    let err = repo.get_channels().outcome().await.unwrap_err();
    assert!(matches!(err, CoreError::Http { status: 503, .. }), "got {err:?}");
    assert!(err.is_retryable());
}

// ── get_channel ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_channel_not_found_is_typed() {
    let (server, repo) = setup(|s| s).await;
    mount_json(
        &server,
        "/middleware.php/entity/nope.json",
        400,
        json!({ "exception": { "type": "Exception", "message": "No entity found with UUID: 'nope'" } }),
    )
    .await;

    let err = repo.get_channel("nope").outcome().await.unwrap_err();
    assert!(matches!(err, CoreError::ChannelNotFound { ref uuid } if uuid == "nope"));
}

#[tokio::test]
async fn test_get_channel_updates_metadata_and_keeps_local_state() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 200, entity_tree()).await;
    mount_json(
        &server,
        "/middleware.php/entity/c1.json",
        200,
        json!({ "entity": { "uuid": "c1", "type": "power", "title": "Fridge (kitchen)" } }),
    )
    .await;

    repo.sync_channels().await.unwrap();
    repo.store().set_checked("c1", false);

    let channel = repo.get_channel("c1").outcome().await.unwrap();
    assert_eq!(channel.title, "Fridge (kitchen)");
    assert!(!channel.checked);

    let cached = repo.store().get("c1").unwrap();
    assert_eq!(cached.title, "Fridge (kitchen)");
    assert!(!cached.checked);
}

#[tokio::test]
async fn test_get_channel_keeps_parent_link_from_refresh() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 200, entity_tree()).await;
    mount_json(
        &server,
        "/middleware.php/entity/c1.json",
        200,
        json!({ "entity": { "uuid": "c1", "type": "power", "title": "Fridge" } }),
    )
    .await;

    repo.sync_channels().await.unwrap();
    assert_eq!(repo.store().get("c1").unwrap().parent.as_deref(), Some("g1"));

    repo.get_channel("c1").outcome().await.unwrap();
    assert_eq!(repo.store().get("c1").unwrap().parent.as_deref(), Some("g1"));
}

#[tokio::test]
async fn test_get_group_stores_descendants_and_writes_cache() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("channels.json");
    let store = Arc::new(ChannelStore::open(&cache).unwrap());
    let client = VzClient::new(&TransportConfig::default()).unwrap();
    let repo = ChannelRepository::new(
        client,
        Arc::clone(&store),
        Settings::default().with_server_url(base_url(&server)),
    );
    mount_json(
        &server,
        "/middleware.php/entity/g1.json",
        200,
        json!({ "entity": entity_tree()["entities"][0].clone() }),
    )
    .await;

    let group = repo.get_channel("g1").outcome().await.unwrap();
    assert_eq!(group.children.len(), 2);
    assert!(!store.is_dirty());

    let reopened = ChannelStore::open(&cache).unwrap();
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.get("c2").unwrap().parent.as_deref(), Some("g1"));
}

// ── refresh_channels ────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 200, entity_tree()).await;

    repo.refresh_channels().outcome().await.unwrap();
    let first = repo.store().snapshot();
    repo.refresh_channels().outcome().await.unwrap();
    let second = repo.store().snapshot();

    assert_eq!(*first, *second);
    assert_eq!(uuids(second.iter().map(AsRef::as_ref)), vec!["c2", "c1", "g1", "c3"]);
    assert!(repo.store().get("g1").unwrap().is_group());
}

#[tokio::test]
async fn test_refresh_replaces_cache_wholesale() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 200, entity_tree()).await;
    repo.sync_channels().await.unwrap();
    assert_eq!(repo.store().len(), 4);

    server.reset().await;
    mount_json(
        &server,
        "/middleware.php/entity.json",
        200,
        json!({ "entities": [{ "uuid": "c3", "type": "temperature", "title": "Outside" }] }),
    )
    .await;
    repo.sync_channels().await.unwrap();

    assert_eq!(repo.store().len(), 1);
    assert!(repo.store().contains("c3"));
}

#[tokio::test]
async fn test_failed_refresh_keeps_cache() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 200, entity_tree()).await;
    repo.sync_channels().await.unwrap();

    server.reset().await;
    mount_json(&server, "/middleware.php/entity.json", 500, json!({})).await;
    assert!(repo.sync_channels().await.is_err());
    assert_eq!(repo.store().len(), 4);
}

// ── get_channel_data ────────────────────────────────────────────────

#[tokio::test]
async fn test_channel_data_drops_bad_tuples_and_records_last_reading() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 200, entity_tree()).await;
    repo.sync_channels().await.unwrap();

    Mock::given(method("GET"))
        .and(path("/middleware.php/data/c1.json"))
        .and(query_param("from", "1000"))
        .and(query_param("to", "2000"))
        .and(query_param("tuples", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "uuid": "c1",
                "from": 1000,
                "to": 2000,
                "tuples": [[1200, 5.0], [1500, "bad"], [1800, 7.0]]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = repo
        .get_channel_data("c1", DataRequest::between(1000, 2000))
        .outcome()
        .await
        .unwrap();

    assert_eq!(
        data.tuples,
        vec![DataTuple::new(1200, 5.0), DataTuple::new(1800, 7.0)]
    );
    let cached = repo.store().get("c1").unwrap();
    assert_eq!(cached.last_value, Some(7.0));
    assert_eq!(cached.last_timestamp, Some(1800));
}

#[tokio::test]
async fn test_identical_concurrent_data_requests_are_not_coalesced() {
    let (server, repo) = setup(|s| s).await;
    Mock::given(method("GET"))
        .and(path("/middleware.php/data/c1.json"))
        .and(query_param("from", "1000"))
        .and(query_param("to", "2000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "uuid": "c1", "tuples": [[1500, 1.0]] }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let (a, b) = futures_util::future::join(
        repo.get_channel_data("c1", DataRequest::between(1000, 2000))
            .outcome(),
        repo.get_channel_data("c1", DataRequest::between(1000, 2000))
            .outcome(),
    )
    .await;

    assert_eq!(a.unwrap().tuples, vec![DataTuple::new(1500, 1.0)]);
    assert_eq!(b.unwrap().tuples, vec![DataTuple::new(1500, 1.0)]);
}

#[tokio::test]
async fn test_group_data_is_rejected_without_a_request() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/entity.json", 200, entity_tree()).await;
    repo.sync_channels().await.unwrap();

    Mock::given(method("GET"))
        .and(path("/middleware.php/data/g1.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = repo
        .get_channel_data("g1", DataRequest::new())
        .outcome()
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GroupNotQueryable { .. }));
}

#[tokio::test]
async fn test_missing_data_block_is_malformed() {
    let (server, repo) = setup(|s| s).await;
    mount_json(&server, "/middleware.php/data/c9.json", 200, json!({ "version": "0.3" })).await;

    let err = repo.fetch_channel_data("c9", DataRequest::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::MalformedResponse { .. }));
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_updated_settings_apply_to_next_request() {
    let (first, repo) = setup(|s| s).await;
    mount_json(&first, "/middleware.php/entity.json", 200, entity_tree()).await;

    let second = MockServer::start().await;
    mount_json(
        &second,
        "/middleware.php/entity.json",
        200,
        json!({ "entities": [{ "uuid": "other", "type": "water" }] }),
    )
    .await;

    assert_eq!(repo.fetch_channels().await.unwrap().len(), 2);

    repo.update_settings(Settings::default().with_server_url(base_url(&second)));
    let channels = repo.fetch_channels().await.unwrap();
    assert_eq!(uuids(&channels), vec!["other"]);
}

#[tokio::test]
async fn test_invalid_server_url_is_config_error() {
    let (_server, repo) = setup(|s| s.with_server_url("::not a url::")).await;
    let err = repo.get_channels().outcome().await.unwrap_err();
    assert!(matches!(err, CoreError::Config { .. }));
}
