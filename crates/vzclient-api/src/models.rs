// Middleware response types
//
// The same server family answers with several shapes for "a channel":
// `entity.json` returns `{"entities": [...]}` with nested `children`,
// `entity/{uuid}.json` returns `{"entity": {...}}`, and the older
// `channel.json` returns a flat `{"channels": [...]}` list. All fields are
// optional and numeric properties are decoded leniently because the
// middleware is inconsistent about presence and representation across
// versions.

use serde::{Deserialize, Deserializer, Serialize};

// ── Lenient numeric decoding ─────────────────────────────────────────

/// Accept a JSON number or a numeric string; anything else becomes `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(value_as_f64))
}

/// Like [`lenient_f64`], truncating to whole milliseconds.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Numeric view of a JSON value: numbers as-is, numeric strings parsed.
pub fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ── Entity envelopes ─────────────────────────────────────────────────

/// One object or a list of them (`"entity"` is either, depending on endpoint).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(Box<T>),
    Many(Vec<T>),
}

/// Top-level body of every entity/channel endpoint.
#[derive(Debug, Deserialize)]
pub struct EntityEnvelope {
    #[serde(default)]
    pub version: Option<String>,
    /// `GET /entity.json`: public entity hierarchy.
    #[serde(default)]
    pub entities: Option<Vec<EntityDto>>,
    /// `GET /entity/{uuid}.json`: a single entity (older servers send a list).
    #[serde(default)]
    pub entity: Option<OneOrMany<EntityDto>>,
    /// `GET /channel.json`: legacy flat channel list.
    #[serde(default)]
    pub channels: Option<Vec<LegacyChannelDto>>,
}

/// The wire shape an [`EntityEnvelope`] actually carried.
#[derive(Debug, Clone)]
pub enum EntityPayload {
    /// Entity hierarchy; groups carry `children`.
    Tree(Vec<EntityDto>),
    /// A single entity (possibly a group with children).
    Single(Box<EntityDto>),
    /// Flat legacy channel list without hierarchy.
    Flat(Vec<LegacyChannelDto>),
    /// Well-formed envelope with none of the known payload keys.
    Empty,
}

impl EntityEnvelope {
    /// Classify the envelope by the payload key it carries.
    pub fn into_payload(self) -> EntityPayload {
        if let Some(entities) = self.entities {
            return EntityPayload::Tree(entities);
        }
        match self.entity {
            Some(OneOrMany::One(entity)) => EntityPayload::Single(entity),
            Some(OneOrMany::Many(list)) => EntityPayload::Tree(list),
            None => self
                .channels
                .map_or(EntityPayload::Empty, EntityPayload::Flat),
        }
    }
}

// ── Entity ───────────────────────────────────────────────────────────

/// Channel or group as returned by the entity endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDto {
    pub uuid: String,
    #[serde(default, rename = "type")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub resolution: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cost: Option<f64>,
    #[serde(default, rename = "initialconsumption", deserialize_with = "lenient_f64")]
    pub initial_consumption: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<EntityDto>>,
    /// Catch-all for undocumented properties.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Legacy channel ───────────────────────────────────────────────────

/// Entry of the flat `channel.json` list.
///
/// Depending on server version, properties sit at top level or inside a
/// nested `properties` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyChannelDto {
    pub uuid: String,
    #[serde(default, rename = "type")]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cost: Option<f64>,
    #[serde(default)]
    pub properties: Option<PropertiesDto>,
}

/// Nested property block of a legacy channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertiesDto {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub resolution: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cost: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, rename = "initialvalue", deserialize_with = "lenient_f64")]
    pub initial_value: Option<f64>,
}

// ── Data ─────────────────────────────────────────────────────────────

/// Body of `GET /data/{uuid}.json`.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub data: Option<DataDto>,
}

/// Time-series window for one channel.
///
/// Tuples and min/max stay raw JSON so a single malformed sample can be
/// dropped without failing the whole response.
#[derive(Debug, Clone, Deserialize)]
pub struct DataDto {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub from: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub to: Option<i64>,
    /// `[timestamp, value, count]`
    #[serde(default)]
    pub min: Option<serde_json::Value>,
    /// `[timestamp, value, count]`
    #[serde(default)]
    pub max: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub consumption: Option<f64>,
    #[serde(default)]
    pub rows: Option<u64>,
    /// `[[timestamp, value, count], ...]`
    #[serde(default)]
    pub tuples: Option<Vec<serde_json::Value>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(value: serde_json::Value) -> EntityEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn entities_key_is_a_tree() {
        let env = envelope(json!({
            "version": "0.3",
            "entities": [{ "uuid": "g1", "type": "group", "children": [{ "uuid": "c1" }] }]
        }));
        match env.into_payload() {
            EntityPayload::Tree(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].children.as_ref().unwrap()[0].uuid, "c1");
            }
            other => panic!("expected tree, got {other:?}"),
        }
    }

    #[test]
    fn entity_object_is_single_and_list_is_tree() {
        let single = envelope(json!({ "entity": { "uuid": "c1", "type": "power" } }));
        assert!(matches!(single.into_payload(), EntityPayload::Single(e) if e.uuid == "c1"));

        let list = envelope(json!({ "entity": [{ "uuid": "c1" }, { "uuid": "c2" }] }));
        assert!(matches!(list.into_payload(), EntityPayload::Tree(l) if l.len() == 2));
    }

    #[test]
    fn channels_key_is_flat_and_missing_keys_are_empty() {
        let flat = envelope(json!({ "channels": [{ "uuid": "c1", "properties": { "unit": "W" } }] }));
        assert!(matches!(flat.into_payload(), EntityPayload::Flat(l) if l.len() == 1));

        let empty = envelope(json!({ "version": "0.3" }));
        assert!(matches!(empty.into_payload(), EntityPayload::Empty));
    }

    #[test]
    fn numeric_properties_accept_strings_and_ignore_garbage() {
        let dto: EntityDto = serde_json::from_value(json!({
            "uuid": "c1",
            "cost": "0.00028",
            "resolution": 2000,
            "initialconsumption": "n/a",
            "gap": 5
        }))
        .unwrap();
        assert_eq!(dto.cost, Some(0.000_28));
        assert_eq!(dto.resolution, Some(2000.0));
        assert_eq!(dto.initial_consumption, None);
        assert_eq!(dto.extra.get("gap"), Some(&json!(5)));
    }

    #[test]
    fn data_keeps_malformed_tuples_raw() {
        let env: DataEnvelope = serde_json::from_value(json!({
            "data": {
                "uuid": "c1",
                "from": 1000,
                "to": 2000.0,
                "tuples": [[1200, 5.0, 1], "bad", [1500]]
            }
        }))
        .unwrap();
        let data = env.data.unwrap();
        assert_eq!(data.from, Some(1000));
        assert_eq!(data.to, Some(2000));
        assert_eq!(data.tuples.unwrap().len(), 3);
    }
}
