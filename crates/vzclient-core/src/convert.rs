// ── Wire-to-domain conversions ──
//
// Collapses the middleware's three shapes for "a channel" (entity tree,
// single entity, legacy flat list) into `Channel`, and raw data windows
// into `ChannelData`. Everything here is pure; malformed numeric input
// drops the affected field or tuple, never the whole response.

use serde_json::Value;
use tracing::debug;

use vzclient_api::models::value_as_f64;
use vzclient_api::{DataDto, EntityDto, EntityPayload, LegacyChannelDto};

use crate::model::{Channel, ChannelData, DataTuple};

// ── Units ──────────────────────────────────────────────────────────

/// Unit for a channel type tag. Total: unknown tags map to `""`.
pub fn derive_unit(channel_type: &str) -> &'static str {
    match channel_type.trim().to_lowercase().as_str() {
        "temperature" => "°C",
        "humidity" | "filllevel" => "%",
        "power" | "powersensor" => "W",
        "electric meter" | "heattotal" => "kWh",
        "gas" | "gas meter" => "m³",
        "voltage" => "V",
        "current" => "A",
        "watertotal" => "L",
        "windspeed" => "km/h",
        "workinghours" | "workinghourssensor" => "h",
        _ => "",
    }
}

/// Wire unit if present and non-blank, otherwise derived from the type.
fn resolve_unit(wire: Option<&str>, channel_type: &str) -> String {
    match wire.map(str::trim) {
        Some(unit) if !unit.is_empty() => unit.to_owned(),
        _ => derive_unit(channel_type).to_owned(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ── Channels ───────────────────────────────────────────────────────

/// Map an entity (and, recursively, its children) to a [`Channel`].
pub fn channel_from_entity(dto: EntityDto) -> Channel {
    let channel_type = dto.entity_type.unwrap_or_default();
    let unit = resolve_unit(dto.unit.as_deref(), &channel_type);
    let children: Vec<Channel> = dto
        .children
        .unwrap_or_default()
        .into_iter()
        .map(channel_from_entity)
        .map(|mut child| {
            child.parent = Some(dto.uuid.clone());
            child
        })
        .collect();

    Channel {
        title: dto.title.unwrap_or_default(),
        channel_type,
        unit,
        color: non_blank(dto.color),
        cost: dto.cost,
        description: non_blank(dto.description),
        public: dto.public.unwrap_or(false),
        resolution: dto.resolution,
        group: !children.is_empty(),
        children,
        ..Channel::new(dto.uuid)
    }
}

/// Map an entry of the legacy flat channel list. Properties may sit at the
/// top level or in a nested `properties` object; top-level values win.
pub fn channel_from_legacy(dto: LegacyChannelDto) -> Channel {
    let props = dto.properties.unwrap_or_default();
    let channel_type = dto.channel_type.unwrap_or_else(|| "unknown".into());
    let wire_unit = dto.unit.or(props.unit);
    let unit = resolve_unit(wire_unit.as_deref(), &channel_type);

    Channel {
        title: dto.title.unwrap_or_default(),
        channel_type,
        unit,
        color: non_blank(dto.color),
        cost: dto.cost.or(props.cost),
        description: non_blank(dto.description),
        public: dto.public.unwrap_or(false),
        resolution: props.resolution,
        ..Channel::new(dto.uuid)
    }
}

/// Top-level channels of a response, hierarchy preserved.
pub fn channels_from_payload(payload: EntityPayload) -> Vec<Channel> {
    match payload {
        EntityPayload::Tree(list) => list.into_iter().map(channel_from_entity).collect(),
        EntityPayload::Single(entity) => vec![channel_from_entity(*entity)],
        EntityPayload::Flat(list) => list.into_iter().map(channel_from_legacy).collect(),
        EntityPayload::Empty => Vec::new(),
    }
}

// ── Flattening ─────────────────────────────────────────────────────

/// Leaf channels only, in depth-first order. Groups are traversed but not
/// emitted.
pub fn flatten_leaves(roots: &[Channel]) -> Vec<Channel> {
    let mut out = Vec::new();
    walk(roots, &mut |ch| {
        if !ch.is_group() {
            out.push(detached(ch));
        }
    });
    out
}

/// Every node exactly once, each group before its children. Emitted nodes
/// have `children` emptied; groups keep their `group` flag and children
/// keep their `parent`.
pub fn flatten_including_groups(roots: &[Channel]) -> Vec<Channel> {
    let mut out = Vec::new();
    walk(roots, &mut |ch| out.push(detached(ch)));
    out
}

fn walk<'a>(nodes: &'a [Channel], visit: &mut impl FnMut(&'a Channel)) {
    for node in nodes {
        visit(node);
        walk(&node.children, visit);
    }
}

fn detached(ch: &Channel) -> Channel {
    Channel {
        group: ch.is_group(),
        children: Vec::new(),
        ..ch.clone()
    }
}

// ── Data ───────────────────────────────────────────────────────────

/// Parse a wire tuple `[timestamp, value, ...]`.
///
/// Returns `None` when there are fewer than two elements or either of the
/// first two is not a JSON number.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn parse_tuple(raw: &Value) -> Option<DataTuple> {
    let items = raw.as_array()?;
    let timestamp = items.first()?.as_f64()?;
    let value = items.get(1)?.as_f64()?;
    Some(DataTuple::new(timestamp as i64, value))
}

/// Value of a min/max entry, which the server sends as `[timestamp, value, count]`.
fn statistic_value(raw: Option<&Value>) -> Option<f64> {
    match raw? {
        Value::Array(items) => items.get(1).and_then(value_as_f64),
        other => value_as_f64(other),
    }
}

/// Build a [`ChannelData`] window.
///
/// `requested` fills in the UUID and bounds when the server omits them.
pub fn channel_data_from_dto(
    dto: DataDto,
    uuid: &str,
    requested: (Option<i64>, Option<i64>),
) -> ChannelData {
    let raw = dto.tuples.unwrap_or_default();
    let tuples: Vec<DataTuple> = raw.iter().filter_map(parse_tuple).collect();
    let dropped = raw.len() - tuples.len();
    if dropped > 0 {
        debug!(uuid, dropped, "dropped malformed tuples");
    }

    let from = dto
        .from
        .or(requested.0)
        .or_else(|| tuples.first().map(|t| t.timestamp))
        .unwrap_or(0);
    let to = dto
        .to
        .or(requested.1)
        .or_else(|| tuples.last().map(|t| t.timestamp))
        .unwrap_or(from);

    ChannelData {
        uuid: non_blank(dto.uuid).unwrap_or_else(|| uuid.to_owned()),
        from,
        to,
        min: statistic_value(dto.min.as_ref()),
        max: statistic_value(dto.max.as_ref()),
        average: dto.average,
        consumption: dto.consumption,
        rows: dto.rows,
        tuples,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use vzclient_api::EntityEnvelope;

    use super::*;

    fn payload(value: Value) -> EntityPayload {
        serde_json::from_value::<EntityEnvelope>(value)
            .unwrap()
            .into_payload()
    }

    fn uuids(channels: &[Channel]) -> Vec<&str> {
        channels.iter().map(|c| c.uuid.as_str()).collect()
    }

    #[test]
    fn unit_table_is_total() {
        assert_eq!(derive_unit("power"), "W");
        assert_eq!(derive_unit("gas"), "m³");
        assert_eq!(derive_unit("Temperature"), "°C");
        assert_eq!(derive_unit("electric meter"), "kWh");
        assert_eq!(derive_unit("workinghourssensor"), "h");
        assert_eq!(derive_unit("universalsensor"), "");
        assert_eq!(derive_unit("unknown-type-xyz"), "");
        assert_eq!(derive_unit(""), "");
    }

    #[test]
    fn wire_unit_wins_over_derived() {
        let ch = channel_from_entity(
            serde_json::from_value(json!({ "uuid": "c1", "type": "power", "unit": "kW" })).unwrap(),
        );
        assert_eq!(ch.unit, "kW");

        let ch = channel_from_entity(
            serde_json::from_value(json!({ "uuid": "c1", "type": "power", "unit": " " })).unwrap(),
        );
        assert_eq!(ch.unit, "W");
    }

    #[test]
    fn leaf_flattening_excludes_groups() {
        let roots = channels_from_payload(payload(json!({
            "entities": [{
                "uuid": "g1",
                "type": "group",
                "children": [{ "uuid": "c1", "type": "power", "children": [] }]
            }]
        })));

        let leaves = flatten_leaves(&roots);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].uuid, "c1");
        assert_eq!(leaves[0].unit, "W");
        assert_eq!(leaves[0].parent.as_deref(), Some("g1"));
    }

    #[test]
    fn full_flattening_emits_every_node_once() {
        let roots = channels_from_payload(payload(json!({
            "entities": [
                {
                    "uuid": "g1",
                    "children": [
                        { "uuid": "c1" },
                        { "uuid": "g2", "children": [{ "uuid": "c2" }, { "uuid": "c3" }] }
                    ]
                },
                { "uuid": "c4" }
            ]
        })));

        let all = flatten_including_groups(&roots);
        assert_eq!(uuids(&all), vec!["g1", "c1", "g2", "c2", "c3", "c4"]);
        assert!(all.iter().all(|c| c.children.is_empty()));
        let groups: Vec<_> = all.iter().filter(|c| c.is_group()).map(|c| c.uuid.as_str()).collect();
        assert_eq!(groups, vec!["g1", "g2"]);

        let leaves = flatten_leaves(&roots);
        assert_eq!(uuids(&leaves), vec!["c1", "c2", "c3", "c4"]);
    }

    #[test]
    fn single_entity_payload_is_one_channel() {
        let roots = channels_from_payload(payload(json!({
            "entity": { "uuid": "c1", "type": "gas", "title": "Gas", "public": false }
        })));
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].unit, "m³");
        assert!(!roots[0].public);
        assert!(!roots[0].is_group());
    }

    #[test]
    fn legacy_channels_read_nested_properties() {
        let roots = channels_from_payload(payload(json!({
            "channels": [
                { "uuid": "c1", "type": "temperature", "properties": { "resolution": "10", "cost": 0.2 } },
                { "uuid": "c2", "cost": 0.3, "properties": { "cost": 0.2, "unit": "kWh" } }
            ]
        })));
        assert_eq!(roots[0].unit, "°C");
        assert_eq!(roots[0].resolution, Some(10.0));
        assert_eq!(roots[0].cost, Some(0.2));
        assert_eq!(roots[1].channel_type, "unknown");
        assert_eq!(roots[1].unit, "kWh");
        assert_eq!(roots[1].cost, Some(0.3));
    }

    #[test]
    fn tuples_need_two_numbers() {
        assert_eq!(parse_tuple(&json!([1200, 5.0])), Some(DataTuple::new(1200, 5.0)));
        assert_eq!(parse_tuple(&json!([1200, 5.5, 3])), Some(DataTuple::new(1200, 5.5)));
        assert_eq!(parse_tuple(&json!([1200.9, 1])), Some(DataTuple::new(1200, 1.0)));
        assert_eq!(parse_tuple(&json!([1200])), None);
        assert_eq!(parse_tuple(&json!([])), None);
        assert_eq!(parse_tuple(&json!([1500, "bad"])), None);
        assert_eq!(parse_tuple(&json!(["1500", 1.0])), None);
        assert_eq!(parse_tuple(&json!([1500, null])), None);
        assert_eq!(parse_tuple(&json!({ "t": 1 })), None);
    }

    #[test]
    fn malformed_tuples_are_dropped_not_fatal() {
        let dto: DataDto = serde_json::from_value(json!({
            "uuid": "c1",
            "from": 1000,
            "to": 2000,
            "min": [1200, 5.0, 1],
            "max": [1800, 7.0, 1],
            "tuples": [[1200, 5.0], [1500, "bad"], [1800, 7.0]]
        }))
        .unwrap();

        let data = channel_data_from_dto(dto, "c1", (Some(1000), Some(2000)));
        assert_eq!(
            data.tuples,
            vec![DataTuple::new(1200, 5.0), DataTuple::new(1800, 7.0)]
        );
        assert_eq!((data.from, data.to), (1000, 2000));
        assert_eq!(data.min, Some(5.0));
        assert_eq!(data.max, Some(7.0));
    }

    #[test]
    fn missing_bounds_fall_back_to_request_then_tuples() {
        let dto: DataDto = serde_json::from_value(json!({
            "tuples": [[1200, 5.0], [1800, 7.0]]
        }))
        .unwrap();
        let data = channel_data_from_dto(dto.clone(), "c9", (None, Some(5000)));
        assert_eq!(data.uuid, "c9");
        assert_eq!((data.from, data.to), (1200, 5000));

        let data = channel_data_from_dto(dto, "c9", (None, None));
        assert_eq!((data.from, data.to), (1200, 1800));
    }
}
