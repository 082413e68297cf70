// ── Channel domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A single measurable data source (meter, sensor) or a group of them.
///
/// A channel with children, or one flagged as a group after flattening,
/// carries no measurements of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    /// Free-form type tag as sent by the server (`"power"`, `"electric meter"`, ...).
    #[serde(rename = "type", default)]
    pub channel_type: String,
    /// Unit of the channel's values; derived from the type when the server omits it.
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub color: Option<String>,
    /// Cost per unit.
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub resolution: Option<f64>,
    /// Set for groups; survives flattening, when `children` is emptied.
    #[serde(default)]
    pub group: bool,
    /// UUID of the enclosing group in the entity tree, if any.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Channel>,

    // Local state, never sent by the server.
    #[serde(default)]
    pub last_value: Option<f64>,
    /// Epoch milliseconds of `last_value`.
    #[serde(default)]
    pub last_timestamp: Option<i64>,
    /// User selection: which channels are displayed and queried.
    #[serde(default = "default_checked")]
    pub checked: bool,
}

fn default_checked() -> bool {
    true
}

impl Channel {
    /// A bare channel with only an identity; every other field is empty.
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            title: String::new(),
            channel_type: String::new(),
            unit: String::new(),
            color: None,
            cost: None,
            description: None,
            public: false,
            resolution: None,
            group: false,
            parent: None,
            children: Vec::new(),
            last_value: None,
            last_timestamp: None,
            checked: true,
        }
    }

    pub fn is_group(&self) -> bool {
        self.group || !self.children.is_empty()
    }

    /// Title, or `"Channel <uuid>"` when the server sent none.
    pub fn display_name(&self) -> String {
        if self.title.trim().is_empty() {
            format!("Channel {}", self.uuid)
        } else {
            self.title.clone()
        }
    }

    /// Well-known classification of [`Self::channel_type`].
    pub fn kind(&self) -> ChannelType {
        ChannelType::from_tag(&self.channel_type)
    }

    pub fn is_sensor(&self) -> bool {
        self.channel_type.to_lowercase().contains("sensor")
    }

    pub fn is_meter(&self) -> bool {
        let tag = self.channel_type.to_lowercase();
        tag.contains("meter") || tag.contains("counter")
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp.and_then(DateTime::from_timestamp_millis)
    }

    /// Copy with the last reading replaced.
    pub fn with_last_reading(mut self, value: f64, timestamp: i64) -> Self {
        self.last_value = Some(value);
        self.last_timestamp = Some(timestamp);
        self
    }

    /// Case-insensitive match against title, UUID, type and description.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            Some(self.title.as_str()),
            Some(self.uuid.as_str()),
            Some(self.channel_type.as_str()),
            self.description.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

// ── ChannelType ──────────────────────────────────────────────────────

/// Channel types known to the middleware's entity definitions.
///
/// Parsing is case-insensitive; unrecognized tags become [`ChannelType::Unknown`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[strum(serialize = "power")]
    Power,
    #[strum(serialize = "electric meter")]
    #[serde(rename = "electric meter")]
    ElectricMeter,
    #[strum(serialize = "gas")]
    Gas,
    #[strum(serialize = "heat")]
    Heat,
    #[strum(serialize = "water")]
    Water,
    #[strum(serialize = "temperature")]
    Temperature,
    #[strum(serialize = "pressure")]
    Pressure,
    #[strum(serialize = "humidity")]
    Humidity,
    #[strum(serialize = "windspeed")]
    Windspeed,
    #[strum(serialize = "radiation")]
    Radiation,
    #[strum(serialize = "luminosity")]
    Luminosity,
    #[strum(serialize = "workinghours")]
    WorkingHours,
    #[strum(serialize = "valve")]
    Valve,
    #[strum(serialize = "flowrate")]
    FlowRate,
    #[strum(serialize = "voltage")]
    Voltage,
    #[strum(serialize = "current")]
    Current,
    #[strum(serialize = "frequency")]
    Frequency,
    #[strum(serialize = "fillinglevel")]
    FillingLevel,
    #[strum(serialize = "unknown")]
    Unknown,
}

impl ChannelType {
    pub fn from_tag(tag: &str) -> Self {
        tag.trim().parse().unwrap_or(Self::Unknown)
    }

    /// Human-readable label.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Power => "Power",
            Self::ElectricMeter => "Electric meter",
            Self::Gas => "Gas",
            Self::Heat => "Heat",
            Self::Water => "Water",
            Self::Temperature => "Temperature",
            Self::Pressure => "Pressure",
            Self::Humidity => "Humidity",
            Self::Windspeed => "Wind speed",
            Self::Radiation => "Radiation",
            Self::Luminosity => "Luminosity",
            Self::WorkingHours => "Working hours",
            Self::Valve => "Valve",
            Self::FlowRate => "Flow rate",
            Self::Voltage => "Voltage",
            Self::Current => "Current",
            Self::Frequency => "Frequency",
            Self::FillingLevel => "Filling level",
            Self::Unknown => "Unknown",
        }
    }
}
