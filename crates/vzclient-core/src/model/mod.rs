// ── Domain model ──
//
// Canonical representation of Volkszaehler channels and measurement
// windows, independent of which wire shape they arrived in.

pub mod channel;
pub mod data;

pub use channel::{Channel, ChannelType};
pub use data::{ChannelData, DataTuple, Statistics, TimeRange};
