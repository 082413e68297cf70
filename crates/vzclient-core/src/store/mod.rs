// ── Local channel cache ──
//
// Concurrent channel storage with push-based change notification and
// optional write-through to a JSON file.

mod channel_store;
mod query;

pub use channel_store::ChannelStore;
pub use query::{ChannelFilter, ChannelQuery};
