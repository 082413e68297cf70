// ── Filter and sort predicates for channel listings ──
//
// Applied to store snapshots without touching the network.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::model::Channel;
use crate::settings::SortMode;

/// Filter predicate for channel listings.
pub enum ChannelFilter {
    All,
    /// Case-insensitive match on the type tag.
    ByType(String),
    Checked,
    /// Leaf channels only.
    ExcludeGroups,
    GroupsOnly,
    /// Case-insensitive substring of title, UUID, type or description.
    Search(String),
    Custom(Box<dyn Fn(&Channel) -> bool + Send + Sync>),
}

impl ChannelFilter {
    pub fn matches(&self, channel: &Channel) -> bool {
        match self {
            Self::All => true,
            Self::ByType(tag) => channel.channel_type.eq_ignore_ascii_case(tag.trim()),
            Self::Checked => channel.checked,
            Self::ExcludeGroups => !channel.is_group(),
            Self::GroupsOnly => channel.is_group(),
            Self::Search(needle) => channel.matches_text(needle),
            Self::Custom(f) => f(channel),
        }
    }
}

/// A listing request: every filter must match, results in `sort` order.
#[derive(Default)]
pub struct ChannelQuery {
    pub filters: Vec<ChannelFilter>,
    pub sort: SortMode,
}

impl ChannelQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: ChannelFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    pub fn matches(&self, channel: &Channel) -> bool {
        self.filters.iter().all(|f| f.matches(channel))
    }

    pub fn apply(&self, channels: &[Arc<Channel>]) -> Vec<Arc<Channel>> {
        let mut out: Vec<Arc<Channel>> = channels
            .iter()
            .filter(|c| self.matches(c))
            .cloned()
            .collect();
        out.sort_by(|a, b| compare(self.sort, a, b));
        out
    }
}

fn by_title(a: &Channel, b: &Channel) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.uuid.cmp(&b.uuid))
}

pub(crate) fn compare(sort: SortMode, a: &Channel, b: &Channel) -> Ordering {
    match sort {
        SortMode::Title => by_title(a, b),
        SortMode::Groups => b.is_group().cmp(&a.is_group()).then_with(|| by_title(a, b)),
        SortMode::Type => a
            .channel_type
            .to_lowercase()
            .cmp(&b.channel_type.to_lowercase())
            .then_with(|| by_title(a, b)),
        SortMode::LastUpdate => b
            .last_timestamp
            .unwrap_or(0)
            .cmp(&a.last_timestamp.unwrap_or(0))
            .then_with(|| by_title(a, b)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn channel(uuid: &str, title: &str, ty: &str) -> Arc<Channel> {
        let mut ch = Channel::new(uuid);
        ch.title = title.into();
        ch.channel_type = ty.into();
        Arc::new(ch)
    }

    fn uuids(list: &[Arc<Channel>]) -> Vec<&str> {
        list.iter().map(|c| c.uuid.as_str()).collect()
    }

    #[test]
    fn filters_combine_with_and() {
        let mut unchecked = (*channel("c3", "Boiler", "power")).clone();
        unchecked.checked = false;
        let list = vec![
            channel("c1", "Fridge", "power"),
            channel("c2", "Outside", "temperature"),
            Arc::new(unchecked),
        ];

        let q = ChannelQuery::new()
            .filter(ChannelFilter::ByType("POWER".into()))
            .filter(ChannelFilter::Checked);
        assert_eq!(uuids(&q.apply(&list)), vec!["c1"]);
    }

    #[test]
    fn groups_sort_first_then_title() {
        let mut group = (*channel("g1", "Zone", "group")).clone();
        group.group = true;
        let list = vec![
            channel("c1", "b-meter", "power"),
            Arc::new(group),
            channel("c2", "A-meter", "gas"),
        ];

        let sorted = ChannelQuery::new().sort(SortMode::Groups).apply(&list);
        assert_eq!(uuids(&sorted), vec!["g1", "c2", "c1"]);

        let leaves = ChannelQuery::new()
            .filter(ChannelFilter::ExcludeGroups)
            .sort(SortMode::Type)
            .apply(&list);
        assert_eq!(uuids(&leaves), vec!["c2", "c1"]);
    }

    #[test]
    fn last_update_sorts_newest_first() {
        let mut old = (*channel("c1", "a", "power")).clone();
        old.last_timestamp = Some(100);
        let mut new = (*channel("c2", "b", "power")).clone();
        new.last_timestamp = Some(200);
        let list = vec![channel("c3", "c", "power"), Arc::new(old), Arc::new(new)];

        let sorted = ChannelQuery::new().sort(SortMode::LastUpdate).apply(&list);
        assert_eq!(uuids(&sorted), vec!["c2", "c1", "c3"]);
    }
}
