//! Channel command handlers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tabled::Tabled;
use vzclient_core::convert::{flatten_including_groups, flatten_leaves};
use vzclient_core::{Channel, ChannelFilter, ChannelQuery, ChannelRepository, ChannelStore};

use crate::cli::{ChannelListArgs, ChannelsArgs, ChannelsCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::settle;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Type")]
    ctype: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "✓")]
    checked: String,
    #[tabled(rename = "Last value")]
    last: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl ChannelRow {
    fn new(c: &Channel, depth: usize, color: bool) -> Self {
        let indent = match depth {
            0 => String::new(),
            n => format!("{}└ ", "  ".repeat(n - 1)),
        };
        let title = if c.is_group() {
            output::heading(&c.display_name(), color)
        } else {
            c.display_name()
        };
        Self {
            uuid: c.uuid.clone(),
            title: format!("{indent}{title}"),
            ctype: if c.is_group() {
                "group".into()
            } else {
                c.channel_type.clone()
            },
            unit: c.unit.clone(),
            checked: output::check_mark(c.checked, color),
            last: c
                .last_value
                .map_or_else(String::new, |v| output::format_value(Some(v), &c.unit)),
            updated: c
                .last_timestamp
                .map_or_else(String::new, output::format_timestamp),
        }
    }
}

fn detail(c: &Channel) -> String {
    let mut lines = vec![
        format!("UUID:        {}", c.uuid),
        format!("Title:       {}", c.display_name()),
        format!(
            "Type:        {} ({})",
            c.kind().display_name(),
            if c.channel_type.is_empty() {
                "-"
            } else {
                c.channel_type.as_str()
            }
        ),
        format!(
            "Unit:        {}",
            if c.unit.is_empty() { "-" } else { c.unit.as_str() }
        ),
        format!("Public:      {}", c.public),
        format!("Checked:     {}", c.checked),
    ];
    if let Some(ref parent) = c.parent {
        lines.push(format!("Group:       {parent}"));
    }
    if let Some(ref desc) = c.description {
        lines.push(format!("Description: {desc}"));
    }
    if let Some(resolution) = c.resolution {
        lines.push(format!("Resolution:  {resolution}"));
    }
    if let Some(cost) = c.cost {
        lines.push(format!("Cost:        {cost}"));
    }
    if let Some(ref color) = c.color {
        lines.push(format!("Color:       {color}"));
    }
    if let (Some(value), Some(ts)) = (c.last_value, c.last_timestamp) {
        lines.push(format!(
            "Last value:  {} at {}",
            output::format_value(Some(value), &c.unit),
            output::format_timestamp(ts)
        ));
    }
    if c.is_group() {
        lines.push(format!("Channels:    {}", c.children.len()));
        for child in &c.children {
            lines.push(format!("  {}  {}", child.uuid, child.display_name()));
        }
    }
    lines.join("\n")
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Overlay the cached selection flag and last reading onto a fresh channel.
fn with_local_state(store: &ChannelStore, mut channel: Channel) -> Channel {
    if let Some(cached) = store.get(&channel.uuid) {
        channel.checked = cached.checked;
        if channel.last_timestamp.is_none() {
            channel.last_value = cached.last_value;
            channel.last_timestamp = cached.last_timestamp;
        }
    }
    channel
}

fn build_query(args: &ChannelListArgs, repo: &ChannelRepository) -> ChannelQuery {
    let mut query = ChannelQuery::new().sort(args.sort.unwrap_or(repo.settings().sort_mode));
    if let Some(ref tag) = args.channel_type {
        query = query.filter(ChannelFilter::ByType(tag.clone()));
    }
    if args.checked {
        query = query.filter(ChannelFilter::Checked);
    }
    if let Some(ref needle) = args.search {
        query = query.filter(ChannelFilter::Search(needle.clone()));
    }
    if args.leaves {
        query = query.filter(ChannelFilter::ExcludeGroups);
    }
    if args.groups {
        query = query.filter(ChannelFilter::GroupsOnly);
    }
    query
}

/// Depth-first order by parent links, keeping the given sibling order.
/// Channels whose parent is not in the list are treated as roots.
fn tree_order(channels: &[Arc<Channel>]) -> Vec<(usize, Arc<Channel>)> {
    let present: HashSet<&str> = channels.iter().map(|c| c.uuid.as_str()).collect();
    let mut children: HashMap<&str, Vec<&Arc<Channel>>> = HashMap::new();
    let mut roots = Vec::new();
    for channel in channels {
        match channel.parent.as_deref() {
            Some(parent) if present.contains(parent) => {
                children.entry(parent).or_default().push(channel);
            }
            _ => roots.push(channel),
        }
    }

    let mut ordered = Vec::with_capacity(channels.len());
    let mut stack: Vec<(usize, &Arc<Channel>)> = roots.into_iter().rev().map(|c| (0, c)).collect();
    while let Some((depth, channel)) = stack.pop() {
        ordered.push((depth, Arc::clone(channel)));
        if let Some(kids) = children.get(channel.uuid.as_str()) {
            stack.extend(kids.iter().rev().map(|c| (depth + 1, *c)));
        }
    }
    ordered
}

async fn list_channels(
    repo: &ChannelRepository,
    args: &ChannelListArgs,
) -> Result<Vec<Arc<Channel>>, CliError> {
    let query = build_query(args, repo);
    if args.cached || args.checked {
        return Ok(repo.store().list(&query));
    }

    let roots = settle(repo.get_channels(), "channels").await?;
    let nodes = if args.leaves {
        flatten_leaves(&roots)
    } else {
        flatten_including_groups(&roots)
    };
    let flat: Vec<Arc<Channel>> = nodes
        .into_iter()
        .map(|c| Arc::new(with_local_state(repo.store(), c)))
        .collect();
    Ok(query.apply(&flat))
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    repo: &ChannelRepository,
    args: ChannelsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    match args.command {
        ChannelsCommand::List(list_args) => {
            let channels = list_channels(repo, &list_args).await?;
            let out = if list_args.tree && matches!(global.output, OutputFormat::Table) {
                let ordered = tree_order(&channels);
                output::render_list(
                    &global.output,
                    &ordered,
                    |(depth, c)| ChannelRow::new(c, *depth, color),
                    |(_, c)| c.uuid.clone(),
                )?
            } else {
                output::render_list(
                    &global.output,
                    &channels,
                    |c| ChannelRow::new(c, 0, color),
                    |c| c.uuid.clone(),
                )?
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ChannelsCommand::Get { uuid } => {
            let channel = settle(repo.get_channel(uuid), "channel").await?;
            let out = output::render_single(&global.output, &channel, detail, |c| c.uuid.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ChannelsCommand::Refresh => {
            let stored = settle(repo.refresh_channels(), "channels").await?;
            if !global.quiet {
                eprintln!("Cached {} channels", stored.len());
            }
            let channels = repo.store().snapshot();
            let out = output::render_list(
                &global.output,
                &channels,
                |c| ChannelRow::new(c, 0, color),
                |c| c.uuid.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ChannelsCommand::Check { uuid } => set_checked(repo, &uuid, true, global).await,
        ChannelsCommand::Uncheck { uuid } => set_checked(repo, &uuid, false, global).await,

        ChannelsCommand::Forget { uuids } => {
            let store = repo.store();
            let removed = if uuids.is_empty() {
                let n = store.len();
                store.clear();
                n
            } else {
                store.remove_many(&uuids)
            };
            persist(repo).await?;
            if !global.quiet {
                eprintln!("Removed {removed} channels from the cache");
            }
            Ok(())
        }
    }
}

async fn persist(repo: &ChannelRepository) -> Result<(), CliError> {
    repo.store()
        .persist()
        .await
        .map_err(|e| CliError::Cache(e.to_string()))
}

async fn set_checked(
    repo: &ChannelRepository,
    uuid: &str,
    checked: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !repo.store().set_checked(uuid, checked) {
        return Err(CliError::NotCached { uuid: uuid.into() });
    }
    persist(repo).await?;
    if !global.quiet {
        let state = if checked { "selected" } else { "deselected" };
        eprintln!("Channel {uuid} {state}");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn channel(uuid: &str, parent: Option<&str>) -> Arc<Channel> {
        let mut c = Channel::new(uuid);
        c.parent = parent.map(str::to_owned);
        Arc::new(c)
    }

    #[test]
    fn tree_order_nests_children_under_parents() {
        let channels = vec![
            channel("a", None),
            channel("a1", Some("a")),
            channel("b", None),
            channel("a2", Some("a")),
            channel("a1x", Some("a1")),
        ];
        let order: Vec<_> = tree_order(&channels)
            .into_iter()
            .map(|(d, c)| (d, c.uuid.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, "a".to_owned()),
                (1, "a1".to_owned()),
                (2, "a1x".to_owned()),
                (1, "a2".to_owned()),
                (0, "b".to_owned()),
            ]
        );
    }

    #[test]
    fn orphans_become_roots() {
        let channels = vec![channel("x", Some("missing")), channel("y", None)];
        let order = tree_order(&channels);
        assert!(order.iter().all(|(d, _)| *d == 0));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn local_state_overlays_fresh_metadata() {
        let store = ChannelStore::in_memory();
        let mut cached = Channel::new("c1").with_last_reading(3.0, 100);
        cached.checked = false;
        store.replace_all(vec![cached]);

        let fresh = with_local_state(&store, Channel::new("c1"));
        assert!(!fresh.checked);
        assert_eq!(fresh.last_value, Some(3.0));

        let unknown = with_local_state(&store, Channel::new("c2"));
        assert!(unknown.checked);
    }

    #[test]
    fn group_rows_show_group_type_and_indent() {
        let mut group = Channel::new("g1");
        group.group = true;
        group.title = "Haus".into();
        group.channel_type = "group".into();
        let row = ChannelRow::new(&group, 0, false);
        assert_eq!(row.ctype, "group");
        assert_eq!(row.title, "Haus");

        let leaf = ChannelRow::new(&Channel::new("c1"), 2, false);
        assert_eq!(leaf.title, "  └ Channel c1");
        assert_eq!(leaf.checked, "✓");
    }
}
