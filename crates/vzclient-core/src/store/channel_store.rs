// ── Channel store ──
//
// UUID-keyed channel cache. Reads are lock-free `DashMap` lookups or a
// cheap `Arc` clone of the current snapshot. Mutations are serialized,
// stay in memory and rebuild the snapshot that subscribers receive; they
// only mark a file-backed store dirty. `persist` writes the file on the
// blocking pool, `flush` writes it from the calling thread.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use super::query::{ChannelQuery, compare};
use crate::error::CoreError;
use crate::model::Channel;
use crate::settings::SortMode;
use crate::stream::ChannelStream;

type Snapshot = Arc<Vec<Arc<Channel>>>;

/// Local cache of the last known channel set.
///
/// UUID is the only identity. Local state (the `checked` flag and the last
/// reading) survives both metadata upserts and wholesale replacement for
/// channels that are still present.
pub struct ChannelStore {
    by_uuid: DashMap<String, Arc<Channel>>,
    /// Title-ordered snapshot, rebuilt on every mutation.
    snapshot: watch::Sender<Snapshot>,
    path: Option<PathBuf>,
    /// Serializes read-modify-write mutations.
    writer: Mutex<()>,
    /// Serializes file writes; held while the snapshot is taken.
    file: Mutex<()>,
    /// Set by every mutation, cleared by a write.
    dirty: AtomicBool,
}

impl ChannelStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_path(None)
    }

    /// A store backed by the JSON file at `path`. A missing file is an
    /// empty store; an unreadable or corrupt one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let store = Self::with_path(Some(path.clone()));

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(storage_error(&path, &e)),
        };
        let channels: Vec<Channel> =
            serde_json::from_slice(&bytes).map_err(|e| storage_error(&path, &e))?;
        debug!(path = %path.display(), count = channels.len(), "loaded channel cache");

        for channel in channels {
            store
                .by_uuid
                .insert(channel.uuid.clone(), Arc::new(channel));
        }
        store.rebuild_snapshot();
        Ok(store)
    }

    fn with_path(path: Option<PathBuf>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_uuid: DashMap::new(),
            snapshot,
            path,
            writer: Mutex::new(()),
            file: Mutex::new(()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, uuid: &str) -> Option<Arc<Channel>> {
        self.by_uuid.get(uuid).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.by_uuid.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }

    /// All channels ordered by title (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn list(&self, query: &ChannelQuery) -> Vec<Arc<Channel>> {
        query.apply(&self.snapshot())
    }

    pub fn subscribe(&self) -> ChannelStream {
        ChannelStream::new(self.snapshot.subscribe())
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Replace the whole set. Channels absent from `channels` are removed;
    /// surviving UUIDs keep their local state.
    pub fn replace_all(&self, channels: Vec<Channel>) {
        let _guard = self.lock();

        let mut keep = HashSet::with_capacity(channels.len());
        for channel in channels {
            let merged = self.with_local_state(channel);
            keep.insert(merged.uuid.clone());
            self.by_uuid.insert(merged.uuid.clone(), Arc::new(merged));
        }
        self.by_uuid.retain(|uuid, _| keep.contains(uuid));

        self.commit();
    }

    /// Insert or update one channel's server metadata. Returns `true` if
    /// the UUID was new.
    pub fn upsert_metadata(&self, channel: Channel) -> bool {
        self.upsert_many(vec![channel]) == 1
    }

    /// Insert or update several channels in one mutation. A channel that
    /// arrives without a parent keeps the one already stored. Returns how
    /// many UUIDs were new.
    pub fn upsert_many(&self, channels: Vec<Channel>) -> usize {
        if channels.is_empty() {
            return 0;
        }
        let _guard = self.lock();
        let mut added = 0;
        for channel in channels {
            let mut merged = self.with_local_state(channel);
            if merged.parent.is_none() {
                merged.parent = self.get(&merged.uuid).and_then(|c| c.parent.clone());
            }
            if self
                .by_uuid
                .insert(merged.uuid.clone(), Arc::new(merged))
                .is_none()
            {
                added += 1;
            }
        }
        self.commit();
        added
    }

    /// Returns `false` if the UUID is unknown.
    pub fn set_checked(&self, uuid: &str, checked: bool) -> bool {
        self.modify(uuid, |ch| ch.checked = checked)
    }

    /// Record a reading. Older readings than the stored one are ignored so
    /// concurrent data fetches cannot move the value backwards. Returns
    /// `false` if the UUID is unknown.
    pub fn update_last_reading(&self, uuid: &str, value: f64, timestamp: i64) -> bool {
        self.modify(uuid, |ch| {
            if ch.last_timestamp.is_none_or(|current| timestamp >= current) {
                ch.last_value = Some(value);
                ch.last_timestamp = Some(timestamp);
            }
        })
    }

    pub fn remove(&self, uuid: &str) -> Option<Arc<Channel>> {
        let _guard = self.lock();
        let removed = self.by_uuid.remove(uuid).map(|(_, ch)| ch);
        if removed.is_some() {
            self.commit();
        }
        removed
    }

    /// Remove every listed UUID. Returns how many were present.
    pub fn remove_many<S: AsRef<str>>(&self, uuids: &[S]) -> usize {
        let _guard = self.lock();
        let removed = uuids
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|uuid| self.by_uuid.remove(*uuid).is_some())
            .count();
        if removed > 0 {
            self.commit();
        }
        removed
    }

    pub fn clear(&self) {
        let _guard = self.lock();
        self.by_uuid.clear();
        self.commit();
    }

    /// `true` if there are mutations not yet written to the backing file.
    pub fn is_dirty(&self) -> bool {
        self.path.is_some() && self.dirty.load(Ordering::Acquire)
    }

    /// Write the current snapshot to the backing file, if any, from the
    /// calling thread.
    pub fn flush(&self) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        self.dirty.store(false, Ordering::Release);
        let snapshot = self.snapshot();
        write_file(path, &snapshot).inspect_err(|_| self.dirty.store(true, Ordering::Release))
    }

    /// Write pending mutations on tokio's blocking pool. A clean or
    /// in-memory store returns immediately.
    pub async fn persist(self: &Arc<Self>) -> Result<(), CoreError> {
        if !self.is_dirty() {
            return Ok(());
        }
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.flush())
            .await
            .map_err(|e| CoreError::Internal(format!("cache writer panicked: {e}")))?
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn modify(&self, uuid: &str, f: impl FnOnce(&mut Channel)) -> bool {
        let _guard = self.lock();
        let Some(mut entry) = self.by_uuid.get_mut(uuid) else {
            return false;
        };
        f(Arc::make_mut(entry.value_mut()));
        drop(entry);
        self.commit();
        true
    }

    /// Carry `checked` and the last reading over from the stored record.
    fn with_local_state(&self, mut incoming: Channel) -> Channel {
        if let Some(existing) = self.get(&incoming.uuid) {
            incoming.checked = existing.checked;
            if incoming.last_timestamp.is_none() {
                incoming.last_value = existing.last_value;
                incoming.last_timestamp = existing.last_timestamp;
            }
        }
        incoming
    }

    fn commit(&self) {
        self.rebuild_snapshot();
        self.dirty.store(true, Ordering::Release);
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<Channel>> =
            self.by_uuid.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| compare(SortMode::Title, a, b));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

}

/// Atomic replace: write a sibling temp file, then rename over.
fn write_file(path: &Path, snapshot: &[Arc<Channel>]) -> Result<(), CoreError> {
    let json = serde_json::to_vec(snapshot).map_err(|e| storage_error(path, &e))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| storage_error(path, &e))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| storage_error(&tmp, &e))?;
    std::fs::rename(&tmp, path).map_err(|e| storage_error(path, &e))?;
    debug!(path = %path.display(), count = snapshot.len(), "channel cache written");
    Ok(())
}

fn storage_error(path: &Path, err: &dyn std::fmt::Display) -> CoreError {
    CoreError::Storage {
        message: format!("{}: {err}", path.display()),
    }
}
