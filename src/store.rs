//! Persistent store: three independent JSON slots (videos, groupings, theme)
//! over a key-value byte store.
//!
//! Loading never fails: a missing key, unreadable file, malformed JSON or a
//! value of the wrong shape all yield the slot's default. Saving never fails
//! outward either; the in-memory catalog stays the source of truth.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::catalog::{Grouping, VideoRecord};
use crate::constants::constants;
use crate::theme::ThemePreference;

/// Byte-level key-value backend.
pub trait KvStore: Send {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
  fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;
}

/// One file per key inside a directory.
pub struct FileStore {
  dir: PathBuf,
}

impl FileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.json", key))
  }
}

impl KvStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let path = self.path_for(key);
    match std::fs::read(&path) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
  }

  fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
    std::fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create {}", self.dir.display()))?;
    let path = self.path_for(key);
    std::fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
  }
}

/// Session-only store, used when no data directory is available.
#[derive(Default)]
pub struct MemoryStore {
  entries: HashMap<String, Vec<u8>>,
}

impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    Ok(self.entries.get(key).cloned())
  }

  fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
    self.entries.insert(key.to_string(), value.to_vec());
    Ok(())
  }
}

/// Typed access to the three persisted slots.
pub struct Store {
  kv: Box<dyn KvStore>,
}

impl Store {
  pub fn new(kv: Box<dyn KvStore>) -> Self {
    Self { kv }
  }

  pub fn in_memory() -> Self {
    Self::new(Box::new(MemoryStore::default()))
  }

  pub fn load_videos(&self) -> Vec<VideoRecord> {
    self.load_list(&constants().videos_key)
  }

  pub fn save_videos(&mut self, videos: &[VideoRecord]) {
    self.save_json(&constants().videos_key, &videos);
  }

  pub fn load_groupings(&self) -> Vec<Grouping> {
    self.load_list(&constants().groupings_key)
  }

  pub fn save_groupings(&mut self, groupings: &[Grouping]) {
    self.save_json(&constants().groupings_key, &groupings);
  }

  /// Accepts the JSON string form and the bare literal.
  pub fn load_theme(&self) -> ThemePreference {
    let key = &constants().theme_key;
    let Some(bytes) = self.read(key) else { return ThemePreference::default() };
    let parsed = serde_json::from_slice::<String>(&bytes)
      .ok()
      .or_else(|| std::str::from_utf8(&bytes).ok().map(|s| s.trim().to_string()))
      .and_then(|s| ThemePreference::parse(&s));
    parsed.unwrap_or_else(|| {
      debug!(key = %key, "store: unrecognised theme value, using default");
      ThemePreference::default()
    })
  }

  pub fn save_theme(&mut self, theme: ThemePreference) {
    self.save_json(&constants().theme_key, &theme.as_str());
  }

  fn read(&self, key: &str) -> Option<Vec<u8>> {
    match self.kv.get(key) {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(key = %key, err = %format!("{:#}", e), "store: read failed, using default");
        None
      }
    }
  }

  fn load_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
    let Some(bytes) = self.read(key) else { return Vec::new() };
    match serde_json::from_slice::<Vec<T>>(&bytes) {
      Ok(items) => items,
      Err(e) => {
        warn!(key = %key, err = %e, "store: stored value is not a valid list, using default");
        Vec::new()
      }
    }
  }

  fn save_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
    let bytes = match serde_json::to_vec(value) {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(key = %key, err = %e, "store: serialisation failed, not saved");
        return;
      }
    };
    if let Err(e) = self.kv.set(key, &bytes) {
      warn!(key = %key, err = %format!("{:#}", e), "store: write failed, keeping in-memory state");
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::catalog::{GroupingId, VideoId};
  use anyhow::anyhow;
  use std::sync::{Arc, Mutex as StdMutex};

  /// Shared-handle store so a test can inspect bytes after handing the store to a `Catalog`.
  #[derive(Clone, Default)]
  pub(crate) struct SharedStore {
    pub(crate) entries: Arc<StdMutex<HashMap<String, Vec<u8>>>>,
    pub(crate) fail_reads: bool,
    pub(crate) fail_writes: bool,
  }

  impl KvStore for SharedStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
      if self.fail_reads {
        return Err(anyhow!("storage disabled"));
      }
      Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
      if self.fail_writes {
        return Err(anyhow!("quota exceeded"));
      }
      self.entries.lock().unwrap().insert(key.to_string(), value.to_vec());
      Ok(())
    }
  }

  fn store_with(key: &str, raw: &str) -> Store {
    let mut mem = MemoryStore::default();
    mem.set(key, raw.as_bytes()).unwrap();
    Store::new(Box::new(mem))
  }

  fn sample_video(id: &str, group: Option<&str>) -> VideoRecord {
    VideoRecord {
      id: VideoId::new(id),
      external_id: "dQw4w9WgXcQ".to_string(),
      title: format!("Video {id}"),
      grouping_id: group.map(GroupingId::from_raw),
    }
  }

  #[test]
  fn empty_store_yields_defaults() {
    let store = Store::in_memory();
    assert!(store.load_videos().is_empty());
    assert!(store.load_groupings().is_empty());
    assert_eq!(store.load_theme(), ThemePreference::Dark);
  }

  #[test]
  fn malformed_json_yields_default() {
    let store = store_with(&constants().videos_key, "{not json");
    assert!(store.load_videos().is_empty());
  }

  #[test]
  fn non_list_value_yields_default() {
    let store = store_with(&constants().groupings_key, r#"{"id":"coll_1","name":"x","createdAt":1}"#);
    assert!(store.load_groupings().is_empty());
  }

  #[test]
  fn reads_original_field_names() {
    let raw = r#"[{"id":"1700000000001","youtubeId":"dQw4w9WgXcQ","title":"Hi","collectionId":"coll_1700000000000"}]"#;
    let store = store_with(&constants().videos_key, raw);
    let videos = store.load_videos();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].external_id, "dQw4w9WgXcQ");
    assert_eq!(videos[0].grouping_id.as_ref().map(|g| g.as_str()), Some("coll_1700000000000"));
  }

  #[test]
  fn theme_accepts_bare_and_json_literals() {
    assert_eq!(store_with(&constants().theme_key, "light").load_theme(), ThemePreference::Light);
    assert_eq!(store_with(&constants().theme_key, "\"light\"").load_theme(), ThemePreference::Light);
    assert_eq!(store_with(&constants().theme_key, "\"purple\"").load_theme(), ThemePreference::Dark);
  }

  #[test]
  fn save_then_load_is_idempotent() {
    let mut store = Store::in_memory();
    let videos = vec![sample_video("2", Some("coll_1")), sample_video("1", None)];
    let groupings = vec![Grouping { id: GroupingId::from_raw("coll_1"), name: "Mix".to_string(), created_at: 1 }];
    store.save_videos(&videos);
    store.save_groupings(&groupings);
    store.save_theme(ThemePreference::Light);

    let first = (store.load_videos(), store.load_groupings(), store.load_theme());
    store.save_videos(&first.0);
    store.save_groupings(&first.1);
    store.save_theme(first.2);
    let second = (store.load_videos(), store.load_groupings(), store.load_theme());

    assert_eq!(first, second);
    assert_eq!(first.0, videos);
    assert_eq!(first.1, groupings);
  }

  #[test]
  fn read_failures_are_swallowed() {
    let kv = SharedStore { fail_reads: true, ..Default::default() };
    let store = Store::new(Box::new(kv));
    assert!(store.load_videos().is_empty());
    assert_eq!(store.load_theme(), ThemePreference::Dark);
  }

  #[test]
  fn write_failures_are_swallowed() {
    let kv = SharedStore { fail_writes: true, ..Default::default() };
    let mut store = Store::new(Box::new(kv));
    store.save_videos(&[sample_video("1", None)]);
    store.save_theme(ThemePreference::Light);
    assert!(store.load_videos().is_empty());
  }

  #[test]
  fn file_store_round_trip() {
    let dir = std::env::temp_dir().join(format!("anaty-store-test-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let mut kv = FileStore::new(&dir);
    assert_eq!(kv.get("missing").unwrap(), None);
    kv.set("slot", b"[1,2]").unwrap();
    assert_eq!(kv.get("slot").unwrap().as_deref(), Some(&b"[1,2]"[..]));
    let _ = std::fs::remove_dir_all(&dir);
  }
}
