//! The catalog: ordered video records and groupings ("collections").
//!
//! Videos are kept newest-first, groupings oldest-first. Every mutation is
//! written through to the [`Store`] immediately.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::constants::constants;
use crate::store::Store;

/// Identifier of a video record. Never interchangeable with [`GroupingId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
  pub fn new(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for VideoId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Identifier of a grouping. Persisted with a `coll_` prefix so stored data
/// stays readable next to video ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupingId(String);

impl GroupingId {
  fn from_stamp(stamp: i64) -> Self {
    Self(format!("{}{}", constants().grouping_id_prefix, stamp))
  }

  /// Wrap an already-persisted id.
  pub fn from_raw(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for GroupingId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
  pub id: VideoId,
  #[serde(rename = "youtubeId")]
  pub external_id: String,
  pub title: String,
  #[serde(rename = "collectionId", default, skip_serializing_if = "Option::is_none")]
  pub grouping_id: Option<GroupingId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grouping {
  pub id: GroupingId,
  pub name: String,
  #[serde(rename = "createdAt")]
  pub created_at: i64,
}

/// A video supplied to [`Catalog::create_grouping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVideo {
  pub external_id: String,
  pub title: String,
}

/// Millisecond-stamp id generator. Stamps are strictly increasing within a
/// session, even when several ids are minted in the same millisecond.
#[derive(Debug, Default)]
pub struct IdGen {
  last: i64,
}

impl IdGen {
  /// Seeded past every numeric stamp already in use.
  fn seeded(videos: &[VideoRecord], groupings: &[Grouping]) -> Self {
    let prefix = &constants().grouping_id_prefix;
    let video_stamps = videos.iter().filter_map(|v| v.id.as_str().parse::<i64>().ok());
    let grouping_stamps =
      groupings.iter().filter_map(|g| g.id.as_str().strip_prefix(prefix.as_str()).and_then(|s| s.parse::<i64>().ok()));
    Self { last: video_stamps.chain(grouping_stamps).max().unwrap_or(0) }
  }

  pub fn next(&mut self, now_ms: i64) -> i64 {
    self.last = now_ms.max(self.last + 1);
    self.last
  }
}

pub struct Catalog {
  videos: Vec<VideoRecord>,
  groupings: Vec<Grouping>,
  /// Grouping currently being viewed, if any. Not persisted.
  active: Option<GroupingId>,
  ids: IdGen,
  store: Store,
}

impl Catalog {
  /// Read both lists once from the store.
  pub fn load(store: Store) -> Self {
    let videos = store.load_videos();
    let groupings = store.load_groupings();
    info!(videos = videos.len(), groupings = groupings.len(), "catalog: loaded");
    let ids = IdGen::seeded(&videos, &groupings);
    Self { videos, groupings, active: None, ids, store }
  }

  pub fn videos(&self) -> &[VideoRecord] {
    &self.videos
  }

  pub fn groupings(&self) -> &[Grouping] {
    &self.groupings
  }

  pub fn store_mut(&mut self) -> &mut Store {
    &mut self.store
  }

  pub fn store(&self) -> &Store {
    &self.store
  }

  pub fn video(&self, id: &VideoId) -> Option<&VideoRecord> {
    self.videos.iter().find(|v| &v.id == id)
  }

  pub fn grouping(&self, id: &GroupingId) -> Option<&Grouping> {
    self.groupings.iter().find(|g| &g.id == id)
  }

  /// Member videos of a grouping, in display order.
  pub fn videos_in<'a>(&'a self, id: &'a GroupingId) -> impl Iterator<Item = &'a VideoRecord> + 'a {
    self.videos.iter().filter(move |v| v.grouping_id.as_ref() == Some(id))
  }

  /// Videos belonging to no grouping.
  pub fn ungrouped(&self) -> impl Iterator<Item = &VideoRecord> {
    self.videos.iter().filter(|v| v.grouping_id.is_none())
  }

  pub fn member_count(&self, id: &GroupingId) -> usize {
    self.videos_in(id).count()
  }

  pub fn add_video(&mut self, external_id: String, title: String, grouping_id: Option<GroupingId>) -> VideoId {
    self.add_video_at(Utc::now().timestamp_millis(), external_id, title, grouping_id)
  }

  fn add_video_at(
    &mut self,
    now_ms: i64,
    external_id: String,
    title: String,
    grouping_id: Option<GroupingId>,
  ) -> VideoId {
    let id = VideoId::new(self.ids.next(now_ms).to_string());
    info!(id = %id, external_id = %external_id, "catalog: video added");
    self.videos.insert(0, VideoRecord { id: id.clone(), external_id, title, grouping_id });
    self.store.save_videos(&self.videos);
    id
  }

  /// Create a grouping together with its initial videos. The grouping is
  /// appended; its videos are prepended as one batch, in the given order.
  pub fn create_grouping(&mut self, name: String, initial: Vec<NewVideo>) -> GroupingId {
    self.create_grouping_at(Utc::now().timestamp_millis(), name, initial)
  }

  fn create_grouping_at(&mut self, now_ms: i64, name: String, initial: Vec<NewVideo>) -> GroupingId {
    let stamp = self.ids.next(now_ms);
    let id = GroupingId::from_stamp(stamp);
    self.groupings.push(Grouping { id: id.clone(), name, created_at: stamp });

    let batch: Vec<VideoRecord> = initial
      .into_iter()
      .enumerate()
      .map(|(i, v)| VideoRecord {
        id: VideoId::new(self.ids.next(stamp + i as i64 + 1).to_string()),
        external_id: v.external_id,
        title: v.title,
        grouping_id: Some(id.clone()),
      })
      .collect();
    info!(id = %id, videos = batch.len(), "catalog: grouping created");
    self.videos.splice(0..0, batch);

    self.store.save_groupings(&self.groupings);
    self.store.save_videos(&self.videos);
    id
  }

  /// Remove one video. Unknown ids are a no-op.
  pub fn remove_video(&mut self, id: &VideoId) {
    let before = self.videos.len();
    self.videos.retain(|v| &v.id != id);
    debug!(id = %id, removed = before - self.videos.len(), "catalog: remove video");
    self.store.save_videos(&self.videos);
  }

  /// Remove a grouping and every video that belongs to it.
  pub fn remove_grouping(&mut self, id: &GroupingId) {
    self.groupings.retain(|g| &g.id != id);
    let before = self.videos.len();
    self.videos.retain(|v| v.grouping_id.as_ref() != Some(id));
    info!(id = %id, cascaded = before - self.videos.len(), "catalog: grouping removed");
    if self.active.as_ref() == Some(id) {
      self.active = None;
    }
    self.store.save_groupings(&self.groupings);
    self.store.save_videos(&self.videos);
  }

  pub fn active(&self) -> Option<&GroupingId> {
    self.active.as_ref()
  }

  /// Start viewing a grouping. Unknown ids are ignored.
  pub fn open_grouping(&mut self, id: GroupingId) {
    if self.grouping(&id).is_some() {
      self.active = Some(id);
    }
  }

  pub fn close_grouping(&mut self) {
    self.active = None;
  }

  /// Look up a grouping by exact name.
  pub fn grouping_named(&self, name: &str) -> Option<&Grouping> {
    self.groupings.iter().find(|g| g.name == name)
  }
}
