//! Thumbnail retrieval and the in-memory cache the gallery and cover draw from.

use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::extract::{ThumbnailVariant, thumbnail_url};

/// Fetch the best available thumbnail, falling back to the standard variant
/// when the max-resolution one is missing.
pub async fn fetch_thumbnail(client: &Client, video_id: &str) -> Result<DynamicImage> {
  for variant in ThumbnailVariant::FALLBACK_ORDER {
    let url = thumbnail_url(video_id, variant);
    match client.get(&url).send().await {
      Ok(response) if response.status().is_success() => {
        let bytes = response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", url))?;
        return image::load_from_memory(&bytes)
          .with_context(|| format!("Failed to decode image from memory (URL: {})", url));
      }
      Ok(response) => debug!(url = %url, status = %response.status(), "thumbnail: variant unavailable"),
      Err(e) => debug!(url = %url, err = %e, "thumbnail: request failed"),
    }
  }
  Err(anyhow!("Failed to fetch any thumbnail for video ID: {}", video_id))
}

/// Blurred, dimmed backdrop shown under the loading spinner.
pub fn cover_image(image: &DynamicImage) -> DynamicImage {
  image.thumbnail(160, 90).blur(1.5).brighten(-70)
}

enum Entry {
  Loading,
  Ready(DynamicImage),
  Failed,
}

type Delivery = (String, Result<DynamicImage, String>);

/// Thumbnails keyed by external video id. Each id is fetched at most once.
pub struct Thumbnails {
  client: Client,
  entries: HashMap<String, Entry>,
  tx: mpsc::UnboundedSender<Delivery>,
  rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Thumbnails {
  pub fn new(client: Client) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { client, entries: HashMap::new(), tx, rx }
  }

  /// Start a background fetch unless one already ran for this id.
  pub fn request(&mut self, video_id: &str) {
    if self.entries.contains_key(video_id) {
      return;
    }
    self.entries.insert(video_id.to_string(), Entry::Loading);
    let client = self.client.clone();
    let tx = self.tx.clone();
    let id = video_id.to_string();
    tokio::spawn(async move {
      let result = fetch_thumbnail(&client, &id).await.map_err(|e| format!("{:#}", e));
      let _ = tx.send((id, result));
    });
  }

  pub fn get(&self, video_id: &str) -> Option<&DynamicImage> {
    match self.entries.get(video_id) {
      Some(Entry::Ready(image)) => Some(image),
      _ => None,
    }
  }

  pub fn is_loading(&self, video_id: &str) -> bool {
    matches!(self.entries.get(video_id), Some(Entry::Loading))
  }

  /// Collect finished fetches. Returns whether anything changed.
  pub fn drain(&mut self) -> bool {
    let mut changed = false;
    while let Ok((id, result)) = self.rx.try_recv() {
      let entry = match result {
        Ok(image) => Entry::Ready(image),
        Err(e) => {
          debug!(video = %id, err = %e, "thumbnail: giving up");
          Entry::Failed
        }
      };
      self.entries.insert(id, entry);
      changed = true;
    }
    changed
  }
}
