//! External video identifier extraction and the static thumbnail URL convention.

/// URL shapes recognised in front of an identifier, tried in order.
/// The first marker found in the input wins.
const URL_MARKERS: [&str; 6] = [
  "youtube.com/watch?v=",
  "youtu.be/",
  "youtube.com/embed/",
  "youtube.com/shorts/",
  "youtube.com/live/",
  "youtube.com/v/",
];

/// Length of a bare platform identifier.
pub const BARE_ID_LEN: usize = 11;

fn is_delimiter(c: char) -> bool {
  c == '&' || c == '?' || c.is_whitespace()
}

fn is_id_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Identifier following `marker`, up to the first delimiter. Empty captures don't count.
fn after_marker<'a>(input: &'a str, marker: &str) -> Option<&'a str> {
  let start = input.find(marker)? + marker.len();
  let rest = &input[start..];
  let end = rest.find(is_delimiter).unwrap_or(rest.len());
  let id = &rest[..end];
  (!id.is_empty()).then_some(id)
}

/// Whether `s` is exactly one bare identifier.
pub fn is_bare_id(s: &str) -> bool {
  s.len() == BARE_ID_LEN && s.chars().all(is_id_char)
}

/// Extract the external video identifier from a pasted URL or bare id.
///
/// Known URL shapes are tried first (watch page, short link, embed, shorts,
/// live, legacy `/v/`); otherwise the trimmed input is accepted only when it
/// is itself a bare 11-character identifier. Returns `None` when nothing
/// matches.
pub fn extract_video_id(input: &str) -> Option<String> {
  if let Some(id) = URL_MARKERS.iter().find_map(|marker| after_marker(input, marker)) {
    return Some(id.to_string());
  }
  let trimmed = input.trim();
  is_bare_id(trimmed).then(|| trimmed.to_string())
}

/// Canonical watch-page URL for an identifier (what the embed is pointed at).
pub fn watch_url(video_id: &str) -> String {
  format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Static thumbnail variants, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailVariant {
  MaxRes,
  High,
}

impl ThumbnailVariant {
  /// Fallback order: the max-resolution image is missing for many uploads.
  pub const FALLBACK_ORDER: [ThumbnailVariant; 2] = [ThumbnailVariant::MaxRes, ThumbnailVariant::High];

  fn file_name(self) -> &'static str {
    match self {
      ThumbnailVariant::MaxRes => "maxresdefault.jpg",
      ThumbnailVariant::High => "hqdefault.jpg",
    }
  }
}

pub fn thumbnail_url(video_id: &str, variant: ThumbnailVariant) -> String {
  format!("https://img.youtube.com/vi/{}/{}", video_id, variant.file_name())
}
