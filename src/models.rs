use crate::duration::{UNKNOWN_DURATION, parse_duration};

/// Identifier assigned to a playlist by the persistence service.
pub type PlaylistId = i64;

/// A lightweight search hit, before detail enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub video_id: String,
  pub title: String,
  pub thumbnail_url: Option<String>,
}

/// Extended metadata returned by the catalog's batched detail call.
/// `raw_duration` is `None` when the entry carried no usable duration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailItem {
  pub video_id: String,
  pub title: Option<String>,
  pub thumbnail_url: Option<String>,
  pub raw_duration: Option<String>,
}

/// A display-ready video: catalog snippet merged with its detail metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Video {
  external_id: String,
  pub title: String,
  pub thumbnail_url: Option<String>,
  raw_duration: String,
  display_duration: String,
  bookmark_seconds: Option<f64>,
}

impl Video {
  pub fn new(external_id: impl Into<String>, title: impl Into<String>, thumbnail_url: Option<String>) -> Self {
    Self {
      external_id: external_id.into(),
      title: title.into(),
      thumbnail_url,
      raw_duration: UNKNOWN_DURATION.to_string(),
      display_duration: parse_duration(UNKNOWN_DURATION),
      bookmark_seconds: None,
    }
  }

  /// Attach the catalog-native duration. The display form is derived from it.
  pub fn with_raw_duration(mut self, raw: Option<&str>) -> Self {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(UNKNOWN_DURATION);
    self.raw_duration = raw.to_string();
    self.display_duration = parse_duration(raw);
    self
  }

  /// Restore a bookmark read back from the persistence service.
  pub fn with_bookmark(mut self, seconds: Option<f64>) -> Self {
    self.bookmark_seconds = seconds;
    self
  }

  pub fn external_id(&self) -> &str {
    &self.external_id
  }

  pub fn raw_duration(&self) -> &str {
    &self.raw_duration
  }

  pub fn display_duration(&self) -> &str {
    &self.display_duration
  }

  pub fn bookmark_seconds(&self) -> Option<f64> {
    self.bookmark_seconds
  }

  pub(crate) fn set_bookmark(&mut self, seconds: f64) {
    self.bookmark_seconds = Some(seconds);
  }
}

/// A playlist as listed by the persistence service.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
  pub id: PlaylistId,
  pub name: String,
  /// External ids of member videos, in insertion order. Empty when only the summary was fetched.
  pub members: Vec<String>,
}

/// Results of one query. Replaced wholesale by the next query, never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSession {
  pub query: String,
  pub videos: Vec<Video>,
}

/// Format a bookmark offset as `m:ss` or `h:mm:ss`.
pub fn format_offset(seconds: f64) -> String {
  let total = seconds.max(0.0).floor() as u64;
  let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
  if h > 0 { format!("{}:{:02}:{:02}", h, m, s) } else { format!("{}:{:02}", m, s) }
}
