use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http::{endpoint, read_json};
use crate::models::{Candidate, DetailItem};

/// The external video catalog: a ranked search call and a batched detail call.
#[async_trait]
pub trait Catalog: Send + Sync {
  /// Ranked candidates for `query`, at most `max_results` of them.
  async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Candidate>>;

  /// Extended metadata for `video_ids`, in one request. May be shorter than the request,
  /// and is only expected to line up with it by position.
  async fn details(&self, video_ids: &[String]) -> Result<Vec<DetailItem>>;
}

// --- YouTube Data API v3 wire format ---

#[derive(Debug, Deserialize)]
struct SearchListResponse {
  #[serde(default)]
  items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
  #[serde(default)]
  id: Option<SearchItemId>,
  #[serde(default)]
  snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
  #[serde(default)]
  video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
  #[serde(default)]
  title: String,
  #[serde(default)]
  thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
  #[serde(default)]
  default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
  url: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
  /// Absent entirely when nothing matched.
  #[serde(default)]
  items: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
  id: String,
  #[serde(default)]
  snippet: Option<Snippet>,
  #[serde(default)]
  content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
  #[serde(default)]
  duration: Option<String>,
}

impl Snippet {
  fn thumbnail_url(&self) -> Option<String> {
    self.thumbnails.default.as_ref().map(|t| t.url.clone()).filter(|u| !u.is_empty())
  }
}

/// Convert one detail entry. A malformed entry still occupies its position,
/// with no duration, so positional alignment with the request survives.
fn detail_from_value(value: serde_json::Value) -> DetailItem {
  match serde_json::from_value::<VideoItem>(value.clone()) {
    Ok(item) => {
      let snippet = item.snippet.unwrap_or_default();
      DetailItem {
        thumbnail_url: snippet.thumbnail_url(),
        title: Some(snippet.title).filter(|t| !t.is_empty()),
        raw_duration: item.content_details.and_then(|c| c.duration).filter(|d| !d.trim().is_empty()),
        video_id: item.id,
      }
    }
    Err(e) => {
      let video_id = value.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
      warn!(video_id = %video_id, err = %e, "catalog: malformed detail entry");
      DetailItem { video_id, ..DetailItem::default() }
    }
  }
}

/// [`Catalog`] backed by the YouTube Data API v3.
pub struct YoutubeCatalog {
  http: Client,
  base_url: String,
  api_key: String,
}

impl YoutubeCatalog {
  pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self { http, base_url: base_url.into(), api_key: api_key.into() }
  }
}

#[async_trait]
impl Catalog for YoutubeCatalog {
  async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Candidate>> {
    let max_results = max_results.to_string();
    let url = endpoint(
      &self.base_url,
      &["search"],
      &[("part", "snippet"), ("type", "video"), ("maxResults", &max_results), ("q", query), ("key", &self.api_key)],
    )?;
    debug!(query = %query, max_results = %max_results, "catalog: search");

    let response: SearchListResponse = read_json(self.http.get(url).send().await?).await?;
    let candidates = response
      .items
      .into_iter()
      .filter_map(|item| {
        let Some(video_id) = item.id.and_then(|id| id.video_id).filter(|id| !id.is_empty()) else {
          debug!("catalog: skipping search item without a video id");
          return None;
        };
        let snippet = item.snippet.unwrap_or_default();
        Some(Candidate { thumbnail_url: snippet.thumbnail_url(), title: snippet.title, video_id })
      })
      .collect();
    Ok(candidates)
  }

  async fn details(&self, video_ids: &[String]) -> Result<Vec<DetailItem>> {
    let ids = video_ids.join(",");
    let url =
      endpoint(&self.base_url, &["videos"], &[("part", "snippet,contentDetails"), ("id", &ids), ("key", &self.api_key)])?;
    debug!(count = video_ids.len(), "catalog: details");

    let response: VideoListResponse = read_json(self.http.get(url).send().await?).await?;
    Ok(response.items.unwrap_or_default().into_iter().map(detail_from_value).collect())
  }
}
