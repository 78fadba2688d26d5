//! Playlist persistence service: trait seam plus the REST adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::{endpoint, expect_success, read_json};
use crate::models::{Playlist, PlaylistId, Video};

/// Storage for playlists, their members and per-video bookmarks.
///
/// Errors are returned as the service reported them; callers decide how to label them.
#[async_trait]
pub trait PlaylistStore: Send + Sync {
  async fn list_playlists(&self) -> Result<Vec<Playlist>>;
  async fn get_playlist(&self, id: PlaylistId) -> Result<Playlist>;
  /// Create an empty playlist. Name validation is the service's business.
  async fn create_playlist(&self, name: &str) -> Result<PlaylistId>;
  async fn rename_playlist(&self, id: PlaylistId, name: &str) -> Result<Playlist>;
  async fn delete_playlist(&self, id: PlaylistId) -> Result<()>;
  /// Insert `video` as a member of `playlist_id`. Not assumed idempotent.
  async fn add_member(&self, playlist_id: PlaylistId, video: &Video) -> Result<()>;
  async fn find_video(&self, external_id: &str) -> Result<Option<Video>>;
  /// Persist `bookmark_seconds` against the video and return the stored record.
  async fn update_bookmark(&self, video: &Video, bookmark_seconds: f64) -> Result<Video>;
}

// --- wire format ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoRecord {
  yt_id: String,
  #[serde(default)]
  title: String,
  #[serde(default)]
  thumbnail_url: Option<String>,
  #[serde(default)]
  duration: Option<String>,
  #[serde(default)]
  bookmark: Option<f64>,
}

impl VideoRecord {
  fn from_video(video: &Video) -> Self {
    Self {
      yt_id: video.external_id().to_string(),
      title: video.title.clone(),
      thumbnail_url: video.thumbnail_url.clone(),
      duration: Some(video.raw_duration().to_string()),
      bookmark: video.bookmark_seconds(),
    }
  }

  fn into_video(self) -> Video {
    Video::new(self.yt_id, self.title, self.thumbnail_url)
      .with_raw_duration(self.duration.as_deref())
      .with_bookmark(self.bookmark)
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistRecord {
  id: PlaylistId,
  playlist_name: String,
  #[serde(default)]
  videos: Vec<VideoRecord>,
}

impl From<PlaylistRecord> for Playlist {
  fn from(record: PlaylistRecord) -> Self {
    Playlist { id: record.id, name: record.playlist_name, members: record.videos.into_iter().map(|v| v.yt_id).collect() }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistNameBody<'a> {
  playlist_name: &'a str,
}

/// The creation call answers with either a bare id or the created record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreatedPlaylist {
  Id(PlaylistId),
  Record { id: PlaylistId },
}

impl CreatedPlaylist {
  fn id(&self) -> PlaylistId {
    match self {
      CreatedPlaylist::Id(id) | CreatedPlaylist::Record { id } => *id,
    }
  }
}

/// [`PlaylistStore`] backed by the playlist service's REST API.
pub struct HttpPlaylistStore {
  http: Client,
  base_url: String,
}

impl HttpPlaylistStore {
  pub fn new(http: Client, base_url: impl Into<String>) -> Self {
    Self { http, base_url: base_url.into() }
  }

  fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
    endpoint(&self.base_url, segments, &[])
  }

  fn playlist_url(&self, id: PlaylistId) -> Result<reqwest::Url> {
    self.url(&["playlists", id.to_string().as_str()])
  }

  fn video_url(&self, external_id: &str) -> Result<reqwest::Url> {
    self.url(&["videos", "yt", external_id])
  }
}

#[async_trait]
impl PlaylistStore for HttpPlaylistStore {
  async fn list_playlists(&self) -> Result<Vec<Playlist>> {
    let response = self.http.get(self.url(&["playlists"])?).send().await?;
    let records: Vec<PlaylistRecord> = read_json(response).await?;
    Ok(records.into_iter().map(Playlist::from).collect())
  }

  async fn get_playlist(&self, id: PlaylistId) -> Result<Playlist> {
    let response = self.http.get(self.playlist_url(id)?).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Err(Error::PlaylistNotFound(id));
    }
    let record: PlaylistRecord = read_json(response).await?;
    Ok(record.into())
  }

  async fn create_playlist(&self, name: &str) -> Result<PlaylistId> {
    let response =
      self.http.post(self.url(&["playlists"])?).json(&PlaylistNameBody { playlist_name: name }).send().await?;
    let created: CreatedPlaylist = read_json(response).await?;
    debug!(id = created.id(), name = %name, "store: playlist created");
    Ok(created.id())
  }

  async fn rename_playlist(&self, id: PlaylistId, name: &str) -> Result<Playlist> {
    let response =
      self.http.put(self.playlist_url(id)?).json(&PlaylistNameBody { playlist_name: name }).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Err(Error::PlaylistNotFound(id));
    }
    let record: PlaylistRecord = read_json(response).await?;
    Ok(record.into())
  }

  async fn delete_playlist(&self, id: PlaylistId) -> Result<()> {
    let response = self.http.delete(self.playlist_url(id)?).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Err(Error::PlaylistNotFound(id));
    }
    expect_success(response).await
  }

  async fn add_member(&self, playlist_id: PlaylistId, video: &Video) -> Result<()> {
    let url = self.url(&["playlists", playlist_id.to_string().as_str(), "videos"])?;
    let response = self.http.post(url).json(&VideoRecord::from_video(video)).send().await?;
    expect_success(response).await?;
    debug!(playlist_id, video_id = %video.external_id(), "store: member added");
    Ok(())
  }

  async fn find_video(&self, external_id: &str) -> Result<Option<Video>> {
    let response = self.http.get(self.video_url(external_id)?).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let record: VideoRecord = read_json(response).await?;
    Ok(Some(record.into_video()))
  }

  async fn update_bookmark(&self, video: &Video, bookmark_seconds: f64) -> Result<Video> {
    let mut record = VideoRecord::from_video(video);
    record.bookmark = Some(bookmark_seconds);
    let url = self.video_url(video.external_id())?;
    let response = self.http.put(url).json(&record).send().await?;
    let stored: VideoRecord = read_json(response).await?;
    Ok(stored.into_video())
  }
}
