//! Error types shared by the catalog, store and player adapters.

use thiserror::Error;

use crate::models::PlaylistId;

/// Errors raised by a single requested operation. None of them is fatal to the process.
#[derive(Error, Debug)]
pub enum Error {
  /// Transport-level failure on an external call
  #[error("network error: {0}")]
  Network(#[from] reqwest::Error),

  /// A service answered with a non-success status
  #[error("service error ({status}): {message}")]
  Api { status: u16, message: String },

  /// A response body could not be decoded
  #[error("failed to parse response: {0}")]
  Parse(String),

  /// The detail call returned no items at all
  #[error("no video details returned for query '{query}'")]
  EmptyDetails { query: String },

  /// The persistence service rejected a new playlist
  #[error("playlist '{name}' could not be created: {reason}")]
  PlaylistCreate { name: String, reason: String },

  /// The persistence service rejected a membership insert
  #[error("video {video_id} could not be added to playlist {playlist_id}: {reason}")]
  MembershipAdd { playlist_id: PlaylistId, video_id: String, reason: String },

  #[error("playlist {0} not found")]
  PlaylistNotFound(PlaylistId),

  /// The default playlist is managed outside this tool
  #[error("playlist {0} is the reserved default playlist")]
  ReservedPlaylist(PlaylistId),

  /// An identifier that cannot be used as a single URL path segment
  #[error("invalid identifier '{0}'")]
  InvalidId(String),

  #[error("invalid query: {0}")]
  InvalidQuery(String),

  /// The player reported a position that cannot be stored
  #[error("invalid playback offset: {0}")]
  InvalidOffset(f64),

  #[error("player error: {0}")]
  Player(String),

  #[error("configuration error: {0}")]
  Config(String),
}

impl Error {
  /// Turn a failed response into [`Error::Api`], keeping the body text for diagnostics.
  pub async fn from_response(response: reqwest::Response) -> Self {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Error::Api { status, message }
  }

  /// Short reason text used when re-labelling a failure for a specific operation.
  pub fn reason(&self) -> String {
    match self {
      Error::Api { status, message } if message.trim().is_empty() => format!("status {}", status),
      Error::Api { status, message } => format!("status {}: {}", status, message.trim()),
      other => other.to_string(),
    }
  }
}

/// Result type for catalog, store and player operations.
pub type Result<T> = std::result::Result<T, Error>;
