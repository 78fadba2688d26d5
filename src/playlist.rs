use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::models::{Playlist, PlaylistId, Video};
use crate::store::PlaylistStore;

/// How far the create-and-assign workflow got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignProgress {
  /// The playlist exists but holds nothing from this workflow.
  Created,
  /// The video joined the default playlist but not the new one.
  DefaultAssigned,
  /// The video is in both playlists.
  FullyAssigned,
}

impl fmt::Display for AssignProgress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AssignProgress::Created => write!(f, "empty"),
      AssignProgress::DefaultAssigned => write!(f, "assigned to the default playlist only"),
      AssignProgress::FullyAssigned => write!(f, "fully assigned"),
    }
  }
}

/// Failure of [`PlaylistAssigner::create_playlist_and_assign`].
#[derive(Error, Debug)]
pub enum AssignError {
  /// Nothing was created.
  #[error("playlist was not created: {0}")]
  Create(#[source] Error),

  /// The playlist was created, but a later membership step failed.
  #[error("playlist {playlist_id} was created but left {progress}{}: {source}", rollback_note(.rolled_back))]
  Partial {
    playlist_id: PlaylistId,
    progress: AssignProgress,
    /// Whether the half-populated playlist was deleted again.
    rolled_back: bool,
    #[source]
    source: Error,
  },
}

fn rollback_note(rolled_back: &bool) -> &'static str {
  if *rolled_back { " (rolled back)" } else { "" }
}

/// Adds videos to playlists, keeping the default playlist in step with quick-adds.
#[derive(Clone)]
pub struct PlaylistAssigner {
  store: Arc<dyn PlaylistStore>,
  default_playlist_id: PlaylistId,
  rollback_partial: bool,
}

impl PlaylistAssigner {
  pub fn new(store: Arc<dyn PlaylistStore>, default_playlist_id: PlaylistId) -> Self {
    Self { store, default_playlist_id, rollback_partial: false }
  }

  /// Delete a playlist left half-populated by a failed create-and-assign.
  pub fn with_rollback(mut self, enabled: bool) -> Self {
    self.rollback_partial = enabled;
    self
  }

  pub fn default_playlist_id(&self) -> PlaylistId {
    self.default_playlist_id
  }

  /// Insert `video` into `playlist_id`. Repeated calls are forwarded as-is.
  pub async fn add_to_playlist(&self, video: &Video, playlist_id: PlaylistId) -> Result<()> {
    self.store.add_member(playlist_id, video).await.map_err(|e| match e {
      Error::Api { .. } => {
        Error::MembershipAdd { playlist_id, video_id: video.external_id().to_string(), reason: e.reason() }
      }
      other => other,
    })?;
    info!(playlist_id, video_id = %video.external_id(), "video added to playlist");
    Ok(())
  }

  /// Quick-add to the default playlist.
  pub async fn add_to_default(&self, video: &Video) -> Result<()> {
    self.add_to_playlist(video, self.default_playlist_id).await
  }

  /// Create an empty playlist named `name`.
  pub async fn create_playlist(&self, name: &str) -> Result<PlaylistId> {
    let id = self.store.create_playlist(name).await.map_err(|e| match e {
      Error::Api { .. } => Error::PlaylistCreate { name: name.to_string(), reason: e.reason() },
      other => other,
    })?;
    info!(id, name = %name, "playlist created");
    Ok(id)
  }

  /// Create a playlist, then add `video` to the default playlist and to the new one.
  ///
  /// The steps are not transactional. A failure after creation is reported as
  /// [`AssignError::Partial`] carrying the new id and how far the workflow got.
  pub async fn create_playlist_and_assign(&self, video: &Video, name: &str) -> std::result::Result<PlaylistId, AssignError> {
    let playlist_id = self.create_playlist(name).await.map_err(AssignError::Create)?;
    let mut progress = AssignProgress::Created;

    let steps = [(self.default_playlist_id, AssignProgress::DefaultAssigned), (playlist_id, AssignProgress::FullyAssigned)];
    for (target, reached) in steps {
      if let Err(source) = self.add_to_playlist(video, target).await {
        warn!(playlist_id, target, progress = %progress, err = %source, "create-and-assign stopped early");
        let rolled_back = self.rollback_partial && self.roll_back(playlist_id).await;
        return Err(AssignError::Partial { playlist_id, progress, rolled_back, source });
      }
      progress = reached;
    }

    info!(playlist_id, video_id = %video.external_id(), "create-and-assign complete");
    Ok(playlist_id)
  }

  async fn roll_back(&self, playlist_id: PlaylistId) -> bool {
    match self.store.delete_playlist(playlist_id).await {
      Ok(()) => {
        info!(playlist_id, "rolled back partially assigned playlist");
        true
      }
      Err(e) => {
        error!(playlist_id, err = %e, "rollback failed");
        false
      }
    }
  }

  pub async fn list_playlists(&self) -> Result<Vec<Playlist>> {
    self.store.list_playlists().await
  }

  pub async fn get_playlist(&self, id: PlaylistId) -> Result<Playlist> {
    self.store.get_playlist(id).await
  }

  /// Rename a user playlist. The default playlist is left alone.
  pub async fn rename_playlist(&self, id: PlaylistId, name: &str) -> Result<Playlist> {
    self.ensure_not_default(id)?;
    let playlist = self.store.rename_playlist(id, name).await?;
    info!(id, name = %playlist.name, "playlist renamed");
    Ok(playlist)
  }

  /// Delete a user playlist. The default playlist is left alone.
  pub async fn delete_playlist(&self, id: PlaylistId) -> Result<()> {
    self.ensure_not_default(id)?;
    self.store.delete_playlist(id).await?;
    info!(id, "playlist deleted");
    Ok(())
  }

  fn ensure_not_default(&self, id: PlaylistId) -> Result<()> {
    if id == self.default_playlist_id { Err(Error::ReservedPlaylist(id)) } else { Ok(()) }
  }
}
