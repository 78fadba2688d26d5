use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::http::build_client;
use crate::models::{SearchSession, Video};
use crate::player::BookmarkRecorder;
use crate::playlist::PlaylistAssigner;
use crate::search::{QueryExecutor, SearchTracker};
use crate::store::{HttpPlaylistStore, PlaylistStore};
use crate::youtube::{Catalog, YoutubeCatalog};

/// Wired-up services for one CLI invocation.
pub struct App {
  pub config: Config,
  /// `None` when no API key is configured; only catalog commands need it.
  executor: Option<QueryExecutor>,
  store: Arc<dyn PlaylistStore>,
  pub assigner: PlaylistAssigner,
  pub recorder: BookmarkRecorder,
  pub tracker: SearchTracker,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let http = build_client().context("Failed to build HTTP client")?;
    let catalog: Option<Arc<dyn Catalog>> = config
      .api_key()
      .ok()
      .map(|key| Arc::new(YoutubeCatalog::new(http.clone(), config.catalog_url.clone(), key)) as Arc<dyn Catalog>);
    let store: Arc<dyn PlaylistStore> = Arc::new(HttpPlaylistStore::new(http, config.store_url.clone()));
    Ok(Self::from_parts(config, catalog, store))
  }

  pub fn from_parts(config: Config, catalog: Option<Arc<dyn Catalog>>, store: Arc<dyn PlaylistStore>) -> Self {
    let assigner =
      PlaylistAssigner::new(store.clone(), config.default_playlist_id).with_rollback(config.rollback_partial);
    Self {
      executor: catalog.map(QueryExecutor::new),
      recorder: BookmarkRecorder::new(store.clone()),
      assigner,
      store,
      tracker: SearchTracker::new(),
      config,
    }
  }

  fn executor(&self) -> Result<&QueryExecutor> {
    match &self.executor {
      Some(executor) => Ok(executor),
      None => Err(self.config.api_key().err().unwrap_or_else(|| anyhow!("catalog unavailable"))),
    }
  }

  /// Run a query and make its results the current session.
  ///
  /// `&mut self` is held for the whole call, so the ticket is always current when it completes.
  /// A failed query leaves the previous session in place.
  pub async fn search(&mut self, query: &str, max_results: Option<u32>) -> Result<&SearchSession> {
    let executor = self.executor()?.clone();
    let ticket = self.tracker.begin(query);
    let videos = executor
      .search(ticket.query(), max_results.unwrap_or(self.config.max_results), self.config.merge_strategy)
      .await
      .with_context(|| format!("Search for '{}' failed", ticket.query()))?;

    self.tracker.complete(ticket, videos);
    self.tracker.session().ok_or_else(|| anyhow!("No search session"))
  }

  /// Find a video by id: current session first, then the store (which knows bookmarks),
  /// then the catalog.
  pub async fn resolve_video(&self, video_id: &str) -> Result<Video> {
    if let Some(video) = self.tracker.find(video_id) {
      return Ok(video.clone());
    }
    if let Some(video) = self.store.find_video(video_id).await.context("Failed to look up stored video")? {
      debug!(video_id = %video_id, "resolved from store");
      return Ok(video);
    }
    let video = self
      .executor()?
      .lookup(video_id)
      .await
      .context("Failed to look up video in catalog")?
      .ok_or_else(|| anyhow!("Video '{}' not found", video_id))?;
    info!(video_id = %video_id, "resolved from catalog");
    Ok(video)
  }
}
