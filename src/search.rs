use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::error::{Error, Result};
use crate::models::{Candidate, DetailItem, SearchSession, Video};
use crate::youtube::Catalog;

/// How detail entries are matched back to search candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
  /// The Nth candidate takes the Nth detail entry.
  #[default]
  Positional,
  /// Each candidate takes the detail entry carrying its own id.
  ById,
}

impl MergeStrategy {
  pub fn label(self) -> &'static str {
    match self {
      MergeStrategy::Positional => "positional",
      MergeStrategy::ById => "by_id",
    }
  }
}

/// Both catalog responses for one query, before merging.
#[derive(Debug, Clone, Default)]
pub struct RawSearch {
  pub candidates: Vec<Candidate>,
  pub details: Vec<DetailItem>,
}

/// Merge candidates with their detail entries into display-ready videos.
///
/// The output has exactly one video per candidate, in candidate order, carrying the
/// candidate's id. A missing or duration-less detail entry leaves the duration unknown.
pub fn merge(candidates: Vec<Candidate>, details: &[DetailItem], strategy: MergeStrategy) -> Vec<Video> {
  let by_id: HashMap<&str, &DetailItem> = match strategy {
    MergeStrategy::ById => details.iter().map(|d| (d.video_id.as_str(), d)).collect(),
    MergeStrategy::Positional => HashMap::new(),
  };

  candidates
    .into_iter()
    .enumerate()
    .map(|(idx, candidate)| {
      let detail = match strategy {
        MergeStrategy::Positional => {
          let detail = details.get(idx);
          if let Some(d) = detail
            && !d.video_id.is_empty()
            && d.video_id != candidate.video_id
          {
            warn!(position = idx, candidate = %candidate.video_id, detail = %d.video_id, "merge: positional id mismatch");
          }
          detail
        }
        MergeStrategy::ById => by_id.get(candidate.video_id.as_str()).copied(),
      };
      let raw = detail.and_then(|d| d.raw_duration.as_deref());
      Video::new(candidate.video_id, candidate.title, candidate.thumbnail_url).with_raw_duration(raw)
    })
    .collect()
}

/// Runs the two dependent catalog calls for a query.
#[derive(Clone)]
pub struct QueryExecutor {
  catalog: Arc<dyn Catalog>,
}

impl QueryExecutor {
  pub fn new(catalog: Arc<dyn Catalog>) -> Self {
    Self { catalog }
  }

  /// Search, then fetch details for every candidate in a single batch.
  ///
  /// Fails with [`Error::EmptyDetails`] when the detail call yields nothing at all.
  /// A detail response that merely lacks some ids is passed through for merging.
  pub async fn execute(&self, query: &str, max_results: u32) -> Result<RawSearch> {
    let query = query.trim();
    if query.is_empty() {
      return Err(Error::InvalidQuery("query is empty".to_string()));
    }
    let max_results = max_results.clamp(1, constants().max_results_cap);

    let candidates = self.catalog.search(query, max_results).await?;
    if candidates.is_empty() {
      info!(query = %query, "search returned no candidates");
      return Ok(RawSearch::default());
    }

    let ids: Vec<String> = candidates.iter().map(|c| c.video_id.clone()).collect();
    let details = self.catalog.details(&ids).await?;
    if details.is_empty() {
      return Err(Error::EmptyDetails { query: query.to_string() });
    }
    if details.len() < candidates.len() {
      debug!(candidates = candidates.len(), details = details.len(), "detail response shorter than request");
    }

    Ok(RawSearch { candidates, details })
  }

  /// [`execute`](Self::execute) followed by [`merge`].
  pub async fn search(&self, query: &str, max_results: u32, strategy: MergeStrategy) -> Result<Vec<Video>> {
    let raw = self.execute(query, max_results).await?;
    let videos = merge(raw.candidates, &raw.details, strategy);
    info!(query = %query.trim(), results = videos.len(), strategy = strategy.label(), "search complete");
    Ok(videos)
  }

  /// Resolve a single video by id through the detail call.
  pub async fn lookup(&self, video_id: &str) -> Result<Option<Video>> {
    let details = self.catalog.details(&[video_id.to_string()]).await?;
    Ok(details.into_iter().find(|d| d.video_id == video_id).map(|d| {
      Video::new(d.video_id.clone(), d.title.unwrap_or_else(|| d.video_id.clone()), d.thumbnail_url)
        .with_raw_duration(d.raw_duration.as_deref())
    }))
  }
}

/// Handle for one in-flight query. Only the most recent ticket may update the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
  generation: u64,
  query: String,
}

impl QueryTicket {
  pub fn query(&self) -> &str {
    &self.query
  }
}

/// Owns the current [`SearchSession`] and discards results of superseded queries.
#[derive(Debug, Default)]
pub struct SearchTracker {
  generation: u64,
  session: Option<SearchSession>,
}

impl SearchTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start a query, superseding any query still in flight.
  pub fn begin(&mut self, query: &str) -> QueryTicket {
    self.generation += 1;
    debug!(generation = self.generation, query = %query, "query started");
    QueryTicket { generation: self.generation, query: query.trim().to_string() }
  }

  pub fn is_current(&self, ticket: &QueryTicket) -> bool {
    ticket.generation == self.generation
  }

  /// Replace the session with `videos` if `ticket` is still current.
  /// Returns `false` when the results arrived late and were dropped.
  pub fn complete(&mut self, ticket: QueryTicket, videos: Vec<Video>) -> bool {
    if !self.is_current(&ticket) {
      info!(generation = ticket.generation, latest = self.generation, query = %ticket.query, "discarding stale results");
      return false;
    }
    self.session = Some(SearchSession { query: ticket.query, videos });
    true
  }

  pub fn session(&self) -> Option<&SearchSession> {
    self.session.as_ref()
  }

  /// Look up a video from the current session by id.
  pub fn find(&self, video_id: &str) -> Option<&Video> {
    self.session.as_ref()?.videos.iter().find(|v| v.external_id() == video_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use std::sync::Mutex as StdMutex;

  fn candidate(id: &str) -> Candidate {
    Candidate { video_id: id.to_string(), title: format!("title {}", id), thumbnail_url: None }
  }

  fn detail(id: &str, raw: Option<&str>) -> DetailItem {
    DetailItem { video_id: id.to_string(), raw_duration: raw.map(str::to_string), ..DetailItem::default() }
  }

  /// In-memory catalog recording every call it receives.
  #[derive(Default)]
  struct FakeCatalog {
    candidates: Vec<Candidate>,
    details: Vec<DetailItem>,
    fail_search: bool,
    calls: StdMutex<Vec<String>>,
  }

  impl FakeCatalog {
    fn calls(&self) -> Vec<String> {
      self.calls.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Catalog for FakeCatalog {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Candidate>> {
      self.calls.lock().unwrap().push(format!("search:{}:{}", query, max_results));
      if self.fail_search {
        return Err(Error::Api { status: 503, message: "unavailable".to_string() });
      }
      Ok(self.candidates.iter().take(max_results as usize).cloned().collect())
    }

    async fn details(&self, video_ids: &[String]) -> Result<Vec<DetailItem>> {
      self.calls.lock().unwrap().push(format!("details:{}", video_ids.join(",")));
      Ok(self.details.clone())
    }
  }

  fn executor(catalog: FakeCatalog) -> (QueryExecutor, Arc<FakeCatalog>) {
    let catalog = Arc::new(catalog);
    (QueryExecutor::new(catalog.clone()), catalog)
  }

  // --- merge ---

  #[test]
  fn merge_positional_fills_missing_tail_with_not_available() {
    let videos = merge(vec![candidate("a"), candidate("b")], &[detail("a", Some("PT3M20S"))], MergeStrategy::Positional);
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0].external_id(), "a");
    assert_eq!(videos[0].display_duration(), "3m 20s");
    assert_eq!(videos[1].external_id(), "b");
    assert_eq!(videos[1].display_duration(), "N/A");
  }

  #[test]
  fn merge_positional_keeps_candidate_identity_when_misaligned() {
    let details = [detail("b", Some("PT1M")), detail("a", Some("PT2M"))];
    let videos = merge(vec![candidate("a"), candidate("b")], &details, MergeStrategy::Positional);
    assert_eq!(videos[0].external_id(), "a");
    assert_eq!(videos[0].display_duration(), "1m");
    assert_eq!(videos[1].external_id(), "b");
    assert_eq!(videos[1].display_duration(), "2m");
  }

  #[test]
  fn merge_by_id_reconciles_reordered_details() {
    let details = [detail("b", Some("PT1M")), detail("a", Some("PT2M"))];
    let videos = merge(vec![candidate("a"), candidate("b"), candidate("c")], &details, MergeStrategy::ById);
    assert_eq!(videos[0].display_duration(), "2m");
    assert_eq!(videos[1].display_duration(), "1m");
    assert_eq!(videos[2].display_duration(), "N/A");
  }

  #[test]
  fn merge_malformed_entry_is_not_available() {
    let details = [detail("", None), detail("b", Some("PT7S"))];
    let videos = merge(vec![candidate("a"), candidate("b")], &details, MergeStrategy::Positional);
    assert_eq!(videos[0].display_duration(), "N/A");
    assert_eq!(videos[1].display_duration(), "7s");
  }

  #[test]
  fn merge_does_not_deduplicate() {
    let videos = merge(
      vec![candidate("a"), candidate("a")],
      &[detail("a", Some("PT1S")), detail("a", Some("PT2S"))],
      MergeStrategy::Positional,
    );
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[1].display_duration(), "2s");
  }

  #[test]
  fn merge_preserves_snippet_fields() {
    let mut c = candidate("a");
    c.thumbnail_url = Some("http://img/a.jpg".to_string());
    let videos = merge(vec![c], &[], MergeStrategy::Positional);
    assert_eq!(videos[0].title, "title a");
    assert_eq!(videos[0].thumbnail_url.as_deref(), Some("http://img/a.jpg"));
  }

  #[test]
  fn merge_strategy_deserializes_from_snake_case() {
    #[derive(Deserialize)]
    struct Holder {
      strategy: MergeStrategy,
    }
    let holder: Holder = toml::from_str("strategy = \"by_id\"").unwrap();
    assert_eq!(holder.strategy, MergeStrategy::ById);
  }

  // --- QueryExecutor ---

  #[tokio::test]
  async fn execute_issues_search_then_batched_details() {
    let (executor, catalog) = executor(FakeCatalog {
      candidates: vec![candidate("a"), candidate("b")],
      details: vec![detail("a", Some("PT3M20S"))],
      ..FakeCatalog::default()
    });

    let raw = executor.execute("jazz", 2).await.unwrap();
    assert_eq!(raw.candidates.len(), 2);
    assert_eq!(raw.details.len(), 1);
    assert_eq!(catalog.calls(), vec!["search:jazz:2".to_string(), "details:a,b".to_string()]);
  }

  #[tokio::test]
  async fn search_end_to_end_with_missing_detail() {
    let (executor, _) = executor(FakeCatalog {
      candidates: vec![candidate("a"), candidate("b")],
      details: vec![detail("a", Some("PT3M20S"))],
      ..FakeCatalog::default()
    });

    let videos = executor.search("jazz", 2, MergeStrategy::Positional).await.unwrap();
    let rendered: Vec<(&str, &str)> = videos.iter().map(|v| (v.external_id(), v.display_duration())).collect();
    assert_eq!(rendered, vec![("a", "3m 20s"), ("b", "N/A")]);
  }

  #[tokio::test]
  async fn execute_empty_details_is_hard_failure() {
    let (executor, _) =
      executor(FakeCatalog { candidates: vec![candidate("a")], details: vec![], ..FakeCatalog::default() });

    match executor.execute("jazz", 5).await.unwrap_err() {
      Error::EmptyDetails { query } => assert_eq!(query, "jazz"),
      other => panic!("expected EmptyDetails, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn execute_without_candidates_skips_detail_call() {
    let (executor, catalog) = executor(FakeCatalog::default());
    let raw = executor.execute("nothing", 5).await.unwrap();
    assert!(raw.candidates.is_empty());
    assert_eq!(catalog.calls(), vec!["search:nothing:5".to_string()]);
  }

  #[tokio::test]
  async fn execute_search_failure_propagates_without_detail_call() {
    let (executor, catalog) = executor(FakeCatalog { fail_search: true, ..FakeCatalog::default() });
    let err = executor.execute("jazz", 5).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 503, .. }));
    assert_eq!(catalog.calls().len(), 1);
  }

  #[tokio::test]
  async fn execute_rejects_blank_query() {
    let (executor, catalog) = executor(FakeCatalog::default());
    let err = executor.execute("   ", 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
    assert!(catalog.calls().is_empty());
  }

  #[tokio::test]
  async fn execute_clamps_result_cap() {
    let (executor, catalog) = executor(FakeCatalog::default());
    executor.execute("a", 500).await.unwrap();
    executor.execute("b", 0).await.unwrap();
    assert_eq!(catalog.calls(), vec!["search:a:50".to_string(), "search:b:1".to_string()]);
  }

  #[tokio::test]
  async fn lookup_finds_matching_detail() {
    let mut d = detail("a", Some("PT1H"));
    d.title = Some("Found".to_string());
    let (executor, _) = executor(FakeCatalog { details: vec![d], ..FakeCatalog::default() });

    let video = executor.lookup("a").await.unwrap().unwrap();
    assert_eq!(video.title, "Found");
    assert_eq!(video.display_duration(), "1h");
    assert!(executor.lookup("zzz").await.unwrap().is_none());
  }

  // --- SearchTracker ---

  #[test]
  fn tracker_applies_current_results() {
    let mut tracker = SearchTracker::new();
    let ticket = tracker.begin(" jazz ");
    assert!(tracker.complete(ticket, vec![Video::new("a", "A", None)]));
    let session = tracker.session().unwrap();
    assert_eq!(session.query, "jazz");
    assert_eq!(session.videos.len(), 1);
    assert!(tracker.find("a").is_some());
  }

  #[test]
  fn tracker_discards_superseded_results() {
    let mut tracker = SearchTracker::new();
    let first = tracker.begin("jazz");
    let second = tracker.begin("blues");

    assert!(tracker.complete(second, vec![Video::new("b", "B", None)]));
    assert!(!tracker.complete(first, vec![Video::new("a", "A", None)]));

    let session = tracker.session().unwrap();
    assert_eq!(session.query, "blues");
    assert_eq!(session.videos[0].external_id(), "b");
  }

  #[test]
  fn tracker_late_result_before_newer_completes_is_still_dropped() {
    let mut tracker = SearchTracker::new();
    let first = tracker.begin("jazz");
    let _second = tracker.begin("blues");
    assert!(!tracker.complete(first, vec![Video::new("a", "A", None)]));
    assert!(tracker.session().is_none());
  }

  #[test]
  fn tracker_replaces_session_wholesale() {
    let mut tracker = SearchTracker::new();
    let t1 = tracker.begin("one");
    tracker.complete(t1, vec![Video::new("a", "A", None), Video::new("b", "B", None)]);
    let t2 = tracker.begin("two");
    tracker.complete(t2, vec![Video::new("c", "C", None)]);

    let session = tracker.session().unwrap();
    assert_eq!(session.videos.len(), 1);
    assert!(tracker.find("a").is_none());
  }
}
