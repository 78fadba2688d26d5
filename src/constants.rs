//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Catalog
  pub catalog_url: String,
  pub max_results_cap: u32,
  pub watch_url_prefix: String,

  // Persistence service
  pub store_url: String,

  // HTTP client
  pub http_timeout_secs: u64,
  pub http_connect_timeout_secs: u64,

  // mpv IPC
  pub ipc_reply_lines: usize,
  pub ipc_timeout_secs: u64,
  pub ipc_connect_attempts: u32,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
