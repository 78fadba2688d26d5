use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::constants::constants;
use crate::error::{Error, Result};

/// Build the HTTP client shared by the catalog and store adapters.
pub fn build_client() -> Result<Client> {
  let c = constants();
  let client = Client::builder()
    .timeout(Duration::from_secs(c.http_timeout_secs))
    .connect_timeout(Duration::from_secs(c.http_connect_timeout_secs))
    .user_agent(format!("ytlist/{}", env!("CARGO_PKG_VERSION")))
    .build()?;
  Ok(client)
}

/// Append `segments` to the path of `base`, each percent-encoded as a single segment,
/// then append query parameters.
pub fn endpoint(base: &str, segments: &[&str], params: &[(&str, &str)]) -> Result<Url> {
  if let Some(bad) = segments.iter().find(|s| s.is_empty() || **s == "." || **s == "..") {
    return Err(Error::InvalidId(bad.to_string()));
  }

  let mut url = Url::parse(base).map_err(|e| Error::Config(format!("invalid service URL '{}': {}", base, e)))?;
  url
    .path_segments_mut()
    .map_err(|_| Error::Config(format!("service URL '{}' cannot take a path", base)))?
    .pop_if_empty()
    .extend(segments);
  if !params.is_empty() {
    url.query_pairs_mut().extend_pairs(params);
  }
  Ok(url)
}

/// Decode a successful JSON response, or turn a failed one into [`Error::Api`].
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
  if !response.status().is_success() {
    return Err(Error::from_response(response).await);
  }
  let url = response.url().clone();
  let body = response.bytes().await?;
  serde_json::from_slice(&body).map_err(|e| Error::Parse(format!("{} ({})", e, url.path())))
}

/// Accept any success status and discard the body.
pub async fn expect_success(response: Response) -> Result<()> {
  if response.status().is_success() { Ok(()) } else { Err(Error::from_response(response).await) }
}
