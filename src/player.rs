use async_trait::async_trait;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader},
  net::UnixStream,
  process::{Child as TokioChild, Command},
};
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::error::{Error, Result};
use crate::models::Video;
use crate::store::PlaylistStore;

/// Control surface of a running player.
#[async_trait]
pub trait PlayerSurface: Send + Sync {
  /// Current playback position, in seconds from the start.
  async fn current_offset(&self) -> Result<f64>;

  /// Jump to `seconds`. Fire-and-forget: no acknowledgement is awaited beyond the send.
  async fn seek_to(&self, seconds: f64) -> Result<()>;
}

/// mpv driven over its JSON IPC socket.
pub struct MpvPlayer {
  current_process: Option<TokioChild>,
  ipc_socket_path: Option<String>,
  next_request_id: AtomicU64,
}

impl MpvPlayer {
  pub fn new() -> Self {
    Self { current_process: None, ipc_socket_path: None, next_request_id: AtomicU64::new(1) }
  }

  /// Attach to an mpv instance already listening on `socket_path`.
  pub fn attach(socket_path: impl Into<String>) -> Self {
    Self { ipc_socket_path: Some(socket_path.into()), ..Self::new() }
  }

  /// Start playing `url`, optionally from `start` seconds.
  pub async fn play(&mut self, url: &str, start: Option<f64>) -> Result<()> {
    self.stop().await?;

    let socket_path = std::env::temp_dir().join(format!("ytlist-mpv-{}.sock", std::process::id()));
    let socket_path_str =
      socket_path.to_str().ok_or_else(|| Error::Player("temp dir path is not valid UTF-8".to_string()))?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new("mpv");
    cmd.args(mpv_args(&socket_path_str, url, start));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        Error::Player("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)".to_string())
      } else {
        Error::Player(format!("failed to spawn mpv: {}", e))
      }
    })?;

    info!(url = %url, start = ?start, "mpv started");
    self.current_process = Some(child);
    self.ipc_socket_path = Some(socket_path_str);
    Ok(())
  }

  /// Kill an mpv we spawned. An attached instance is left running.
  pub async fn stop(&mut self) -> Result<()> {
    let socket_path = self.ipc_socket_path.take();
    if let Some(mut child) = self.current_process.take() {
      child.kill().await.map_err(|e| Error::Player(format!("failed to kill mpv: {}", e)))?;
      let _ = child.wait().await;
      if let Some(path) = socket_path {
        let _ = std::fs::remove_file(&path);
      }
    }
    Ok(())
  }

  /// Wait until mpv reports a playback position, so seeks are not dropped while loading.
  pub async fn wait_until_ready(&self) -> Result<()> {
    for attempt in 0..constants().ipc_connect_attempts * 3 {
      match self.current_offset().await {
        Ok(_) => return Ok(()),
        Err(e) => {
          debug!(attempt, err = %e, "mpv not ready yet");
          tokio::time::sleep(Duration::from_millis(500)).await;
        }
      }
    }
    Err(Error::Player("mpv did not start playback in time".to_string()))
  }

  /// mpv creates its socket shortly after spawning; retry the connect for a while.
  async fn connect(&self) -> Result<UnixStream> {
    let socket_path = self.ipc_socket_path.as_deref().ok_or_else(|| Error::Player("mpv is not running".to_string()))?;
    let attempts = constants().ipc_connect_attempts;
    let mut last_err = None;
    for attempt in 0..attempts {
      match UnixStream::connect(socket_path).await {
        Ok(stream) => return Ok(stream),
        Err(e) => {
          debug!(attempt, err = %e, "mpv IPC connect failed, retrying");
          last_err = Some(e);
          tokio::time::sleep(Duration::from_millis(200)).await;
        }
      }
    }
    Err(Error::Player(format!(
      "failed to connect to mpv IPC socket: {}",
      last_err.map(|e| e.to_string()).unwrap_or_else(|| "no attempts made".to_string())
    )))
  }

  /// Send one IPC command and wait for the reply carrying the same request id.
  async fn request(&self, command: Value) -> Result<Value> {
    let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
    let mut stream = self.connect().await?;

    let mut line = json!({ "command": &command, "request_id": request_id }).to_string();
    line.push('\n');
    stream.write_all(line.as_bytes()).await.map_err(|e| Error::Player(format!("failed to write to mpv IPC: {}", e)))?;

    let reader = TokioBufReader::new(stream);
    let mut lines = reader.lines();
    let timeout = Duration::from_secs(constants().ipc_timeout_secs);

    // mpv may emit event lines before our response.
    for _ in 0..constants().ipc_reply_lines {
      let line = tokio::time::timeout(timeout, lines.next_line())
        .await
        .map_err(|_| Error::Player("timeout waiting for mpv IPC response".to_string()))?
        .map_err(|e| Error::Player(format!("failed to read from mpv IPC: {}", e)))?;
      let Some(line) = line else { break };

      if let Ok(val) = serde_json::from_str::<Value>(&line)
        && val.get("request_id").and_then(|v| v.as_u64()) == Some(request_id)
      {
        return match val.get("error").and_then(|v| v.as_str()) {
          Some("success") => Ok(val.get("data").cloned().unwrap_or(Value::Null)),
          other => Err(Error::Player(format!("mpv rejected {}: {}", command, other.unwrap_or("unknown error")))),
        };
      }
    }
    Err(Error::Player("mpv IPC closed without a response".to_string()))
  }
}

/// Command line for a spawned mpv. A usable `start` becomes `--start`, so no seek is needed later.
fn mpv_args(socket_path: &str, url: &str, start: Option<f64>) -> Vec<String> {
  let mut args = vec![format!("--input-ipc-server={}", socket_path)];
  if let Some(start) = start.filter(|s| s.is_finite() && *s > 0.0) {
    args.push(format!("--start={:.3}", start));
  }
  args.push("--".to_string());
  args.push(url.to_string());
  args
}

#[async_trait]
impl PlayerSurface for MpvPlayer {
  async fn current_offset(&self) -> Result<f64> {
    let data = self.request(json!(["get_property", "time-pos"])).await?;
    data.as_f64().ok_or_else(|| Error::Player(format!("unexpected time-pos value: {}", data)))
  }

  async fn seek_to(&self, seconds: f64) -> Result<()> {
    self.request(json!(["seek", seconds, "absolute"])).await?;
    Ok(())
  }
}

/// Captures the live playback position of a video and persists it.
pub struct BookmarkRecorder {
  store: Arc<dyn PlaylistStore>,
}

impl BookmarkRecorder {
  pub fn new(store: Arc<dyn PlaylistStore>) -> Self {
    Self { store }
  }

  /// Read the player's position now and store it as `video`'s bookmark.
  ///
  /// `video` is only updated once the store accepted the new offset.
  pub async fn record_bookmark(&self, player: &dyn PlayerSurface, video: &mut Video) -> Result<f64> {
    let offset = player.current_offset().await?;
    if !offset.is_finite() || offset < 0.0 {
      return Err(Error::InvalidOffset(offset));
    }

    let stored = self.store.update_bookmark(video, offset).await?;
    if stored.bookmark_seconds() != Some(offset) {
      warn!(video_id = %video.external_id(), sent = offset, stored = ?stored.bookmark_seconds(), "store echoed a different bookmark");
    }
    video.set_bookmark(offset);
    info!(video_id = %video.external_id(), offset, "bookmark recorded");
    Ok(offset)
  }

  /// Seek to `video`'s bookmark, if it has one. Returns whether a seek was issued.
  pub async fn resume(&self, player: &dyn PlayerSurface, video: &Video) -> Result<bool> {
    let Some(offset) = video.bookmark_seconds() else {
      return Ok(false);
    };
    player.seek_to(offset).await?;
    debug!(video_id = %video.external_id(), offset, "seek to bookmark");
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::playlist::tests::MemoryStore;
  use std::sync::Mutex as StdMutex;
  use tokio::net::UnixListener;

  /// Player whose position moves between reads, like a live one.
  struct FakePlayer {
    offsets: StdMutex<Vec<f64>>,
    seeks: StdMutex<Vec<f64>>,
  }

  impl FakePlayer {
    fn new(offsets: &[f64]) -> Self {
      Self { offsets: StdMutex::new(offsets.iter().rev().copied().collect()), seeks: StdMutex::new(Vec::new()) }
    }
  }

  #[async_trait]
  impl PlayerSurface for FakePlayer {
    async fn current_offset(&self) -> Result<f64> {
      self.offsets.lock().unwrap().pop().ok_or_else(|| Error::Player("stopped".to_string()))
    }

    async fn seek_to(&self, seconds: f64) -> Result<()> {
      self.seeks.lock().unwrap().push(seconds);
      Ok(())
    }
  }

  fn recorder(store: MemoryStore) -> (BookmarkRecorder, Arc<MemoryStore>) {
    let store = Arc::new(store);
    (BookmarkRecorder::new(store.clone()), store)
  }

  #[tokio::test]
  async fn record_bookmark_reads_live_offset_each_call() {
    let (recorder, store) = recorder(MemoryStore::default());
    let player = FakePlayer::new(&[12.5, 98.0]);
    let mut video = Video::new("a", "A", None);

    assert_eq!(recorder.record_bookmark(&player, &mut video).await.unwrap(), 12.5);
    assert_eq!(video.bookmark_seconds(), Some(12.5));
    assert_eq!(recorder.record_bookmark(&player, &mut video).await.unwrap(), 98.0);
    assert_eq!(video.bookmark_seconds(), Some(98.0));

    let stored = store.find_video("a").await.unwrap().unwrap();
    assert_eq!(stored.bookmark_seconds(), Some(98.0));
  }

  #[tokio::test]
  async fn record_bookmark_store_failure_leaves_video_untouched() {
    let (recorder, _) = recorder(MemoryStore { fail_update: true, ..MemoryStore::default() });
    let player = FakePlayer::new(&[30.0]);
    let mut video = Video::new("a", "A", None).with_bookmark(Some(5.0));

    let err = recorder.record_bookmark(&player, &mut video).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));
    assert_eq!(video.bookmark_seconds(), Some(5.0));
  }

  #[tokio::test]
  async fn record_bookmark_rejects_negative_offset() {
    let (recorder, store) = recorder(MemoryStore::default());
    let player = FakePlayer::new(&[-1.0]);
    let mut video = Video::new("a", "A", None);

    assert!(matches!(recorder.record_bookmark(&player, &mut video).await.unwrap_err(), Error::InvalidOffset(_)));
    assert!(store.find_video("a").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn record_bookmark_player_failure_propagates() {
    let (recorder, _) = recorder(MemoryStore::default());
    let player = FakePlayer::new(&[]);
    let mut video = Video::new("a", "A", None);

    assert!(matches!(recorder.record_bookmark(&player, &mut video).await.unwrap_err(), Error::Player(_)));
    assert_eq!(video.bookmark_seconds(), None);
  }

  #[tokio::test]
  async fn resume_seeks_to_bookmark() {
    let (recorder, _) = recorder(MemoryStore::default());
    let player = FakePlayer::new(&[]);

    assert!(recorder.resume(&player, &Video::new("a", "A", None).with_bookmark(Some(61.0))).await.unwrap());
    assert!(!recorder.resume(&player, &Video::new("b", "B", None)).await.unwrap());
    assert_eq!(*player.seeks.lock().unwrap(), vec![61.0]);
  }

  /// Serve one mpv-style IPC connection: an event line, then the reply to the request.
  async fn serve_once(listener: UnixListener, reply: impl Fn(&Value) -> Value + Send + 'static) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
      let (stream, _) = listener.accept().await.unwrap();
      let (read, mut write) = stream.into_split();
      let mut lines = TokioBufReader::new(read).lines();
      let request: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
      write.write_all(b"{\"event\":\"playback-restart\"}\n").await.unwrap();
      let mut response = reply(&request);
      response["request_id"] = request["request_id"].clone();
      write.write_all(format!("{}\n", response).as_bytes()).await.unwrap();
    })
  }

  #[tokio::test]
  async fn mpv_current_offset_reads_time_pos() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("mpv.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let server = serve_once(listener, |request| {
      assert_eq!(request["command"], json!(["get_property", "time-pos"]));
      json!({"data": 73.25, "error": "success"})
    })
    .await;

    let player = MpvPlayer::attach(socket.to_str().unwrap());
    assert_eq!(player.current_offset().await.unwrap(), 73.25);
    server.await.unwrap();
  }

  #[tokio::test]
  async fn mpv_seek_sends_absolute_seek() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("mpv.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let server = serve_once(listener, |request| {
      assert_eq!(request["command"], json!(["seek", 42.0, "absolute"]));
      json!({"error": "success"})
    })
    .await;

    let player = MpvPlayer::attach(socket.to_str().unwrap());
    player.seek_to(42.0).await.unwrap();
    server.await.unwrap();
  }

  #[tokio::test]
  async fn mpv_error_reply_is_player_error() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("mpv.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let server = serve_once(listener, |_| json!({"error": "property unavailable"})).await;

    let player = MpvPlayer::attach(socket.to_str().unwrap());
    let err = player.current_offset().await.unwrap_err();
    assert!(err.to_string().contains("property unavailable"));
    server.await.unwrap();
  }

  #[test]
  fn mpv_args_start_at_bookmark() {
    let args = mpv_args("/tmp/s.sock", "https://www.youtube.com/watch?v=a", Some(61.5));
    assert_eq!(args, vec!["--input-ipc-server=/tmp/s.sock", "--start=61.500", "--", "https://www.youtube.com/watch?v=a"]);
  }

  #[test]
  fn mpv_args_without_usable_start() {
    for start in [None, Some(0.0), Some(-4.0), Some(f64::NAN)] {
      let args = mpv_args("/tmp/s.sock", "u", start);
      assert_eq!(args, vec!["--input-ipc-server=/tmp/s.sock", "--", "u"], "{:?}", start);
    }
  }

  #[tokio::test]
  async fn stop_leaves_attached_socket_alone() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("mpv.sock");
    let _listener = UnixListener::bind(&socket).unwrap();

    let mut player = MpvPlayer::attach(socket.to_str().unwrap());
    player.stop().await.unwrap();
    assert!(socket.exists());
    assert!(matches!(player.current_offset().await.unwrap_err(), Error::Player(_)));
  }

  #[tokio::test]
  async fn mpv_without_socket_is_not_running() {
    let player = MpvPlayer::new();
    assert!(matches!(player.current_offset().await.unwrap_err(), Error::Player(_)));
  }
}
