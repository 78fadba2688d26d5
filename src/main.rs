mod app;
mod config;
mod constants;
mod duration;
mod error;
mod http;
mod models;
mod player;
mod playlist;
mod search;
mod store;
mod youtube;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use directories::ProjectDirs;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use config::Config;
use constants::constants;
use models::{PlaylistId, format_offset};
use player::MpvPlayer;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Config file to use instead of the platform default
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log to stderr instead of the log file
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Search the catalog and show merged results
  Search {
    query: Vec<String>,
    /// Maximum number of results (capped at the catalog page size)
    #[arg(short = 'n', long)]
    max: Option<u32>,
  },
  /// List playlists
  Playlists,
  /// Show one playlist and its members
  Show { id: PlaylistId },
  /// Add a video to a playlist (default: the Watch Later playlist)
  Add {
    video_id: String,
    #[arg(short, long)]
    playlist: Option<PlaylistId>,
  },
  /// Create a playlist holding a video; the video also joins Watch Later
  Create { video_id: String, name: String },
  /// Rename a playlist
  Rename { id: PlaylistId, name: String },
  /// Delete a playlist
  Delete { id: PlaylistId },
  /// Play a video in mpv, resuming from its bookmark. Enter records a bookmark, `q` quits
  Watch {
    video_id: String,
    /// Control an mpv already started with --input-ipc-server=<SOCKET> instead of spawning one
    #[arg(long)]
    socket: Option<String>,
  },
  /// Write a default config file
  Init {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
  },
  /// Print shell completions
  Completions { shell: clap_complete::Shell },
}

// --- Logging ---

/// Install the tracing subscriber. The returned guard must live until exit to flush the log file.
fn init_logging(verbose: bool) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ytlist=info"));
  let log_dir = ProjectDirs::from("", "", "ytlist").map(|dirs| dirs.data_local_dir().to_path_buf());

  match log_dir {
    Some(dir) if !verbose && std::fs::create_dir_all(&dir).is_ok() => {
      let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, "ytlist.log"));
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();
      Some(guard)
    }
    _ => {
      tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();
      None
    }
  }
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Command::Completions { shell } = args.command {
    clap_complete::generate(shell, &mut Args::command(), "ytlist", &mut std::io::stdout());
    return Ok(());
  }

  let _guard = init_logging(args.verbose);

  if let Command::Init { force } = args.command {
    return init_config(args.config, force);
  }

  let config = match &args.config {
    Some(path) => Config::load_from(path)?,
    None => Config::load(),
  }
  .with_env();
  info!(store = %config.store_url, default_playlist = config.default_playlist_id, "starting");

  let result = run(App::new(config)?, args.command).await;
  if let Err(ref e) = result {
    error!(err = ?e, "command failed");
  }
  result
}

async fn run(mut app: App, command: Command) -> Result<()> {
  match command {
    Command::Search { query, max } => {
      let session = app.search(&query.join(" "), max).await?;
      if session.videos.is_empty() {
        println!("No results found.");
      }
      for (idx, video) in session.videos.iter().enumerate() {
        println!("{:>2}. {}  {}  [{}]", idx + 1, video.external_id(), video.title, video.display_duration());
      }
    }
    Command::Playlists => {
      let default_id = app.assigner.default_playlist_id();
      for playlist in app.assigner.list_playlists().await.context("Failed to list playlists")? {
        let marker = if playlist.id == default_id { " (default)" } else { "" };
        println!("{:>4}  {}{}", playlist.id, playlist.name, marker);
      }
    }
    Command::Show { id } => {
      let playlist = app.assigner.get_playlist(id).await?;
      println!("{}  {} ({} videos)", playlist.id, playlist.name, playlist.members.len());
      for member in &playlist.members {
        println!("  {}{}", constants().watch_url_prefix, member);
      }
    }
    Command::Add { video_id, playlist } => {
      let video = app.resolve_video(&video_id).await?;
      let target = match playlist {
        Some(id) => {
          app.assigner.add_to_playlist(&video, id).await?;
          id
        }
        None => {
          app.assigner.add_to_default(&video).await?;
          app.assigner.default_playlist_id()
        }
      };
      println!("Added '{}' to playlist {}", video.title, target);
    }
    Command::Create { video_id, name } => {
      let video = app.resolve_video(&video_id).await?;
      let id = app.assigner.create_playlist_and_assign(&video, &name).await?;
      println!("Created playlist {} '{}' with '{}' (also in playlist {})", id, name, video.title, app.assigner.default_playlist_id());
    }
    Command::Rename { id, name } => {
      let playlist = app.assigner.rename_playlist(id, &name).await?;
      println!("Renamed playlist {} to '{}'", playlist.id, playlist.name);
    }
    Command::Delete { id } => {
      app.assigner.delete_playlist(id).await?;
      println!("Deleted playlist {}", id);
    }
    Command::Watch { video_id, socket } => watch(&app, &video_id, socket).await?,
    Command::Completions { .. } | Command::Init { .. } => {}
  }
  Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
  let path = path.or_else(Config::default_path).context("Could not determine config directory")?;
  if path.exists() && !force {
    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
  }
  Config::default().save_to(&path)?;
  info!(path = %path.display(), "config written");
  println!("Wrote {}", path.display());
  Ok(())
}

async fn watch(app: &App, video_id: &str, socket: Option<String>) -> Result<()> {
  let mut video = app.resolve_video(video_id).await?;

  // A spawned mpv starts at the bookmark; an attached one has to seek there.
  let (mut player, resumed) = match socket {
    Some(socket) => {
      let player = MpvPlayer::attach(socket);
      player.wait_until_ready().await?;
      let resumed = app.recorder.resume(&player, &video).await?;
      (player, resumed)
    }
    None => {
      let url = format!("{}{}", constants().watch_url_prefix, video.external_id());
      let mut player = MpvPlayer::new();
      player.play(&url, video.bookmark_seconds()).await?;
      player.wait_until_ready().await?;
      (player, video.bookmark_seconds().is_some_and(|s| s.is_finite() && s > 0.0))
    }
  };
  if resumed {
    println!("Resumed '{}' at {}", video.title, format_offset(video.bookmark_seconds().unwrap_or_default()));
  } else {
    println!("Playing '{}'", video.title);
  }
  println!("Press Enter to bookmark the current position, q + Enter to quit.");

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
    if line.trim().eq_ignore_ascii_case("q") {
      break;
    }
    match app.recorder.record_bookmark(&player, &mut video).await {
      Ok(offset) => println!("Bookmarked at {}", format_offset(offset)),
      Err(e) => eprintln!("Bookmark failed: {}", e),
    }
  }

  player.stop().await?;
  Ok(())
}
