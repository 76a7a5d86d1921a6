use std::{
  ffi::OsString,
  path::PathBuf,
  process::{Output, Stdio},
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
  process::Command,
  sync::{Semaphore, SemaphorePermit},
};
use tracing::{debug, warn};

use crate::{
  config::Config,
  format::{audio_formats, video_formats, RawFormat},
  info::VideoInfo,
  util::{
    humanize::{format_duration, format_views},
    redact_proxy,
  },
  video_id::VideoId,
  Error, Result,
};

use super::Extractor;

// runs the yt-dlp command line, both for metadata and for downloads.
// yt-dlp in turn drives ffmpeg to merge separate audio and video streams.
pub struct Ytdlp {
  path: PathBuf,
  proxy: Option<String>,
  // limits how many yt-dlp processes run at a time
  permits: Semaphore,
}

#[derive(Debug, Deserialize)]
struct RawVideo {
  title: Option<String>,
  duration: Option<f64>,
  uploader: Option<String>,
  channel: Option<String>,
  view_count: Option<u64>,
  thumbnail: Option<String>,
  #[serde(default)]
  thumbnails: Vec<RawThumbnail>,
  #[serde(default)]
  formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
  url: String,
}

impl Ytdlp {
  pub fn new(config: &Config) -> Self {
    Self {
      path: config.ytdlp_path.clone(),
      proxy: config.ytdlp_proxy.clone(),
      permits: Semaphore::new(config.ytdlp_concurrency),
    }
  }

  fn command(&self) -> Command {
    let mut cmd = Command::new(&self.path);
    if let Some(proxy) = &self.proxy {
      debug!("using proxy: {}", redact_proxy(proxy));
      cmd.arg("--proxy").arg(proxy);
    }
    cmd
      .stdin(Stdio::null())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    cmd
  }

  async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
    self
      .permits
      .acquire()
      .await
      .map_err(|e| Error::Server(e.to_string()))
  }

  pub async fn version(&self) -> Result<String> {
    let output = Command::new(&self.path)
      .arg("--version")
      .stdin(Stdio::null())
      .output()
      .await?;
    if !output.status.success() {
      return Err(Error::Server(format!(
        "yt-dlp --version exited with {}",
        output.status
      )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  async fn dump_json(&self, video_id: &VideoId) -> Result<RawVideo> {
    let mut cmd = self.command();
    cmd
      .arg(video_id.watch_url())
      .arg("--dump-json")
      .arg("--no-warnings")
      .arg("--no-download")
      .arg("--no-playlist")
      .stdout(Stdio::piped());

    let guard = self.acquire().await?;
    let output = cmd.output().await.map_err(|e| {
      Error::Extraction(format!("failed to run {}: {}", self.path.display(), e))
    })?;
    drop(guard);

    check_status(&output).map_err(Error::Extraction)?;
    serde_json::from_slice(&output.stdout)
      .map_err(|e| Error::Extraction(format!("invalid yt-dlp output: {e}")))
  }

  /// Runs yt-dlp to completion with the given arguments. The output is
  /// expected to be written to a file named in `args`.
  pub async fn download(&self, args: Vec<OsString>) -> Result<()> {
    let mut cmd = self.command();
    cmd.args(args).stdout(Stdio::null());

    let guard = self.acquire().await?;
    let child = cmd.spawn().map_err(Error::ProcessCrashed)?;
    let output = child.wait_with_output().await?;
    drop(guard);

    check_status(&output).map_err(Error::Download)
  }
}

fn check_status(output: &Output) -> std::result::Result<(), String> {
  if output.status.success() {
    return Ok(());
  }

  let stderr = String::from_utf8_lossy(&output.stderr);
  for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
    warn!("yt-dlp stderr: {}", line);
  }
  Err(format!("yt-dlp exited with {}", output.status))
}

#[async_trait]
impl Extractor for Ytdlp {
  fn name(&self) -> &'static str {
    "yt-dlp"
  }

  async fn fetch_info(&self, video_id: &VideoId) -> Result<VideoInfo> {
    let raw = self.dump_json(video_id).await?;
    Ok(raw.into())
  }
}

impl From<RawVideo> for VideoInfo {
  fn from(v: RawVideo) -> Self {
    let duration = v.duration.filter(|d| d.is_finite() && *d > 0.0);
    let duration_seconds = duration.map(|d| d as u64).unwrap_or(0);
    let thumbnail = v
      .thumbnails
      .last()
      .map(|t| t.url.clone())
      .or(v.thumbnail)
      .unwrap_or_default();
    let author = non_empty(v.uploader)
      .or(non_empty(v.channel))
      .unwrap_or_else(|| "Unknown".to_string());

    Self {
      title: non_empty(v.title).unwrap_or_else(|| "Unknown".to_string()),
      thumbnail,
      duration: format_duration(duration_seconds),
      duration_seconds,
      author,
      views: format_views(v.view_count.unwrap_or(0)),
      video_formats: video_formats(&v.formats, duration.unwrap_or(0.0)),
      audio_formats: audio_formats(),
    }
  }
}

fn non_empty(s: Option<String>) -> Option<String> {
  s.filter(|s| !s.trim().is_empty())
}
