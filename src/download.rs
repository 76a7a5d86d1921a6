use std::{ffi::OsString, path::Path, time::Duration};

use axum::{
  body::{boxed, StreamBody},
  extract::{Query, State},
  http::{header, StatusCode},
  response::Response,
};
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::{
  state::AppState,
  util::{FileStream, TempFile},
  video_id::VideoId,
  Error, Result,
};

const DEFAULT_MP3_BITRATE: u32 = 192;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
  url: Option<String>,
  title: Option<String>,
  #[serde(rename = "type")]
  kind: Option<String>,
  quality: Option<String>,
  bitrate: Option<String>,
  format_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Media {
  Mp3 {
    bitrate: u32,
  },
  Mp4 {
    max_height: Option<u32>,
    format_id: Option<String>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
  pub video_id: VideoId,
  pub title: String,
  pub media: Media,
}

impl DownloadRequest {
  pub fn from_query(query: DownloadQuery) -> Result<Self> {
    let video_id = VideoId::parse(query.url.as_deref().unwrap_or_default())?;
    let title = sanitize_title(query.title.as_deref().unwrap_or_default());

    let media = match query.kind.as_deref() {
      Some("mp3") => Media::Mp3 {
        bitrate: query
          .bitrate
          .as_deref()
          .and_then(parse_bitrate)
          .unwrap_or(DEFAULT_MP3_BITRATE),
      },
      _ => Media::Mp4 {
        max_height: query.quality.as_deref().and_then(parse_leading_int),
        format_id: query.format_id.filter(|id| FORMAT_ID_REGEX.is_match(id)),
      },
    };

    Ok(Self {
      video_id,
      title,
      media,
    })
  }

  pub fn extension(&self) -> &'static str {
    match self.media {
      Media::Mp3 { .. } => "mp3",
      Media::Mp4 { .. } => "mp4",
    }
  }

  pub fn content_type(&self) -> &'static str {
    match self.media {
      Media::Mp3 { .. } => "audio/mpeg",
      Media::Mp4 { .. } => "video/mp4",
    }
  }

  pub fn content_disposition(&self) -> String {
    format!("attachment; filename=\"{}.{}\"", self.title, self.extension())
  }

  pub fn ytdlp_args(
    &self,
    output: &Path,
    ffmpeg: Option<&Path>,
  ) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![self.video_id.watch_url().into()];

    match &self.media {
      Media::Mp3 { bitrate } => {
        args.extend(
          ["-f", "bestaudio", "-x", "--audio-format", "mp3", "--audio-quality"]
            .map(OsString::from),
        );
        args.push(format!("{bitrate}K").into());
      }
      Media::Mp4 {
        max_height,
        format_id,
      } => {
        args.push("-f".into());
        args.push(format_selector(*max_height, format_id.as_deref()).into());
        args.extend(["--merge-output-format", "mp4"].map(OsString::from));
      }
    }

    if let Some(ffmpeg) = ffmpeg {
      args.push("--ffmpeg-location".into());
      args.push(ffmpeg.into());
    }

    args.push("-o".into());
    args.push(output.into());
    args.extend(["--no-warnings", "--quiet", "--no-part"].map(OsString::from));
    args
  }
}

fn format_selector(max_height: Option<u32>, format_id: Option<&str>) -> String {
  let mut selector = String::new();
  if let Some(id) = format_id {
    selector.push_str(&format!("{id}+bestaudio/{id}/"));
  }
  match max_height {
    Some(h) => selector.push_str(&format!(
      "bestvideo[height<={h}]+bestaudio/best[height<={h}]"
    )),
    None => selector.push_str("bestvideo+bestaudio/best"),
  }
  selector
}

static FORMAT_ID_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("regex is hard-coded"));

// "1080p" -> 1080, the way browsers hand the height back to us
fn parse_leading_int(s: &str) -> Option<u32> {
  let s = s.trim_start();
  let end = s
    .find(|c: char| !c.is_ascii_digit())
    .unwrap_or(s.len());
  s[..end].parse().ok().filter(|n| *n > 0)
}

fn parse_bitrate(s: &str) -> Option<u32> {
  let bitrate: f64 = s.trim().parse().ok()?;
  (1.0..=u32::MAX as f64)
    .contains(&bitrate)
    .then(|| bitrate.round() as u32)
}

// keeps only characters that are safe inside a quoted header value
pub fn sanitize_title(title: &str) -> String {
  let title: String = title
    .chars()
    .filter_map(|c| match c {
      c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
      c if c.is_whitespace() => Some(' '),
      _ => None,
    })
    .collect();

  match title.trim() {
    "" => "video".to_string(),
    t => t.to_string(),
  }
}

pub async fn get_download(
  State(state): State<AppState>,
  Query(query): Query<DownloadQuery>,
) -> Result<Response> {
  let req = DownloadRequest::from_query(query)?;
  let temp_file =
    TempFile::allocate(&state.config.temp_dir, req.extension())?;

  info!(
    "downloading {} as {:?} to {}",
    req.video_id,
    req.media,
    temp_file.path().display()
  );

  let args =
    req.ytdlp_args(temp_file.path(), state.config.ffmpeg_path.as_deref());
  state.ytdlp.download(args).await?;

  if !temp_file.exists() {
    return Err(Error::Download("yt-dlp produced no output file".into()));
  }
  let (file, len) = temp_file.open().await?;
  info!("streaming {} ({} bytes)", req.video_id, len);

  let stream = paced(
    FileStream::new(file, temp_file),
    state.config.stream_chunk_delay,
  );

  Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, req.content_type())
    .header(header::CONTENT_DISPOSITION, req.content_disposition())
    .header(header::CONTENT_LENGTH, len)
    .body(boxed(StreamBody::new(stream)))
    .map_err(|e| Error::Server(e.to_string()))
}

fn paced(
  stream: FileStream,
  delay: Duration,
) -> BoxStream<'static, std::io::Result<Bytes>> {
  if delay.is_zero() {
    return stream.boxed();
  }

  stream
    .then(move |chunk| async move {
      tokio::time::sleep(delay).await;
      chunk
    })
    .boxed()
}


#[cfg(all(test, unix))]
mod handler_test {
  use axum::response::IntoResponse;

  use super::*;
  use crate::testing::{body_bytes, body_json, fake_ytdlp, test_state};

  // writes its arguments next to the script and the payload to the `-o` path
  const WRITES_OUTPUT: &str = r#"dir=$(dirname "$0")
echo "$@" > "$dir/args"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then shift; out="$1"; fi
  shift
done
printf 'fake media payload' > "$out""#;

  async fn call(
    state: AppState,
    pairs: &[(&str, &str)],
  ) -> axum::response::Response {
    let query = super::test::query(pairs);
    get_download(State(state), Query(query))
      .await
      .into_response()
  }

  fn staged_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
      .unwrap()
      .map(|e| e.unwrap().file_name().into_string().unwrap())
      .filter(|name| name.starts_with("saveclip-"))
      .collect()
  }

  #[tokio::test]
  async fn test_download_streams_and_cleans_up() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(bin.path(), WRITES_OUTPUT);
    let state = test_state(ytdlp, staging.path());

    let resp = call(
      state,
      &[
        ("url", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
        ("title", "My Clip!"),
        ("type", "video-only"),
        ("quality", "480"),
      ],
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
      headers[header::CONTENT_DISPOSITION],
      "attachment; filename=\"My Clip.mp4\""
    );
    assert_eq!(headers[header::CONTENT_LENGTH], "18");

    let body = body_bytes(resp).await;
    assert_eq!(&body[..], b"fake media payload");
    assert!(staged_files(staging.path()).is_empty());

    let args = std::fs::read_to_string(bin.path().join("args")).unwrap();
    assert!(args.starts_with("https://www.youtube.com/watch?v=dQw4w9WgXcQ -f"));
    assert!(args.contains("bestvideo[height<=480]+bestaudio/best[height<=480]"));
  }

  #[tokio::test]
  async fn test_download_paced_mp3() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(bin.path(), WRITES_OUTPUT);
    let mut state = test_state(ytdlp, staging.path());
    let mut config = (*state.config).clone();
    config.stream_chunk_delay = Duration::from_millis(1);
    state.config = std::sync::Arc::new(config);

    let resp = call(
      state,
      &[
        ("url", "https://youtu.be/dQw4w9WgXcQ"),
        ("type", "mp3"),
        ("bitrate", "128"),
      ],
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
      resp.headers()[header::CONTENT_DISPOSITION],
      "attachment; filename=\"video.mp3\""
    );
    assert_eq!(&body_bytes(resp).await[..], b"fake media payload");
    assert!(staged_files(staging.path()).is_empty());

    let args = std::fs::read_to_string(bin.path().join("args")).unwrap();
    assert!(args.contains("--audio-quality 128K"));
  }

  #[tokio::test]
  async fn test_download_tool_failure() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(
      bin.path(),
      "echo 'ERROR: Requested format is not available' >&2\nexit 1",
    );
    let state = test_state(ytdlp, staging.path());

    let resp =
      call(state, &[("url", "https://youtu.be/dQw4w9WgXcQ")]).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["error"], "Download failed");
    assert!(staged_files(staging.path()).is_empty());
  }

  #[tokio::test]
  async fn test_download_failure_removes_partial_output() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(
      bin.path(),
      r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then shift; out="$1"; fi
  shift
done
printf 'half' > "$out"
exit 2"#,
    );
    let state = test_state(ytdlp, staging.path());

    let resp =
      call(state, &[("url", "https://youtu.be/dQw4w9WgXcQ")]).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(staged_files(staging.path()).is_empty());
  }

  #[tokio::test]
  async fn test_download_failure_removes_format_parts() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(
      bin.path(),
      r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then shift; out="$1"; fi
  shift
done
printf 'video' > "${out%.mp4}.f137.mp4"
printf 'audio' > "${out%.mp4}.f140.m4a"
exit 1"#,
    );
    let state = test_state(ytdlp, staging.path());

    let resp = call(
      state,
      &[("url", "https://youtu.be/dQw4w9WgXcQ"), ("quality", "1080")],
    )
    .await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(staged_files(staging.path()).is_empty());
  }

  #[tokio::test]
  async fn test_download_abandoned_kills_tool() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(
      bin.path(),
      r#"dir=$(dirname "$0")
sleep 1
touch "$dir/finished""#,
    );
    let state = test_state(ytdlp, staging.path());

    // the client going away drops the handler future mid-download
    let res = tokio::time::timeout(
      Duration::from_millis(200),
      call(state, &[("url", "https://youtu.be/dQw4w9WgXcQ")]),
    )
    .await;
    assert!(res.is_err());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!bin.path().join("finished").exists());
    assert!(staged_files(staging.path()).is_empty());
  }

  #[tokio::test]
  async fn test_download_missing_output() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(bin.path(), "exit 0");
    let state = test_state(ytdlp, staging.path());

    let resp =
      call(state, &[("url", "https://youtu.be/dQw4w9WgXcQ")]).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["error"], "Download failed");
  }

  #[tokio::test]
  async fn test_download_tool_missing() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let state = test_state(bin.path().join("no-such-yt-dlp"), staging.path());

    let resp =
      call(state, &[("url", "https://youtu.be/dQw4w9WgXcQ")]).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["error"], "Download process crashed");
  }

  #[tokio::test]
  async fn test_download_invalid_url() {
    let bin = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let ytdlp = fake_ytdlp(bin.path(), WRITES_OUTPUT);
    let state = test_state(ytdlp, staging.path());

    let resp = call(state, &[("url", "https://example.com")]).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "Invalid YouTube URL");
    assert!(!bin.path().join("args").exists());
  }
}
