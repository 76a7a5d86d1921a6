use std::{
  collections::HashMap,
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{
  body::HttpBody, extract::Query, response::Response, routing::get, Json,
  Router,
};
use bytes::Bytes;
use serde_json::json;

use crate::{config::Config, extractor::OEmbed, state::AppState};

#[cfg(unix)]
static SCRIPT_ID: std::sync::atomic::AtomicUsize =
  std::sync::atomic::AtomicUsize::new(0);

// writes an executable shell script standing in for yt-dlp
#[cfg(unix)]
pub fn fake_ytdlp(dir: &Path, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let id = SCRIPT_ID.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
  let path = dir.join(format!("fake-yt-dlp-{id}"));
  std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
    .unwrap();
  path
}

pub fn test_state(ytdlp_path: PathBuf, temp_dir: &Path) -> AppState {
  let config = Config {
    ytdlp_path,
    temp_dir: temp_dir.to_owned(),
    oembed_fallback: false,
    ..Default::default()
  };
  AppState::new(config)
}

// same as `test_state`, with `oembed` queried after yt-dlp
pub fn test_state_with_oembed(
  ytdlp_path: PathBuf,
  temp_dir: &Path,
  oembed: OEmbed,
) -> AppState {
  let mut state = test_state(ytdlp_path, temp_dir);
  let mut extractors = state.extractors.as_ref().clone();
  extractors.push(Arc::new(oembed));
  state.extractors = Arc::new(extractors);
  state
}

// a local oEmbed endpoint at `/oembed` that echoes the requested url as
// the title
pub async fn serve_oembed() -> SocketAddr {
  let app = Router::new().route(
    "/oembed",
    get(|Query(q): Query<HashMap<String, String>>| async move {
      Json(json!({
        "title": q.get("url").cloned().unwrap_or_default(),
        "author_name": "Blender",
        "thumbnail_url": "https://i.ytimg.com/vi/aqz-KE-bpKQ/hqdefault.jpg",
        "type": "video",
      }))
    }),
  );
  let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
    .serve(app.into_make_service());
  let addr = server.local_addr();
  tokio::spawn(server);
  addr
}

pub async fn body_bytes(resp: Response) -> Bytes {
  let mut body = resp.into_body();
  let mut buf = Vec::new();
  while let Some(chunk) = body.data().await {
    buf.extend_from_slice(&chunk.unwrap());
  }
  Bytes::from(buf)
}

pub async fn body_json(resp: Response) -> serde_json::Value {
  serde_json::from_slice(&body_bytes(resp).await).unwrap()
}
