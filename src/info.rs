use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  format::{AudioFormat, VideoFormat},
  state::AppState,
  util::race_ordered_first_ok,
  video_id::VideoId,
  Error, Result,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
  pub title: String,
  pub thumbnail: String,
  pub duration: String,
  pub duration_seconds: u64,
  pub author: String,
  pub views: String,
  pub video_formats: Vec<VideoFormat>,
  pub audio_formats: Vec<AudioFormat>,
}

impl VideoInfo {
  pub fn quality_labels(&self) -> Vec<&str> {
    self
      .video_formats
      .iter()
      .map(|f| f.quality.as_str())
      .collect()
  }
}

#[derive(Debug, Deserialize)]
pub struct InfoReq {
  url: Option<String>,
}

// a missing or malformed body is reported like an invalid url
pub async fn post_info(
  State(state): State<AppState>,
  req: Option<Json<InfoReq>>,
) -> Result<Json<VideoInfo>> {
  let url = req.and_then(|Json(req)| req.url).unwrap_or_default();
  let video_id = VideoId::parse(&url)?;
  let video_id = &video_id;

  let futs = state
    .extractors
    .iter()
    .map(|extractor| async move {
      extractor.fetch_info(video_id).await.map_err(|e| {
        info!("{} failed for {}: {}", extractor.name(), video_id, e);
        e
      })
    })
    .collect::<Vec<_>>();
  let info = race_ordered_first_ok(futs).await.map_err(|e| match e {
    Error::InvalidUrl(_) | Error::Extraction(_) => e,
    other => Error::Extraction(other.to_string()),
  })?;

  info!(
    "fetched {:?} ({}s), qualities: {}",
    info.title,
    info.duration_seconds,
    info.quality_labels().join(", ")
  );

  Ok(Json(info))
}
