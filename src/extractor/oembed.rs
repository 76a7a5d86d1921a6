use async_trait::async_trait;

use crate::{
  format::audio_formats,
  info::VideoInfo,
  util::humanize::{format_duration, format_views},
  video_id::VideoId,
  Result,
};

use super::Extractor;

const YOUTUBE_OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

// Best-effort fallback when yt-dlp is unavailable or blocked. oEmbed
// only knows the title, author and thumbnail, so no video formats are
// offered; the fixed mp3 presets still are.
pub struct OEmbed {
  client: reqwest::Client,
  endpoint: String,
}

impl OEmbed {
  pub fn new() -> Self {
    Self::with_endpoint(YOUTUBE_OEMBED_ENDPOINT)
  }

  pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      endpoint: endpoint.into(),
    }
  }
}

impl Default for OEmbed {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Extractor for OEmbed {
  fn name(&self) -> &'static str {
    "oembed"
  }

  async fn fetch_info(&self, video_id: &VideoId) -> Result<VideoInfo> {
    use serde_query::{DeserializeQuery, Query};

    #[derive(DeserializeQuery)]
    struct OEmbedResp {
      #[query(".title")]
      title: String,
      #[query(".author_name")]
      author: String,
      #[query(".thumbnail_url")]
      thumbnail: String,
    }

    let watch_url = video_id.watch_url();
    let resp: OEmbedResp = self
      .client
      .get(&self.endpoint)
      .query(&[("url", watch_url.as_str()), ("format", "json")])
      .header("User-Agent", "Mozilla/5.0")
      .send()
      .await?
      .error_for_status()?
      .json::<Query<OEmbedResp>>()
      .await?
      .into();

    Ok(VideoInfo {
      title: resp.title,
      thumbnail: resp.thumbnail,
      duration: format_duration(0),
      duration_seconds: 0,
      author: resp.author,
      views: format_views(0),
      video_formats: vec![],
      audio_formats: audio_formats(),
    })
  }
}
