mod oembed;
mod ytdlp;

use async_trait::async_trait;

use crate::{info::VideoInfo, video_id::VideoId, Result};

pub use oembed::OEmbed;
pub use ytdlp::Ytdlp;

/// A source of video metadata.
#[async_trait]
pub trait Extractor: Send + Sync {
  fn name(&self) -> &'static str;

  async fn fetch_info(&self, video_id: &VideoId) -> Result<VideoInfo>;
}
