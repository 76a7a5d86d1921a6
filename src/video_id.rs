use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

static YOUTUBE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"^(?:https?://)?(?:(?:www|m)\.)?(?:youtube\.com/(?:watch\?v=|embed/|v/|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})",
  )
  .expect("regex is hard-coded, thus must be valid")
});

/// The 11 character id of a youtube video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoId(String);

impl VideoId {
  pub fn parse(url: &str) -> Result<Self> {
    let url = url.trim();
    YOUTUBE_URL_REGEX
      .captures(url)
      .and_then(|caps| caps.get(1))
      .map(|id| VideoId(id.as_str().to_string()))
      .ok_or_else(|| Error::InvalidUrl(url.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  // the only form of url ever handed to yt-dlp
  pub fn watch_url(&self) -> String {
    format!("https://www.youtube.com/watch?v={}", self.0)
  }
}

impl fmt::Display for VideoId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
