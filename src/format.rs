use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::humanize::format_bytes;

/// A single entry of the `formats` array in yt-dlp's `--dump-json` output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
  #[serde(default)]
  pub format_id: String,
  pub format_note: Option<String>,
  pub height: Option<u32>,
  pub vcodec: Option<String>,
  pub acodec: Option<String>,
  pub filesize: Option<f64>,
  pub filesize_approx: Option<f64>,
  pub tbr: Option<f64>,
  pub vbr: Option<f64>,
  pub fps: Option<f64>,
}

impl RawFormat {
  fn has_video(&self) -> bool {
    is_codec(self.vcodec.as_deref()) && self.height.unwrap_or(0) > 0
  }

  fn has_audio(&self) -> bool {
    is_codec(self.acodec.as_deref())
  }

  fn bitrate(&self) -> Option<f64> {
    positive(self.tbr).or(positive(self.vbr))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFormat {
  pub format_id: String,
  pub quality: String,
  pub height: u32,
  pub container: String,
  pub codec: String,
  pub size: String,
  pub has_audio: bool,
  #[serde(rename = "type")]
  pub kind: String,
  pub fps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
  pub quality: String,
  pub bitrate: u32,
  pub container: String,
  pub codec: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub label: String,
}

const AUDIO_TIERS: [(u32, &str); 4] =
  [(320, "Best"), (256, "High"), (192, "Standard"), (128, "Normal")];

/// The mp3 presets offered for every video, independent of the source.
pub fn audio_formats() -> Vec<AudioFormat> {
  AUDIO_TIERS
    .iter()
    .map(|&(bitrate, tier)| AudioFormat {
      quality: format!("{bitrate}kbps"),
      bitrate,
      container: "MP3".to_string(),
      codec: "MP3".to_string(),
      kind: "mp3".to_string(),
      label: format!("MP3 - {bitrate}kbps ({tier})"),
    })
    .collect()
}

/// Shapes the tool's format list into one entry per resolution bucket,
/// keeping the highest bitrate of each bucket, highest resolution first.
pub fn video_formats(raw: &[RawFormat], duration: f64) -> Vec<VideoFormat> {
  raw
    .iter()
    .filter(|f| f.has_video())
    .sorted_by(|a, b| {
      let bitrate = b
        .bitrate()
        .unwrap_or(0.0)
        .total_cmp(&a.bitrate().unwrap_or(0.0));
      bitrate.then(b.height.cmp(&a.height))
    })
    .map(|f| video_format(f, duration))
    .unique_by(|f| f.quality.clone())
    .sorted_by(|a, b| b.height.cmp(&a.height))
    .collect()
}

fn video_format(f: &RawFormat, duration: f64) -> VideoFormat {
  let height = f.height.unwrap_or(0);
  let has_audio = f.has_audio();
  let size = estimate_size(f, duration)
    .map(format_bytes)
    .unwrap_or_else(|| "Unknown".to_string());
  let kind = if has_audio { "video+audio" } else { "video-only" };

  VideoFormat {
    format_id: f.format_id.clone(),
    quality: quality_label(height, f.format_note.as_deref()),
    height,
    container: "mp4".to_string(),
    codec: codec_name(f.vcodec.as_deref()),
    size,
    has_audio,
    kind: kind.to_string(),
    fps: positive(f.fps).map(|fps| fps.round() as u32).unwrap_or(30),
  }
}

static QUALITY_NOTE_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)^\d+p\d*$").expect("regex is hard-coded")
});

// ultra-wide and other non-standard heights are folded into the
// closest common class, e.g. 2026 -> 2160p
pub fn quality_label(height: u32, format_note: Option<&str>) -> String {
  if let Some(note) = format_note.filter(|n| QUALITY_NOTE_REGEX.is_match(n)) {
    return note.to_string();
  }

  let class = match height {
    2000.. => "2160p",
    1300.. => "1440p",
    1000.. => "1080p",
    700.. => "720p",
    450.. => "480p",
    340.. => "360p",
    220.. => "240p",
    130.. => "144p",
    _ => return format!("{height}p"),
  };
  class.to_string()
}

/// Size in bytes as reported by the tool, or derived from the bitrate
/// (kbit/s) and the duration when the tool has no size for the format.
pub fn estimate_size(f: &RawFormat, duration: f64) -> Option<f64> {
  positive(f.filesize)
    .or(positive(f.filesize_approx))
    .or_else(|| {
      let duration = positive(Some(duration))?;
      Some(f.bitrate()? * 1024.0 / 8.0 * duration)
    })
}

pub fn codec_name(codec: Option<&str>) -> String {
  let Some(codec) = codec.filter(|c| is_codec(Some(*c))) else {
    return String::new();
  };

  let c = codec.to_lowercase();
  let known = if c.contains("av01") || c.contains("av1") {
    "AV1"
  } else if c.contains("vp9") || c.contains("vp09") {
    "VP9"
  } else if c.contains("vp8") {
    "VP8"
  } else if c.contains("avc1") || c.contains("h264") || c.contains("h.264") {
    "H264"
  } else if c.contains("hev") || c.contains("h265") || c.contains("hevc") {
    "H265"
  } else {
    return codec.split('.').next().unwrap_or(codec).to_uppercase();
  };
  known.to_string()
}

fn is_codec(codec: Option<&str>) -> bool {
  matches!(codec, Some(c) if !c.is_empty() && c != "none")
}

fn positive(value: Option<f64>) -> Option<f64> {
  value.filter(|v| v.is_finite() && *v > 0.0)
}
