use std::{
  net::{IpAddr, SocketAddr},
  path::PathBuf,
  str::FromStr,
  time::Duration,
};

use crate::{Error, Result};

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
  pub bind_addr: IpAddr,
  pub port: u16,
  pub ytdlp_path: PathBuf,
  pub ffmpeg_path: Option<PathBuf>,
  pub ytdlp_proxy: Option<String>,
  pub ytdlp_concurrency: usize,
  pub temp_dir: PathBuf,
  pub stream_chunk_delay: Duration,
  pub oembed_fallback: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      bind_addr: IpAddr::from([0, 0, 0, 0]),
      port: 6500,
      ytdlp_path: PathBuf::from("yt-dlp"),
      ffmpeg_path: None,
      ytdlp_proxy: None,
      ytdlp_concurrency: 4,
      temp_dir: std::env::temp_dir(),
      stream_chunk_delay: Duration::ZERO,
      oembed_fallback: true,
    }
  }
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let default = Self::default();
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let ytdlp_concurrency =
      parse_var(&var, "YTDLP_CONCURRENCY", default.ytdlp_concurrency)?;
    if ytdlp_concurrency == 0 {
      return Err(Error::Config("YTDLP_CONCURRENCY", "0".into()));
    }

    let delay_ms: u64 = parse_var(&var, "STREAM_CHUNK_DELAY_MS", 0)?;

    Ok(Self {
      bind_addr: parse_var(&var, "BIND_ADDR", default.bind_addr)?,
      port: parse_var(&var, "PORT", default.port)?,
      ytdlp_path: var("YTDLP_PATH")
        .or_else(|| var("YT_DLP_PATH"))
        .map(PathBuf::from)
        .unwrap_or(default.ytdlp_path),
      ffmpeg_path: var("FFMPEG_PATH").map(PathBuf::from),
      ytdlp_proxy: var("YTDLP_PROXY"),
      ytdlp_concurrency,
      temp_dir: var("TEMP_DIR").map(PathBuf::from).unwrap_or(default.temp_dir),
      stream_chunk_delay: Duration::from_millis(delay_ms),
      oembed_fallback: parse_var(
        &var,
        "OEMBED_FALLBACK",
        default.oembed_fallback,
      )?,
    })
  }

  pub fn listen_addr(&self) -> SocketAddr {
    SocketAddr::new(self.bind_addr, self.port)
  }
}

fn parse_var<T: FromStr>(
  var: impl Fn(&str) -> Option<String>,
  key: &'static str,
  default: T,
) -> Result<T> {
  match var(key) {
    None => Ok(default),
    Some(value) => value
      .trim()
      .parse()
      .map_err(|_| Error::Config(key, value)),
  }
}
