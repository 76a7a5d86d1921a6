use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("invalid youtube url: {0:?}")]
  InvalidUrl(String),
  #[error("failed to extract video info: {0}")]
  Extraction(String),
  #[error("download failed: {0}")]
  Download(String),
  #[error("failed to spawn yt-dlp: {0}")]
  ProcessCrashed(std::io::Error),
  #[error("invalid value for {0}: {1}")]
  Config(&'static str, String),
  #[error("server error: {0}")]
  Server(String),
  #[error(transparent)]
  IO(#[from] std::io::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Http(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  fn status(&self) -> StatusCode {
    match self {
      Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  // what the client gets to see, the details only go to the log
  fn public_message(&self) -> &'static str {
    match self {
      Error::InvalidUrl(_) => "Invalid YouTube URL",
      Error::Extraction(_) | Error::Json(_) | Error::Http(_) => {
        "Failed to fetch video info. Please check the URL and try again."
      }
      Error::Download(_) => "Download failed",
      Error::ProcessCrashed(_) => "Download process crashed",
      Error::IO(_) | Error::Config(..) | Error::Server(_) => {
        "Download failed. Please try again."
      }
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("{}", self);
    } else {
      warn!("{}", self);
    }

    let body = Json(json!({ "error": self.public_message() }));
    (status, body).into_response()
  }
}
