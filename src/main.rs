use std::time::Duration;

use axum::{
  routing::{get, post},
  Router,
};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod download;
mod error;
mod extractor;
mod format;
mod info;
mod state;
#[cfg(test)]
mod testing;
mod util;
mod video_id;

pub use error::{Error, Result};

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let config = Config::from_env()?;
  let state = AppState::new(config);

  match state.ytdlp.version().await {
    Ok(version) => info!(
      "using yt-dlp {} at {}",
      version,
      state.config.ytdlp_path.display()
    ),
    Err(e) => warn!(
      "yt-dlp is not usable at {}: {}",
      state.config.ytdlp_path.display(),
      e
    ),
  }

  Toplevel::new(|s| async move {
    s.start(SubsystemBuilder::new("http", |subsys| serve(state, subsys)));
  })
  .catch_signals()
  .handle_shutdown_requests(Duration::from_secs(10))
  .await
  .map_err(|e| Error::Server(e.to_string()))
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/api/info", post(info::post_info))
    .route("/api/download", get(download::get_download))
    .with_state(state)
}

async fn serve(state: AppState, subsys: SubsystemHandle) -> Result<()> {
  let addr = state.config.listen_addr();
  let server = axum::Server::try_bind(&addr)
    .map_err(|e| Error::Server(format!("failed to bind {addr}: {e}")))?
    .serve(router(state).into_make_service());

  info!("listening on http://{}", server.local_addr());

  server
    .with_graceful_shutdown(subsys.on_shutdown_requested())
    .await
    .map_err(|e| Error::Server(e.to_string()))?;

  info!("server stopped");
  Ok(())
}

async fn health() -> &'static str {
  "ok"
}
