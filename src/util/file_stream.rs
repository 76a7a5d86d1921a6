use std::{
  path::{Path, PathBuf},
  pin::Pin,
  task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use tempfile::TempDir;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 64 * 1024;

/// A file inside its own staging directory. Dropping it removes the
/// whole directory, including any intermediate files yt-dlp left next
/// to the output.
#[derive(Debug)]
pub struct TempFile {
  dir: Option<TempDir>,
  path: PathBuf,
}

impl TempFile {
  pub fn allocate(dir: &Path, ext: &str) -> std::io::Result<Self> {
    let staging = tempfile::Builder::new()
      .prefix("saveclip-")
      .tempdir_in(dir)?;
    let id: u64 = rand::random();
    let path = staging.path().join(format!("saveclip-{id:016x}.{ext}"));
    Ok(Self {
      dir: Some(staging),
      path,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.exists()
  }

  pub async fn open(&self) -> std::io::Result<(File, u64)> {
    let file = File::open(&self.path).await?;
    let len = file.metadata().await?.len();
    Ok((file, len))
  }
}

impl Drop for TempFile {
  fn drop(&mut self) {
    let Some(dir) = self.dir.take() else {
      return;
    };

    let dir_path = dir.path().to_owned();
    match dir.close() {
      Ok(()) => debug!("deleted staging dir: {}", dir_path.display()),
      Err(e) => {
        warn!("failed to delete staging dir {}: {}", dir_path.display(), e)
      }
    }
  }
}

/// Streams an opened temp file in fixed-size chunks and deletes it once
/// the stream is dropped, whether it was read to the end or not.
pub struct FileStream {
  reader: ReaderStream<File>,
  _file: TempFile,
}

impl FileStream {
  pub fn new(file: File, temp_file: TempFile) -> Self {
    Self {
      reader: ReaderStream::with_capacity(file, CHUNK_SIZE),
      _file: temp_file,
    }
  }
}

impl Stream for FileStream {
  type Item = std::io::Result<Bytes>;

  fn poll_next(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    let this = &mut *self;
    match Pin::new(&mut this.reader).poll_next(cx) {
      Poll::Ready(Some(Err(err))) => {
        warn!("file stream error: {}", err);
        Poll::Ready(Some(Err(err)))
      }
      poll => poll,
    }
  }
}
