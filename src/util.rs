use futures::Future;
use once_cell::sync::Lazy;
use regex::Regex;

mod file_stream;
pub mod humanize;

pub use file_stream::{FileStream, TempFile};

use crate::{Error, Result};

// Polls all futures concurrently but yields the first `Ok` in input
// order, so an earlier source wins over a faster later one. Returns the
// last error when every future fails.
pub async fn race_ordered_first_ok<A>(
  futs: Vec<impl Future<Output = Result<A>>>,
) -> Result<A> {
  use futures::stream::StreamExt;

  let mut futs = futures::stream::iter(futs).buffered(10);

  let mut last_err = None;
  while let Some(res) = futs.next().await {
    match res {
      Ok(res) => return Ok(res),
      Err(e) => {
        last_err = Some(e);
      }
    }
  }

  Err(last_err.unwrap_or_else(|| {
    Error::Extraction("no metadata source available".into())
  }))
}

// used to remove cred info from proxy url before printing
static PROXY_AUTH_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"//[^:/@]+(:[^@]+)?@").expect("regex is hard-coded")
});

pub fn redact_proxy(proxy: &str) -> String {
  PROXY_AUTH_REGEX
    .replace(proxy, "//<REDACTED>@")
    .into_owned()
}
