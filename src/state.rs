use std::sync::Arc;

use crate::{
  config::Config,
  extractor::{Extractor, OEmbed, Ytdlp},
};

#[derive(Clone)]
pub struct AppState {
  pub config: Arc<Config>,
  pub ytdlp: Arc<Ytdlp>,
  // metadata sources in order of preference
  pub extractors: Arc<Vec<Arc<dyn Extractor>>>,
}

impl AppState {
  pub fn new(config: Config) -> Self {
    let ytdlp = Arc::new(Ytdlp::new(&config));

    let mut extractors: Vec<Arc<dyn Extractor>> = vec![ytdlp.clone()];
    if config.oembed_fallback {
      extractors.push(Arc::new(OEmbed::new()));
    }

    Self {
      config: Arc::new(config),
      ytdlp,
      extractors: Arc::new(extractors),
    }
  }
}
