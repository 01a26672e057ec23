use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::fetcher::{FetchError, Fetcher};
use crate::post::SearchIndex;

pub const DEFAULT_INDEX_PATH: &str = "/search_index.json";
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub enum IndexSource {
    Remote(Url),
    Local(PathBuf),
}

impl IndexSource {
    pub fn from_base_url(base_url: &Url) -> Result<Self, url::ParseError> {
        base_url.join(DEFAULT_INDEX_PATH).map(IndexSource::Remote)
    }

    fn describe(&self) -> String {
        match self {
            IndexSource::Remote(url) => url.to_string(),
            IndexSource::Local(path) => path.display().to_string(),
        }
    }
}

/// Where the page's copy of the index stands.
#[derive(Debug, Clone, Default)]
pub enum IndexState {
    #[default]
    Loading,
    Ready(Arc<SearchIndex>),
    Unavailable,
}

impl IndexState {
    pub fn index(&self) -> Option<&Arc<SearchIndex>> {
        match self {
            IndexState::Ready(index) => Some(index),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct IndexClient {
    source: IndexSource,
    fetcher: Fetcher,
}

impl IndexClient {
    pub fn new(source: IndexSource, fetcher: Fetcher) -> Self {
        Self { source, fetcher }
    }

    pub async fn load(&self) -> Result<SearchIndex, FetchError> {
        let bytes = match &self.source {
            IndexSource::Remote(url) => self.fetcher.get_bytes(url).await?,
            IndexSource::Local(path) => std::fs::read(path).map_err(|source| FetchError::Io {
                path: path.display().to_string(),
                source,
            })?,
        };
        let index = SearchIndex::from_json(&bytes)?;
        tracing::info!(
            source = %self.source.describe(),
            posts = index.len(),
            "search index loaded"
        );
        Ok(index)
    }

    /// Loads the index, retrying exactly once after `delay`.
    ///
    /// `on_first_failure` runs before the wait so the caller can surface the
    /// unavailable state while the retry is pending.
    pub async fn load_with_retry<F>(
        &self,
        delay: Duration,
        on_first_failure: F,
    ) -> Result<SearchIndex, FetchError>
    where
        F: FnOnce(&FetchError),
    {
        match self.load().await {
            Ok(index) => Ok(index),
            Err(err) => {
                tracing::warn!(
                    source = %self.source.describe(),
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "could not fetch search index; retrying once"
                );
                on_first_failure(&err);
                tokio::time::sleep(delay).await;
                self.load().await.inspect_err(|err| {
                    tracing::error!(
                        source = %self.source.describe(),
                        error = %err,
                        "search index still unavailable; giving up"
                    );
                })
            }
        }
    }
}
