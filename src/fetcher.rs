use anyhow::Context as _;
use reqwest::StatusCode;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url} failed with status {status}")]
    Status { url: Url, status: StatusCode },
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse search index: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self { client })
    }

    /// Single GET; any non-2xx status is an error. Retrying is the caller's call.
    pub async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.clone(),
            source,
        };

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }

        let bytes = resp.bytes().await.map_err(transport)?;
        tracing::debug!(%url, len = bytes.len(), "downloaded");
        Ok(bytes.to_vec())
    }
}
