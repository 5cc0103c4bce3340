use log::debug;
use reqwest::Client;
use serde::Deserialize;
use tokio::fs;
use url::Url;

use crate::config::SpellSourceConfig;
use crate::error::SourceError;
use layout_store::Spell;

/// Shapes an upstream list may arrive in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SpellPayload {
    List(Vec<Spell>),
    Wrapped { results: Vec<Spell> },
}

impl SpellPayload {
    pub fn into_items(self) -> Vec<Spell> {
        match self {
            Self::List(items) | Self::Wrapped { results: items } => items,
        }
    }

    /// # Errors
    ///
    /// Returns `SourceError::Decode` if the payload is neither a list nor a
    /// `results` wrapper.
    pub fn decode(bytes: &[u8]) -> Result<Vec<Spell>, SourceError> {
        Ok(serde_json::from_slice::<Self>(bytes)?.into_items())
    }
}

/// Upstream supplier of reference items.
///
/// `fetch` returns the whole payload for a query; picking the exact match is
/// the caller's job.
#[allow(async_fn_in_trait, reason = "sources are driven on a single-threaded runtime")]
pub trait SpellSource {
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the upstream cannot be reached or answers
    /// with something that does not decode.
    async fn fetch(&self, name: &str) -> Result<Vec<Spell>, SourceError>;
}

/// `reqwest` for `http(s)://`, `tokio::fs` for `file://`.
#[derive(Debug, Clone)]
pub struct HttpSpellSource {
    endpoint: String,
    client: Client,
}

impl HttpSpellSource {
    /// # Errors
    ///
    /// Returns `InvalidEndpoint` for an unparsable endpoint and `Transport` if
    /// the HTTP client cannot be built.
    pub fn new(config: &SpellSourceConfig) -> Result<Self, SourceError> {
        Url::parse(&config.endpoint.replace("{name}", "x")).map_err(|err| {
            SourceError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                reason: err.to_string(),
            }
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url_for(&self, name: &str) -> Result<Url, SourceError> {
        let invalid = |err: url::ParseError| SourceError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason: err.to_string(),
        };
        if self.endpoint.contains("{name}") {
            let encoded = urlencoding::encode(name);
            return Url::parse(&self.endpoint.replace("{name}", &encoded)).map_err(invalid);
        }
        let mut url = Url::parse(&self.endpoint).map_err(invalid)?;
        if url.scheme() != "file" {
            url.query_pairs_mut().append_pair("name", name);
        }
        Ok(url)
    }

    async fn fetch_file(url: &Url) -> Result<Vec<u8>, SourceError> {
        let path = url
            .to_file_path()
            .map_err(|()| SourceError::InvalidEndpoint {
                endpoint: url.to_string(),
                reason: String::from("not a local file path"),
            })?;
        Ok(fs::read(path).await?)
    }

    async fn fetch_http(&self, url: Url) -> Result<Vec<u8>, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl SpellSource for HttpSpellSource {
    async fn fetch(&self, name: &str) -> Result<Vec<Spell>, SourceError> {
        let url = self.url_for(name)?;
        debug!("fetching reference `{name}` from {url}");
        let bytes = if url.scheme() == "file" {
            Self::fetch_file(&url).await?
        } else {
            self.fetch_http(url).await?
        };
        SpellPayload::decode(&bytes)
    }
}
