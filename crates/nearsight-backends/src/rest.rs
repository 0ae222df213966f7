use core::num::NonZeroUsize;

use async_trait::async_trait;
use nearsight_core::{
    AssetId, BackendConfig, Error, MatchRecord, Query, RenderConfig, Result, ResultSet,
    SearchBackend, join_endpoint, parse_base_url,
};
use reqwest::{Client, Url};
use serde::Deserialize;

/// Search endpoint on the gateway.
const NEAR_TEXT_PATH: &str = "near_text";
/// Rendered image endpoint on the gateway.
const FETCH_JPG_PATH: &str = "fetch_jpg";
/// Health endpoint on the gateway.
const HEALTH_PATH: &str = "health";

/// Backend speaking the plain REST protocol; matches carry identifiers only.
pub struct RestBackend {
    /// HTTP client for API requests.
    client: Client,
    /// Base URL of the gateway.
    base_url: Url,
    /// Parameters baked into rendered image references.
    render: RenderConfig,
}

/// Response payload of `GET /near_text`.
#[derive(Debug, Deserialize)]
struct NearTextResponse {
    /// Matching asset ids, most similar first.
    ids: Vec<String>,
}

impl RestBackend {
    /// Creates a backend for the gateway at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse.
    pub fn new(base_url: &str, render: RenderConfig) -> Result<Self> {
        Ok(Self {
            client: Client::default(),
            base_url: parse_base_url("asset_url", base_url)?,
            render,
        })
    }

    /// Creates a backend from configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &BackendConfig, render: RenderConfig) -> Result<Self> {
        Self::new(&config.asset_url, render)
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// URL of the rendered image for `id`.
    ///
    /// # Errors
    /// Returns an error if the base URL cannot carry a path.
    pub fn fetch_jpg_url(&self, id: &AssetId) -> Result<Url> {
        let mut url = join_endpoint(&self.base_url, FETCH_JPG_PATH)?;
        url.query_pairs_mut()
            .append_pair("id", id.as_str())
            .append_pair("width", &self.render.width.to_string())
            .append_pair("height", &self.render.height.to_string())
            .append_pair("quality", &self.render.quality.to_string());
        Ok(url)
    }

    /// Maps the gateway's id list to remote matches, keeping at most `limit`.
    fn normalize(&self, body: &str, limit: NonZeroUsize) -> Result<ResultSet> {
        let response: NearTextResponse = serde_json::from_str(body)
            .map_err(|err| Error::Backend(format!("malformed response: {err}")))?;

        response
            .ids
            .into_iter()
            .take(limit.get())
            .map(|id| {
                let id = AssetId::new(id);
                let reference = self.fetch_jpg_url(&id)?;
                Ok(MatchRecord::remote(id, reference))
            })
            .collect()
    }
}

#[async_trait]
impl SearchBackend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn is_available(&self) -> bool {
        let Ok(url) = join_endpoint(&self.base_url, HEALTH_PATH) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!(%error, "gateway health check failed");
                false
            }
        }
    }

    async fn near_text(&self, query: &Query, limit: NonZeroUsize) -> Result<ResultSet> {
        let mut url = join_endpoint(&self.base_url, NEAR_TEXT_PATH)?;
        url.query_pairs_mut()
            .append_pair("text", query.as_str())
            .append_pair("limit", &limit.to_string());

        tracing::debug!(%url, "rest near-text search");

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("near_text returned {status}")));
        }

        let body = response.text().await?;
        self.normalize(&body, limit)
    }
}
