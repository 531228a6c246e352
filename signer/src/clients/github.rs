//! Client for the release assets endpoints of the GitHub REST API.

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use signer_config::shared::GitHubConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ErrorKind, SignerResult};
use crate::signer_error;
use crate::sink::ArtifactSink;
use crate::source::ArtifactSource;
use crate::types::{AssetId, AssetMetadata};

/// Media type of JSON responses of the GitHub API.
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Media type requesting the raw content of a release asset.
const OCTET_STREAM: &str = "application/octet-stream";

/// Version of the GitHub REST API the client is written against.
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Maximum page size accepted by the release assets listing.
const ASSETS_PER_PAGE: usize = 100;

const USER_AGENT: &str = concat!("release-signer/", env!("CARGO_PKG_VERSION"));

/// Release asset as returned by the GitHub API, reduced to the fields in use.
#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    id: u64,
    name: String,
}

impl From<ReleaseAsset> for AssetMetadata {
    fn from(value: ReleaseAsset) -> Self {
        AssetMetadata {
            id: AssetId(value.id),
            name: value.name,
        }
    }
}

#[derive(Debug)]
struct Inner {
    client: reqwest::Client,
    config: GitHubConfig,
    token: SecretString,
    release_id: u64,
}

/// [`ArtifactSource`] and [`ArtifactSink`] over the assets of one GitHub release.
///
/// Cloning is cheap, clones share the same HTTP connection pool.
#[derive(Debug, Clone)]
pub struct GitHubReleaseClient {
    inner: Arc<Inner>,
}

impl GitHubReleaseClient {
    /// Creates a client for the assets of `release_id`, authenticated with `token`.
    pub fn new(config: GitHubConfig, token: SecretString, release_id: u64) -> SignerResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| {
                signer_error!(
                    ErrorKind::ConfigError,
                    "Failed to build the GitHub client",
                    err.to_string(),
                    source: err
                )
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                config,
                token,
                release_id,
            }),
        })
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.inner.config.api_url.trim_end_matches('/'),
            self.inner.config.owner,
            self.inner.config.repo
        )
    }

    fn asset_url(&self, id: AssetId) -> String {
        format!("{}/releases/assets/{id}", self.repo_url())
    }

    fn release_assets_url(&self) -> String {
        format!("{}/releases/{}/assets", self.repo_url(), self.inner.release_id)
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/{}/assets",
            self.inner.config.uploads_url.trim_end_matches('/'),
            self.inner.config.owner,
            self.inner.config.repo,
            self.inner.release_id
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .bearer_auth(self.inner.token.expose_secret())
    }
}

impl ArtifactSource for GitHubReleaseClient {
    fn name() -> &'static str {
        "github"
    }

    async fn get_metadata(&self, id: AssetId) -> SignerResult<AssetMetadata> {
        let asset: ReleaseAsset = self
            .request(reqwest::Method::GET, &self.asset_url(id))
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(asset.into())
    }

    async fn list_assets(&self) -> SignerResult<Vec<AssetMetadata>> {
        let url = self.release_assets_url();
        let mut assets = Vec::new();

        for page in 1.. {
            let batch: Vec<ReleaseAsset> = self
                .request(reqwest::Method::GET, &url)
                .header(ACCEPT, GITHUB_JSON)
                .query(&[("per_page", ASSETS_PER_PAGE), ("page", page)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let batch_len = batch.len();
            assets.extend(batch.into_iter().map(AssetMetadata::from));

            if batch_len < ASSETS_PER_PAGE {
                break;
            }
        }

        debug!(
            release_id = self.inner.release_id,
            assets = assets.len(),
            "listed release assets"
        );

        Ok(assets)
    }

    async fn fetch(&self, id: AssetId) -> SignerResult<Bytes> {
        let content = self
            .request(reqwest::Method::GET, &self.asset_url(id))
            .header(ACCEPT, OCTET_STREAM)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        info!(%id, bytes = content.len(), "downloaded release asset");

        Ok(content)
    }

    async fn delete(&self, id: AssetId) -> SignerResult<()> {
        self.request(reqwest::Method::DELETE, &self.asset_url(id))
            .header(ACCEPT, GITHUB_JSON)
            .send()
            .await?
            .error_for_status()?;

        info!(%id, "deleted release asset");

        Ok(())
    }
}

impl ArtifactSink for GitHubReleaseClient {
    fn name() -> &'static str {
        "github"
    }

    async fn upload(&self, name: &str, content: Bytes) -> SignerResult<AssetId> {
        let size = content.len();
        let asset: ReleaseAsset = self
            .request(reqwest::Method::POST, &self.upload_url())
            .header(ACCEPT, GITHUB_JSON)
            .header(CONTENT_TYPE, OCTET_STREAM)
            .query(&[("name", name)])
            .body(content)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(asset = name, id = asset.id, bytes = size, "uploaded release asset");

        Ok(AssetId(asset.id))
    }
}
