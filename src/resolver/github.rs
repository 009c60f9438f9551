//! GitHub REST implementation of [`Resolver`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{AssetRef, ResolveError, Resolver};
use crate::config::GithubConfig;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid GitHub API URL '{0}'")]
    InvalidUrl(String),

    #[error("GitHub token contains characters not allowed in a header")]
    InvalidToken,

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Release metadata returned by `GET /repos/{owner}/{repo}/releases/tags/{tag}`
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// Resolves release assets through the GitHub REST API.
///
/// Cheap to share behind an `Arc`; the inner `reqwest::Client` pools
/// connections across requests.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    api_url: Url,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self, ClientBuildError> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|_| ClientBuildError::InvalidUrl(config.api_url.clone()))?;
        if api_url.cannot_be_a_base() {
            return Err(ClientBuildError::InvalidUrl(config.api_url.clone()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ClientBuildError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, api_url })
    }

    fn release_url(&self, asset: &AssetRef) -> Result<Url, ResolveError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ResolveError::Upstream(format!("cannot extend API URL {}", self.api_url))
            })?
            .pop_if_empty()
            .extend([
                "repos",
                asset.owner.as_str(),
                asset.repo.as_str(),
                "releases",
                "tags",
                asset.tag.as_str(),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl Resolver for GithubClient {
    async fn resolve(&self, asset: &AssetRef) -> Result<String, ResolveError> {
        let url = self.release_url(asset)?;
        debug!(%url, "Requesting release metadata");

        let response = self.client.get(url).send().await.map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound("release not found".to_string()));
        }
        if !status.is_success() {
            return Err(ResolveError::Upstream(format!(
                "GitHub API returned {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        let release: Release = serde_json::from_slice(&body).map_err(|e| {
            ResolveError::Upstream(format!("malformed release payload: {e}"))
        })?;

        let found = release
            .assets
            .into_iter()
            .find(|a| a.name == asset.asset_name)
            .ok_or_else(|| ResolveError::NotFound("asset not found".to_string()))?;

        if found.browser_download_url.is_empty() {
            return Err(ResolveError::Upstream(format!(
                "asset '{}' has no download URL",
                found.name
            )));
        }

        Ok(found.browser_download_url)
    }
}

fn transport_error(err: reqwest::Error) -> ResolveError {
    if err.is_timeout() {
        ResolveError::Timeout
    } else {
        ResolveError::Upstream(err.to_string())
    }
}
