//! Release asset resolution
//!
//! A [`Resolver`] maps an [`AssetRef`] (owner, repo, tag, asset name) to the
//! URL the asset can be downloaded from. Failures are reported through the
//! closed [`ResolveError`] enum so callers can match on every case.

pub mod github;

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use github::GithubClient;

/// Identifies one release asset. Values are taken verbatim from the request path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetRef {
    pub owner: String,
    pub repo: String,
    pub tag: String,
    #[serde(rename = "assetName")]
    pub asset_name: String,
}

impl AssetRef {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        tag: impl Into<String>,
        asset_name: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            tag: tag.into(),
            asset_name: asset_name.into(),
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}:{}",
            self.owner, self.repo, self.tag, self.asset_name
        )
    }
}

/// Resolver failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The repository, release or asset does not exist upstream.
    #[error("{0}")]
    NotFound(String),
    /// Any other upstream failure. The detail may be empty.
    #[error("{0}")]
    Upstream(String),
    /// The upstream call gave up on its own deadline.
    #[error("upstream request timed out")]
    Timeout,
}

/// Maps asset references to download URLs.
///
/// Implementations are shared by every in-flight request, so they must be
/// safe for concurrent use. Dropping the returned future cancels the call;
/// implementations must not hold on to work past that point.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, asset: &AssetRef) -> Result<String, ResolveError>;
}
