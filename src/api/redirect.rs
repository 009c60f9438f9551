use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, Uri, header::LOCATION},
    response::{IntoResponse, Response},
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

use super::state::AppState;
use crate::resolver::{AssetRef, ResolveError, Resolver};

/// Upper bound on a single resolver call
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(2);

const BAD_GATEWAY_BODY: &str = "Bad Gateway";
const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// Why a resolution scope ended before the resolver answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnd {
    DeadlineElapsed,
    Cancelled,
}

/// Outcome of resolving one asset reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Failed(ResolveError),
    TimedOut(ScopeEnd),
}

/// Runs one resolver call bounded by `deadline` and by `parent`.
///
/// Deadline expiry and parent cancellation take precedence over whatever the
/// resolver returned, including its own errors.
pub async fn resolve_within(
    resolver: &dyn Resolver,
    asset: &AssetRef,
    deadline: Duration,
    parent: &CancellationToken,
) -> Resolution {
    let expires_at = Instant::now() + deadline;

    let result = tokio::select! {
        biased;
        _ = parent.cancelled() => None,
        result = tokio::time::timeout_at(expires_at, resolver.resolve(asset)) => result.ok(),
    };

    let scope_end = if parent.is_cancelled() {
        Some(ScopeEnd::Cancelled)
    } else if Instant::now() >= expires_at {
        Some(ScopeEnd::DeadlineElapsed)
    } else {
        None
    };

    match (scope_end, result) {
        (Some(end), result) => {
            if let Some(result) = result {
                debug!(?result, "Discarding resolver result after scope ended");
            }
            Resolution::TimedOut(end)
        }
        (None, Some(Ok(url))) => Resolution::Resolved(url),
        (None, Some(Err(err))) => Resolution::Failed(err),
        // select! only yields None through cancellation or the deadline
        (None, None) => Resolution::TimedOut(ScopeEnd::DeadlineElapsed),
    }
}

/// GET /gh/{owner}/{repo}/{tag}/{assetName}
///
/// Redirects to the asset's download URL:
/// - 301 with `Location` on success
/// - 404 with the resolver's detail when the release or asset is missing
/// - 500 for any other resolver failure, including the resolver's own timeout
/// - 502 when the deadline elapses or the server cancels in-flight work
pub async fn download_release(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Path(asset): Path<AssetRef>,
) -> Resolution {
    let span = info_span!("download_release", %method, %uri);

    async move {
        info!("Fetching release URL");

        let resolution = resolve_within(
            state.resolver.as_ref(),
            &asset,
            REQUEST_DEADLINE,
            &state.cancel,
        )
        .await;

        match &resolution {
            Resolution::Resolved(url) => info!(%url, "Found release URL"),
            Resolution::Failed(ResolveError::NotFound(detail)) => info!(
                error = %detail,
                owner = %asset.owner,
                repo = %asset.repo,
                tag = %asset.tag,
                asset = %asset.asset_name,
                "Release asset not found"
            ),
            Resolution::Failed(err) => {
                error!(error = ?err, asset = %asset, "Error retrieving release URL")
            }
            Resolution::TimedOut(end) => {
                error!(cause = ?end, asset = %asset, "Release URL not resolved in time")
            }
        }

        resolution
    }
    .instrument(span)
    .await
}

impl IntoResponse for Resolution {
    fn into_response(self) -> Response {
        match self {
            Resolution::Resolved(url) => match HeaderValue::from_str(&url) {
                Ok(location) => {
                    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response()
                }
                Err(err) => {
                    error!(%url, error = %err, "Resolved URL is not a valid Location header");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
                }
            },
            Resolution::TimedOut(_) => (StatusCode::BAD_GATEWAY, BAD_GATEWAY_BODY).into_response(),
            Resolution::Failed(ResolveError::NotFound(detail)) => {
                (StatusCode::NOT_FOUND, detail).into_response()
            }
            // The resolver's own timeout is an upstream failure; only the
            // request deadline and cancellation map to 502
            Resolution::Failed(err @ ResolveError::Timeout) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
            Resolution::Failed(ResolveError::Upstream(detail)) => {
                let body = if detail.is_empty() {
                    INTERNAL_ERROR_BODY.to_string()
                } else {
                    detail
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Delayed {
        delay: Duration,
        result: Result<String, ResolveError>,
        polled: AtomicBool,
    }

    impl Delayed {
        fn new(delay: Duration, result: Result<String, ResolveError>) -> Self {
            Self {
                delay,
                result,
                polled: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Resolver for Delayed {
        async fn resolve(&self, _asset: &AssetRef) -> Result<String, ResolveError> {
            self.polled.store(true, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    fn asset() -> AssetRef {
        AssetRef::new("acme", "widget", "v1.2.0", "widget-linux-amd64")
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_within_deadline() {
        let resolver = Delayed::new(
            Duration::from_millis(50),
            Ok("https://cdn.example/widget.tar.gz".to_string()),
        );

        let outcome =
            resolve_within(&resolver, &asset(), REQUEST_DEADLINE, &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            Resolution::Resolved("https://cdn.example/widget.tar.gz".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_resolver_times_out_at_deadline() {
        let resolver = Delayed::new(Duration::from_secs(5), Ok("https://late".to_string()));
        let started = Instant::now();

        let outcome =
            resolve_within(&resolver, &asset(), REQUEST_DEADLINE, &CancellationToken::new()).await;

        assert_eq!(outcome, Resolution::TimedOut(ScopeEnd::DeadlineElapsed));
        let elapsed = started.elapsed();
        assert!(elapsed >= REQUEST_DEADLINE && elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_at_deadline_reports_timeout() {
        // Resolver fails exactly as the deadline expires
        let resolver = Delayed::new(
            REQUEST_DEADLINE,
            Err(ResolveError::Upstream("connection reset".into())),
        );

        let outcome =
            resolve_within(&resolver, &asset(), REQUEST_DEADLINE, &CancellationToken::new()).await;
        assert_eq!(outcome, Resolution::TimedOut(ScopeEnd::DeadlineElapsed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_parent_skips_resolver() {
        let resolver = Arc::new(Delayed::new(Duration::from_secs(1), Ok("https://x".into())));
        let parent = CancellationToken::new();
        parent.cancel();
        let started = Instant::now();

        let outcome = resolve_within(resolver.as_ref(), &asset(), REQUEST_DEADLINE, &parent).await;

        assert_eq!(outcome, Resolution::TimedOut(ScopeEnd::Cancelled));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(!resolver.polled.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_call() {
        let resolver = Delayed::new(Duration::from_secs(1), Ok("https://x".into()));
        let parent = CancellationToken::new();

        let canceller = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let outcome = resolve_within(&resolver, &asset(), REQUEST_DEADLINE, &parent).await;

        assert_eq!(outcome, Resolution::TimedOut(ScopeEnd::Cancelled));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_errors_pass_through() {
        let resolver = Delayed::new(
            Duration::from_millis(10),
            Err(ResolveError::NotFound("release not found".into())),
        );

        let outcome =
            resolve_within(&resolver, &asset(), REQUEST_DEADLINE, &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            Resolution::Failed(ResolveError::NotFound("release not found".into()))
        );
    }

    #[test]
    fn test_response_mapping() {
        let response = Resolution::Resolved("https://cdn.example/a".into()).into_response();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[LOCATION], "https://cdn.example/a");

        let response = Resolution::TimedOut(ScopeEnd::Cancelled).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = Resolution::Failed(ResolveError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = Resolution::Failed(ResolveError::NotFound("gone".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = Resolution::Failed(ResolveError::Upstream(String::new())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_location_is_server_error() {
        let response = Resolution::Resolved("https://cdn.example/a\nb".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(LOCATION).is_none());
    }
}
