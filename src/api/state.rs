use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::resolver::Resolver;

/// Shared, read-only handler dependencies
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<dyn Resolver>,
    /// Cancelled when the server gives up waiting on in-flight requests
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self::with_cancellation(resolver, CancellationToken::new())
    }

    pub fn with_cancellation(resolver: Arc<dyn Resolver>, cancel: CancellationToken) -> Self {
        Self { resolver, cancel }
    }
}
