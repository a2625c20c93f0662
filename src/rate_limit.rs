//! Per-IP rate limiting for the unauthenticated browser endpoints
//! (`/api/subscriptions`, `/api/save-sub`, `/qa`).
//!
//! Configure via `RATE_LIMIT_PUBLIC_RPM` (default: 30, 0 disables).
//! The key extractor reads the peer address, so the server must be started
//! with `into_make_service_with_connect_info::<SocketAddr>()`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

use crate::db::AppState;

/// Wrap `router` with a limiter allowing `requests_per_minute` per IP.
/// Returns the router untouched when the limit is 0.
pub fn limit_public(router: Router<AppState>, requests_per_minute: u32) -> Router<AppState> {
    if requests_per_minute == 0 {
        tracing::warn!("Public rate limiting disabled (RATE_LIMIT_PUBLIC_RPM=0)");
        return router;
    }

    let period = Duration::from_millis((60_000 / requests_per_minute as u64).max(1));
    let Some(config) = GovernorConfigBuilder::default()
        .period(period)
        .burst_size(requests_per_minute)
        .finish()
    else {
        tracing::error!("Invalid rate limit {} rpm, limiting disabled", requests_per_minute);
        return router;
    };

    tracing::info!("Public endpoints limited to {} requests/minute per IP", requests_per_minute);
    router.layer(GovernorLayer::new(Arc::new(config)))
}
