pub mod admin;
pub mod public;
pub mod webhooks;

use axum::Router;

use crate::db::AppState;

/// Every route the server exposes, before state and outer layers are applied.
///
/// Operator routes are only mounted when an admin token is configured.
pub fn router(state: &AppState, public_rate_limit_rpm: u32) -> Router<AppState> {
    let app = Router::new()
        .merge(public::router(public_rate_limit_rpm))
        .merge(webhooks::router());

    if state.admin_token.is_some() {
        app.merge(admin::router(state.clone()))
    } else {
        tracing::warn!("ADMIN_TOKEN not set: /admin endpoints disabled");
        app
    }
}
