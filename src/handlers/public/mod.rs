mod faq;
mod subscriptions;

pub use faq::*;
pub use subscriptions::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::rate_limit::limit_public;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(rate_limit_rpm: u32) -> Router<AppState> {
    // Browser-facing endpoints anyone can hit
    let limited = Router::new()
        .route(
            "/api/subscriptions",
            post(subscribe).delete(unsubscribe),
        )
        // Path the PWA service worker registration posts to
        .route("/api/save-sub", post(subscribe))
        .route("/qa", get(faq_lookup));

    Router::new()
        .route("/health", get(health))
        .route("/api/vapid-public-key", get(vapid_public_key))
        .merge(limit_public(limited, rate_limit_rpm))
}
