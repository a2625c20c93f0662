mod events;
mod notifications;

pub use events::*;
pub use notifications::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/notifications", post(send_notification))
        .route("/admin/purchases/recent", get(recent_purchases))
        .route("/admin/events/unprocessed", get(unprocessed_events))
        .route("/admin/events/{id}/processed", post(mark_event_processed))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
