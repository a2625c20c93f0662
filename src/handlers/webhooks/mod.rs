mod purchase;

pub use purchase::*;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(receive_purchase_webhook))
}
