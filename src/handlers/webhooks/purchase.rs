use axum::{body::Bytes, extract::State, http::HeaderMap};
use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::ingest::SIGNATURE_HEADER;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Purchase platform callback. The body is taken as raw bytes so the
/// signature is checked against exactly what was sent.
///
/// Redeliveries of a known transaction are acknowledged like new ones.
pub async fn receive_purchase_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    state.ingestion.ingest(&body, signature)?;

    Ok(Json(WebhookAck { received: true }))
}
