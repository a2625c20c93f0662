use axum::{
    extract::State,
    http::StatusCode,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::SubscriptionKeys;
use crate::store::AddResult;

/// Browser `PushSubscription.toJSON()` output, or the flattened form the
/// landing page script sends.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: Option<String>,
    pub keys: Option<KeysInput>,
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeysInput {
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct VapidPublicKeyResponse {
    pub public_key: String,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", field)))
}

/// Push services are always HTTPS. Plain HTTP is accepted in dev mode for
/// local mock services.
fn validate_endpoint(endpoint: &str, dev_mode: bool) -> Result<()> {
    let url = Url::parse(endpoint)
        .map_err(|_| AppError::BadRequest("endpoint is not a valid URL".into()))?;

    match url.scheme() {
        "https" => Ok(()),
        "http" if dev_mode => Ok(()),
        scheme => Err(AppError::BadRequest(format!(
            "endpoint must use https, got {}",
            scheme
        ))),
    }
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(input): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>)> {
    let endpoint = required(input.endpoint, "endpoint")?;
    validate_endpoint(&endpoint, state.dev_mode)?;

    let (nested_p256dh, nested_auth) = match input.keys {
        Some(keys) => (keys.p256dh, keys.auth),
        None => (None, None),
    };
    let keys = SubscriptionKeys {
        p256dh: required(nested_p256dh.or(input.p256dh), "keys.p256dh")?,
        auth: required(nested_auth.or(input.auth), "keys.auth")?,
    };

    match state.subscriptions.add(&endpoint, &keys)? {
        AddResult::Created => {
            tracing::info!("New push subscription: {}", endpoint);
            Ok((StatusCode::CREATED, Json(SubscribeResponse { status: "created" })))
        }
        AddResult::AlreadyExists => Ok((
            StatusCode::OK,
            Json(SubscribeResponse {
                status: "already_subscribed",
            }),
        )),
    }
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(input): Json<UnsubscribeRequest>,
) -> Result<StatusCode> {
    state.subscriptions.remove(input.endpoint.trim())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vapid_public_key(
    State(state): State<AppState>,
) -> Result<Json<VapidPublicKeyResponse>> {
    let public_key = state
        .vapid_public_key
        .clone()
        .ok_or_else(|| AppError::NotFound("Push notifications are not configured".into()))?;

    Ok(Json(VapidPublicKeyResponse { public_key }))
}
