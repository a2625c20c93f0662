use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};

#[derive(Debug, Deserialize)]
pub struct FaqQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FaqResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

pub async fn faq_lookup(
    State(state): State<AppState>,
    Query(query): Query<FaqQuery>,
) -> Result<Json<FaqResponse>> {
    let q = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("q is required".into()))?;

    let response = match state.faq.lookup(&q) {
        Some(hit) => FaqResponse {
            found: true,
            q: Some(hit.q),
            a: Some(hit.a),
            score: Some(hit.score),
        },
        None => {
            tracing::debug!("No FAQ match for {:?}", q);
            FaqResponse {
                found: false,
                q: None,
                a: None,
                score: None,
            }
        }
    };

    Ok(Json(response))
}
