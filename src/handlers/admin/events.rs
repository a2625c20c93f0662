use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::PurchaseEvent;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Completed purchases, newest first.
pub async fn recent_purchases(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PurchaseEvent>>> {
    let purchases = state.events.recent_completed_purchases(query.limit())?;
    Ok(Json(purchases))
}

pub async fn unprocessed_events(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PurchaseEvent>>> {
    let events = state.events.list_unprocessed(query.limit())?;
    Ok(Json(events))
}

pub async fn mark_event_processed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PurchaseEvent>> {
    if !state.events.mark_processed(&id)? {
        return Err(AppError::NotFound("Event not found".into()));
    }

    let event = state
        .events
        .get_event(&id)?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

    tracing::debug!("Event {} marked processed", id);
    Ok(Json(event))
}
