use axum::extract::State;
use tokio_util::sync::CancellationToken;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{DispatchReport, NotificationJob};

/// Fan a notification out to every subscriber and report the outcome.
///
/// Delivery failures never fail the request; they are counted in the report.
/// The pass runs on its own task: if the caller goes away, no new attempts
/// start but the ones in flight still finish and prune.
pub async fn send_notification(
    State(state): State<AppState>,
    Json(job): Json<NotificationJob>,
) -> Result<Json<DispatchReport>> {
    let cancel = CancellationToken::new();
    let abandoned = cancel.clone().drop_guard();

    let dispatcher = state.dispatcher.clone();
    let report = tokio::spawn(async move { dispatcher.dispatch_with_cancel(&job, &cancel).await })
        .await
        .map_err(|e| AppError::Internal(format!("Dispatch task failed: {}", e)))??;

    abandoned.disarm();
    Ok(Json(report))
}
