use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::crypto::constant_time_eq;
use crate::db::AppState;
use crate::error::{AppError, Result};

/// Gate for `/admin/*`: the bearer token must equal `ADMIN_TOKEN`.
pub async fn admin_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(AppError::Unauthorized);
    };
    let Some(TypedHeader(auth)) = bearer else {
        tracing::debug!("Admin request without bearer token: {}", request.uri().path());
        return Err(AppError::Unauthorized);
    };

    if !constant_time_eq(auth.token().as_bytes(), expected.as_bytes()) {
        tracing::warn!("Admin request with invalid token: {}", request.uri().path());
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
