use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::store::types::{FailureRef, ResolvedChanges, ResolvedDraft, ResolvedFailure};

pub async fn list_resolved(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<ResolvedFailure>>> {
    Ok(Json(state.store.list_resolved_failures(&user.user_id).await?))
}

/// Repair path for records that never made it through the transition.
pub async fn create_resolved(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<ResolvedDraft>,
) -> ApiResult<(StatusCode, Json<ResolvedFailure>)> {
    if draft.failure_number.trim().is_empty() {
        return Err(ApiError::BadRequest("failure_number is required".into()));
    }
    let id = draft.id.clone().unwrap_or_default();
    match state
        .store
        .insert_resolved_failure(&user.user_id, draft)
        .await?
    {
        Some(record) => Ok((StatusCode::CREATED, Json(record))),
        None => Err(ApiError::Conflict(format!(
            "resolved failure '{}' already exists",
            id
        ))),
    }
}

pub async fn update_resolved(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(changes): Json<ResolvedChanges>,
) -> ApiResult<StatusCode> {
    let rows = state
        .store
        .update_resolved_failure(&user.user_id, &FailureRef::classify(&id), &changes)
        .await?;
    if rows == 0 {
        return Err(ApiError::not_found("resolved failure", &id));
    }
    Ok(StatusCode::NO_CONTENT)
}
