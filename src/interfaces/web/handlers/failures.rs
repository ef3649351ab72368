use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::store::types::{
    ActiveFailure, FailureChanges, FailureDraft, FailureRef, is_resolved_status,
};

pub async fn list_failures(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<ActiveFailure>>> {
    Ok(Json(state.store.list_active_failures(&user.user_id).await?))
}

pub async fn create_failure(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<FailureDraft>,
) -> ApiResult<(StatusCode, Json<ActiveFailure>)> {
    if draft.description.trim().is_empty() {
        return Err(ApiError::BadRequest("description is required".into()));
    }
    let created = state.store.insert_failure(&user.user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `{id}` may be an internal id or a failure number. A resolved-like status
/// moves the record to the resolved table.
pub async fn update_failure(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(changes): Json<FailureChanges>,
) -> ApiResult<Json<Value>> {
    let key = FailureRef::classify(&id);
    match changes.status.as_deref().map(str::trim) {
        Some(status) if is_resolved_status(status) => {
            let resolved = state
                .store
                .resolve_failure(&user.user_id, &key, status, &changes, &changes.resolution())
                .await?
                .ok_or_else(|| ApiError::not_found("failure", &id))?;
            Ok(Json(json!({ "moved_to_resolved": true, "failure": resolved })))
        }
        _ => {
            let rows = state
                .store
                .update_failure(&user.user_id, &key, &changes)
                .await?;
            if rows == 0 {
                return Err(ApiError::not_found("failure", &id));
            }
            let failure = state.store.get_active_failure(&user.user_id, &key).await?;
            Ok(Json(json!({ "moved_to_resolved": false, "failure": failure })))
        }
    }
}

pub async fn delete_failure(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let key = FailureRef::classify(&id);
    if state.store.delete_failure(&user.user_id, &key).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("failure", &id))
    }
}
