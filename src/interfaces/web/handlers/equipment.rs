use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::store::types::{EquipmentChanges, EquipmentDraft, EquipmentView};

pub async fn list_equipment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<EquipmentView>>> {
    Ok(Json(state.store.list_equipment(&user.user_id).await?))
}

pub async fn create_equipment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<EquipmentDraft>,
) -> ApiResult<(StatusCode, Json<EquipmentView>)> {
    if draft.system.trim().is_empty() {
        return Err(ApiError::BadRequest("system is required".into()));
    }
    if draft.current_hours < 0.0 {
        return Err(ApiError::BadRequest("current_hours cannot be negative".into()));
    }
    let view = state.store.insert_equipment(&user.user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_equipment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(changes): Json<EquipmentChanges>,
) -> ApiResult<StatusCode> {
    let rows = state
        .store
        .update_equipment(&user.user_id, &id, &changes)
        .await?;
    if rows == 0 {
        return Err(ApiError::not_found("equipment", &id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_equipment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.delete_equipment(&user.user_id, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("equipment", &id))
    }
}
