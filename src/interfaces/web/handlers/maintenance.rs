use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::derived::{MAX_FREQUENCY_DAYS, frequency_in_range};
use crate::core::store::types::{MaintenanceChanges, MaintenanceDraft, MaintenanceView};

fn check_frequency(frequency_days: Option<i64>) -> ApiResult<()> {
    match frequency_days {
        Some(days) if !frequency_in_range(days) => Err(ApiError::BadRequest(format!(
            "frequency_days must be between 1 and {}",
            MAX_FREQUENCY_DAYS
        ))),
        _ => Ok(()),
    }
}

/// Due dates are computed against the current clock on every call.
pub async fn list_maintenance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<MaintenanceView>>> {
    Ok(Json(
        state
            .store
            .list_maintenance(&user.user_id, Utc::now())
            .await?,
    ))
}

pub async fn create_maintenance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<MaintenanceDraft>,
) -> ApiResult<(StatusCode, Json<MaintenanceView>)> {
    if draft.maintenance_type.trim().is_empty() {
        return Err(ApiError::BadRequest("maintenance_type is required".into()));
    }
    check_frequency(Some(draft.frequency_days))?;
    let record = state.store.insert_maintenance(&user.user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(record.with_derived(Utc::now()))))
}

pub async fn update_maintenance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(changes): Json<MaintenanceChanges>,
) -> ApiResult<StatusCode> {
    check_frequency(changes.frequency_days)?;
    let rows = state
        .store
        .update_maintenance(&user.user_id, &id, &changes)
        .await?;
    if rows == 0 {
        return Err(ApiError::not_found("maintenance", &id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_maintenance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.delete_maintenance(&user.user_id, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("maintenance", &id))
    }
}
