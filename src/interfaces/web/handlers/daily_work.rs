use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::store::types::{DailyWorkChanges, DailyWorkDraft, DailyWorkPlan};

#[derive(Deserialize)]
pub struct DailyWorkQuery {
    #[serde(default)]
    date: Option<String>,
}

pub async fn list_daily_work(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DailyWorkQuery>,
) -> ApiResult<Json<Vec<DailyWorkPlan>>> {
    let date = query.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    Ok(Json(
        state.store.list_daily_work(&user.user_id, date).await?,
    ))
}

pub async fn create_daily_work(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<DailyWorkDraft>,
) -> ApiResult<(StatusCode, Json<DailyWorkPlan>)> {
    if draft.task.trim().is_empty() {
        return Err(ApiError::BadRequest("task is required".into()));
    }
    let plan = state.store.insert_daily_work(&user.user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_daily_work(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(changes): Json<DailyWorkChanges>,
) -> ApiResult<StatusCode> {
    let rows = state
        .store
        .update_daily_work(&user.user_id, &id, &changes)
        .await?;
    if rows == 0 {
        return Err(ApiError::not_found("daily work item", &id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_daily_work(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.delete_daily_work(&user.user_id, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("daily work item", &id))
    }
}
