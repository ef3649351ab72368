use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::store::types::{
    Conversation, ConversationUpsert, DnaItem, DnaUpsert, PlanWeek, PlanWeekUpsert, Upserted,
};

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    limit: Option<usize>,
}

fn upsert_status(upserted: &Upserted) -> StatusCode {
    if upserted.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Conversation>>> {
    Ok(Json(
        state
            .store
            .list_conversations(&user.user_id, query.limit)
            .await?,
    ))
}

pub async fn upsert_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(upsert): Json<ConversationUpsert>,
) -> ApiResult<(StatusCode, Json<Upserted>)> {
    if upsert.meeting_number < 1 {
        return Err(ApiError::BadRequest("meeting_number must be positive".into()));
    }
    let out = state
        .store
        .upsert_conversation(&user.user_id, &upsert)
        .await?;
    Ok((upsert_status(&out), Json(out)))
}

pub async fn list_dna(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<DnaItem>>> {
    Ok(Json(state.store.list_dna_items(&user.user_id).await?))
}

pub async fn upsert_dna(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(upsert): Json<DnaUpsert>,
) -> ApiResult<(StatusCode, Json<Upserted>)> {
    if upsert.component_name.trim().is_empty() {
        return Err(ApiError::BadRequest("component_name is required".into()));
    }
    let out = state.store.upsert_dna_item(&user.user_id, &upsert).await?;
    Ok((upsert_status(&out), Json(out)))
}

pub async fn list_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<PlanWeek>>> {
    Ok(Json(state.store.list_plan_weeks(&user.user_id).await?))
}

pub async fn upsert_plan_week(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(upsert): Json<PlanWeekUpsert>,
) -> ApiResult<(StatusCode, Json<Upserted>)> {
    if upsert.week_number < 1 {
        return Err(ApiError::BadRequest("week_number must be positive".into()));
    }
    let out = state.store.upsert_plan_week(&user.user_id, &upsert).await?;
    Ok((upsert_status(&out), Json(out)))
}
