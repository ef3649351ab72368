use axum::{
    Extension, Json,
    extract::{Path, State},
};

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::brain::{BrainError, TurnRequest, TurnResponse};
use crate::core::store::types::ChatRecord;

/// Always 200 once a model is configured; failures come back as an apology
/// in `response`.
pub async fn ai_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(mut payload): Json<TurnRequest>,
) -> ApiResult<Json<TurnResponse>> {
    if payload.user_message.trim().is_empty() {
        return Err(ApiError::BadRequest("user_message is required".into()));
    }
    if payload.session_id.trim().is_empty() {
        payload.session_id = format!("default:{}", user.user_id);
    }
    payload.user_id = Some(user.user_id);

    match state.brain.handle_turn(payload).await {
        Ok(reply) => Ok(Json(reply)),
        Err(BrainError::NotConfigured) => Err(ApiError::Unavailable(
            "no language model is configured".into(),
        )),
    }
}

pub async fn chat_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<ChatRecord>>> {
    Ok(Json(
        state
            .store
            .list_chat_records(&session_id, Some(&user.user_id))
            .await?,
    ))
}
