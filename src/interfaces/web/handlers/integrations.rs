use axum::{Extension, Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::integrations::Notification;
use crate::core::integrations::calendar::maintenance_event;
use crate::core::integrations::sheets::{failure_rows, resolved_rows};
use crate::core::store::labels;
use crate::core::vault::google_token_key;

async fn google_access_token(state: &AppState, user_id: &str) -> ApiResult<String> {
    state
        .vault
        .get_secret(&google_token_key(user_id, "access"))
        .await?
        .ok_or_else(|| ApiError::BadRequest("Google account is not linked; sign in again".into()))
}

/// One event per maintenance item with a known due date. Individual
/// failures are counted, not fatal.
pub async fn sync_maintenance_calendar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let token = google_access_token(&state, &user.user_id).await?;
    let items = state
        .store
        .list_maintenance(&user.user_id, Utc::now())
        .await?;

    let mut synced = 0usize;
    let mut failed = 0usize;
    for event in items.iter().filter_map(maintenance_event) {
        match state.calendar.insert_event(&token, &event).await {
            Ok(_) => synced += 1,
            Err(e) => {
                warn!("Calendar insert failed for '{}': {}", event.summary, e);
                failed += 1;
            }
        }
    }
    if synced == 0 && failed > 0 {
        return Err(ApiError::Upstream(format!(
            "calendar rejected all {} events",
            failed
        )));
    }
    info!("Calendar sync for {}: {} synced, {} failed", user.email, synced, failed);
    Ok(Json(json!({ "synced": synced, "failed": failed })))
}

pub async fn export_sheets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    if !state.sheets.is_configured() {
        return Err(ApiError::Unavailable("spreadsheet export is not configured".into()));
    }
    let token = google_access_token(&state, &user.user_id).await?;
    let active = state.store.list_active_failures(&user.user_id).await?;
    let resolved = state.store.list_resolved_failures(&user.user_id).await?;

    let mut rows = 0usize;
    for (sheet, values) in [
        (labels::ACTIVE_FAILURES, failure_rows(&active)),
        (labels::RESOLVED_FAILURES, resolved_rows(&resolved)),
    ] {
        rows += state
            .sheets
            .append_rows(&token, &format!("{}!A1", sheet), values)
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;
    }
    Ok(Json(json!({ "rows": rows })))
}

pub async fn send_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(mut notification): Json<Notification>,
) -> ApiResult<Json<Value>> {
    if notification.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }
    if !state.notifier.is_configured() {
        return Err(ApiError::Unavailable("push notifications are not configured".into()));
    }
    notification.user_id = Some(user.user_id);
    if notification.urgent {
        state
            .notifier
            .send_urgent(&notification)
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;
        Ok(Json(json!({ "status": "sent" })))
    } else {
        state.notifier.queue(notification);
        Ok(Json(json!({ "status": "queued" })))
    }
}
