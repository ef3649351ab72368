use axum::{
    Extension, Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::{ApiError, ApiResult};
use crate::core::vault::google_token_key;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "llm_configured": state.brain.is_configured().await,
        "google_login": state.google.is_some(),
    }))
}

pub async fn google_login(State(state): State<AppState>) -> ApiResult<Redirect> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Google login is not configured".into()))?;
    let oauth_state = state.oauth_states.issue().await;
    Ok(Redirect::to(&google.build_auth_url(&oauth_state)))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Json<Value>> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Google login is not configured".into()))?;
    if let Some(error) = query.error {
        return Err(ApiError::Unauthorized(format!("Google login refused: {}", error)));
    }
    let oauth_state = query.state.unwrap_or_default();
    if !state.oauth_states.consume(&oauth_state).await {
        return Err(ApiError::BadRequest("unknown or expired login state".into()));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing code".into()))?;

    let identity = google
        .exchange_code(&code)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    let user = state
        .store
        .upsert_user(&identity.email, &identity.name, &identity.sub)
        .await?;

    state
        .vault
        .set_secret(&google_token_key(&user.id, "access"), &identity.access_token)
        .await?;
    match &identity.refresh_token {
        Some(refresh) => {
            state
                .vault
                .set_secret(&google_token_key(&user.id, "refresh"), refresh)
                .await?
        }
        None => warn!("Google returned no refresh token for {}", user.email),
    }

    let token = state.sessions.issue(&user.email, &user.id)?;
    info!("User signed in: {}", user.email);
    Ok(Json(json!({ "token": token, "user": user })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let name = state
        .store
        .find_user_by_email(&auth.email)
        .await?
        .map(|u| u.name)
        .unwrap_or_default();
    Ok(Json(json!({
        "user_id": auth.user_id,
        "email": auth.email,
        "name": name,
    })))
}
