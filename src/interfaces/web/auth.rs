use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use super::error::ApiError;

/// The signed-in user, placed in request extensions by [`require_auth`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.sessions.verify_header(header) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthUser {
                user_id: claims.user_id,
                email: claims.sub,
            });
            next.run(req).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
