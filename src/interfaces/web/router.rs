use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;

use super::handlers::{
    auth as auth_handlers, chat, coaching, daily_work, dashboard, equipment, failures,
    integrations, maintenance, resolved,
};
use super::{AppState, auth, sse_logs_endpoint};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(auth_handlers::health))
        .route("/api/auth/google/login", get(auth_handlers::google_login))
        .route(
            "/api/auth/google/callback",
            get(auth_handlers::google_callback),
        )
        .with_state(state.clone());

    let authed_routes = Router::new()
        .route("/api/auth/me", get(auth_handlers::me))
        .route(
            "/api/failures",
            get(failures::list_failures).post(failures::create_failure),
        )
        .route(
            "/api/failures/{id}",
            put(failures::update_failure).delete(failures::delete_failure),
        )
        .route(
            "/api/resolved-failures",
            get(resolved::list_resolved).post(resolved::create_resolved),
        )
        .route(
            "/api/resolved-failures/{id}",
            put(resolved::update_resolved),
        )
        .route(
            "/api/maintenance",
            get(maintenance::list_maintenance).post(maintenance::create_maintenance),
        )
        .route(
            "/api/maintenance/{id}",
            put(maintenance::update_maintenance).delete(maintenance::delete_maintenance),
        )
        .route(
            "/api/equipment",
            get(equipment::list_equipment).post(equipment::create_equipment),
        )
        .route(
            "/api/equipment/{id}",
            put(equipment::update_equipment).delete(equipment::delete_equipment),
        )
        .route(
            "/api/daily-work",
            get(daily_work::list_daily_work).post(daily_work::create_daily_work),
        )
        .route(
            "/api/daily-work/{id}",
            put(daily_work::update_daily_work).delete(daily_work::delete_daily_work),
        )
        .route(
            "/api/conversations",
            get(coaching::list_conversations).post(coaching::upsert_conversation),
        )
        .route(
            "/api/dna",
            get(coaching::list_dna).post(coaching::upsert_dna),
        )
        .route(
            "/api/ninety-day-plan",
            get(coaching::list_plan).post(coaching::upsert_plan_week),
        )
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/ai-chat", post(chat::ai_chat))
        .route("/api/chat-history/{session_id}", get(chat::chat_history))
        .route(
            "/api/calendar/sync-maintenance",
            post(integrations::sync_maintenance_calendar),
        )
        .route("/api/export/sheets", post(integrations::export_sheets))
        .route(
            "/api/notifications/send",
            post(integrations::send_notification),
        )
        .route("/api/logs", get(sse_logs_endpoint))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .with_state(state.clone());

    public_routes
        .merge(authed_routes)
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.api_port))
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}
