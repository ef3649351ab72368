
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::util::ServiceExt;

use super::{AppState, build_api_router};
use crate::core::brain::ConversationBrain;
use crate::core::integrations::{CalendarClient, Notifier, SheetsClient};
use crate::core::llm::{ChatMessage, LlmManager, LlmProvider, ProviderType};
use crate::core::oauth::PendingStates;
use crate::core::session::SessionKeys;
use crate::core::store::{Store, test_store};
use crate::core::vault::SecretsVault;

pub(super) const SECRET: &str = "test-secret-test-secret-test-secret";

/// Replies with a fixed string, or fails when none is given.
pub(super) struct FixedReply(pub Option<String>);

#[async_trait]
impl LlmProvider for FixedReply {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    async fn generate(&self, _model_id: &str, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        self.0
            .clone()
            .ok_or_else(|| anyhow::anyhow!("provider unavailable"))
    }
}

pub(super) struct TestApp {
    pub state: AppState,
    pub store: Arc<Store>,
    pub token: String,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_api_router(self.state.clone())
    }

    pub fn token_for(&self, user_id: &str) -> String {
        self.state
            .sessions
            .issue(&format!("{}@example.com", user_id), user_id)
            .unwrap()
    }
}

pub(super) async fn test_app(provider: Option<FixedReply>) -> TestApp {
    let store = Arc::new(test_store());
    let vault = SecretsVault::new(store.get_db()).unwrap();
    vault.initialize().await.expect("vault init");

    let mut llm = LlmManager::new();
    if let Some(provider) = provider {
        llm.register_provider(Box::new(provider));
        llm.set_active(ProviderType::OpenAI, "test-model".into());
    }
    let brain = ConversationBrain::new(
        store.clone(),
        Arc::new(RwLock::new(llm)),
        Duration::from_secs(5),
    );
    let sessions = SessionKeys::new(SECRET.to_string(), 1).unwrap();
    let token = sessions.issue("chief@example.com", "u-1").unwrap();
    let (log_tx, _) = tokio::sync::broadcast::channel(16);

    let state = AppState {
        store: store.clone(),
        brain: Arc::new(brain),
        sessions: Arc::new(sessions),
        vault: Arc::new(vault),
        google: None,
        oauth_states: Arc::new(PendingStates::default()),
        notifier: Arc::new(Notifier::new(None)),
        calendar: Arc::new(CalendarClient::new(None)),
        sheets: Arc::new(SheetsClient::new(None)),
        log_tx,
        api_port: 17890,
    };
    TestApp {
        state,
        store,
        token,
    }
}

pub(super) async fn json_request(
    app: Router,
    method: Method,
    path: &str,
    body: Option<serde_json::Value>,
    token: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let body = match body {
        Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
        None => Body::empty(),
    };
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let body_bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::json!({}));
    (status, json)
}
