pub(crate) mod auth;
mod error;
mod handlers;
mod router;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};

use crate::core::brain::ConversationBrain;
use crate::core::integrations::{CalendarClient, Notifier, SheetsClient};
use crate::core::lifecycle::LifecycleComponent;
use crate::core::oauth::{GoogleOAuth, PendingStates};
use crate::core::session::SessionKeys;
use crate::core::store::Store;
use crate::core::vault::SecretsVault;

pub use router::build_api_router;

/// Services shared by every request. Built once by `serve`.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<Store>,
    pub(crate) brain: Arc<ConversationBrain>,
    pub(crate) sessions: Arc<SessionKeys>,
    pub(crate) vault: Arc<SecretsVault>,
    pub(crate) google: Option<Arc<GoogleOAuth>>,
    pub(crate) oauth_states: Arc<PendingStates>,
    pub(crate) notifier: Arc<Notifier>,
    pub(crate) calendar: Arc<CalendarClient>,
    pub(crate) sheets: Arc<SheetsClient>,
    pub(crate) log_tx: broadcast::Sender<String>,
    pub(crate) api_port: u16,
}

pub struct ApiServer {
    state: AppState,
    api_host: String,
    api_port: u16,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub(crate) fn new(state: AppState, api_host: String, api_port: u16) -> Self {
        Self {
            state,
            api_host,
            api_port,
            handle: None,
        }
    }
}

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });
    Sse::new(stream)
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind API server on {}", addr))?;
        let app = build_api_router(self.state.clone());

        info!("API Server running at http://{addr}");
        self.handle = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server shutting down...");
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        Ok(())
    }
}
