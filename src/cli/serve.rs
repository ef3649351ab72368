use anyhow::Result;
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::{load_config, parse_api_server_flags};
use crate::core::brain::ConversationBrain;
use crate::core::config::AppConfig;
use crate::core::integrations::{CalendarClient, Notifier, SheetsClient};
use crate::core::lifecycle::{LifecycleManager, ReconcileSweep};
use crate::core::llm::providers::{GoogleProvider, OpenAiProvider};
use crate::core::llm::{LlmManager, ProviderType};
use crate::core::oauth::{GoogleOAuth, PendingStates};
use crate::core::session::SessionKeys;
use crate::core::store::Store;
use crate::core::terminal::{GuideSection, print_link, print_status, print_warn};
use crate::core::vault::{self, SecretsVault};
use crate::interfaces::web::{ApiServer, AppState};
use crate::logging::init_logging;

/// Register the configured provider when a key is available, env first, then
/// the vault. Without one the server still runs; chat answers 503.
async fn build_llm(config: &AppConfig, vault: &SecretsVault) -> Result<LlmManager> {
    let mut llm = LlmManager::new();
    let key = match config.llm_api_key.clone() {
        Some(key) => Some(key),
        None => vault.get_secret(vault::LLM_API_KEY).await?,
    };
    let Some(key) = key else {
        warn!("No LLM API key in environment or vault; chat is disabled");
        return Ok(llm);
    };

    let provider_name = config.llm_provider.as_deref().unwrap_or("openai");
    let Some(provider) = ProviderType::parse(provider_name) else {
        warn!("Unknown llm_provider '{}'; chat is disabled", provider_name);
        return Ok(llm);
    };
    match provider {
        ProviderType::OpenAI => llm.register_provider(Box::new(OpenAiProvider::new(
            key,
            config.llm_base_url.clone(),
        ))),
        ProviderType::Google => llm.register_provider(Box::new(GoogleProvider::new(key))),
    }
    info!(
        "Chat model: {} ({})",
        provider.as_str(),
        config.llm_model_or_default()
    );
    llm.set_active(provider, config.llm_model_or_default());
    Ok(llm)
}

fn build_sessions(config: &AppConfig) -> Result<SessionKeys> {
    match config.jwt_secret.clone() {
        Some(secret) => Ok(SessionKeys::new(secret, config.jwt_expiry_hours)?),
        None => {
            warn!("jwt_secret is not set; sessions will not survive a restart");
            Ok(SessionKeys::ephemeral(config.jwt_expiry_hours))
        }
    }
}

async fn build_google(
    config: &AppConfig,
    vault: &SecretsVault,
) -> Result<Option<Arc<GoogleOAuth>>> {
    let Some(client_id) = config.google_client_id.clone() else {
        return Ok(None);
    };
    let Some(client_secret) = vault.get_secret(vault::GOOGLE_CLIENT_SECRET).await? else {
        warn!(
            "google_client_id is set but '{}' is missing from the vault; Google sign-in is disabled",
            vault::GOOGLE_CLIENT_SECRET
        );
        return Ok(None);
    };
    let redirect_uri = config.google_redirect_uri.clone().unwrap_or_else(|| {
        format!(
            "http://{}:{}/api/auth/google/callback",
            config.api_host, config.api_port
        )
    });
    Ok(Some(Arc::new(GoogleOAuth::new(
        client_id,
        client_secret,
        redirect_uri,
    ))))
}

pub async fn run_serve(args: &[String]) -> Result<()> {
    let mut config = load_config().await?;
    (config.api_host, config.api_port) =
        parse_api_server_flags(args, 2, config.api_host.clone(), config.api_port);
    let log_tx = init_logging(&config.log_level);

    let store = Arc::new(Store::open(config.database_path()).await?);
    let vault = Arc::new(SecretsVault::new(store.get_db())?);
    vault.initialize().await?;

    let llm = build_llm(&config, &vault).await?;
    let brain = Arc::new(ConversationBrain::new(
        store.clone(),
        Arc::new(RwLock::new(llm)),
        Duration::from_secs(config.llm_timeout_secs),
    ));
    let google = build_google(&config, &vault).await?;

    let state = AppState {
        store: store.clone(),
        brain: brain.clone(),
        sessions: Arc::new(build_sessions(&config)?),
        vault,
        google,
        oauth_states: Arc::new(PendingStates::default()),
        notifier: Arc::new(Notifier::new(config.push_webhook_url.clone())),
        calendar: Arc::new(CalendarClient::new(config.calendar_id.clone())),
        sheets: Arc::new(SheetsClient::new(config.sheets_spreadsheet_id.clone())),
        log_tx,
        api_port: config.api_port,
    };

    let mut lifecycle = LifecycleManager::new().await?;
    lifecycle.attach(Arc::new(Mutex::new(ReconcileSweep::new(
        store,
        config.reconcile_cron.clone(),
        lifecycle.scheduler.clone(),
    ))));
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(
        state,
        config.api_host.clone(),
        config.api_port,
    ))));
    lifecycle.start().await?;

    print_status("Database", &config.database_path().display().to_string());
    print_link(
        "API",
        &format!("http://{}:{}", config.api_host, config.api_port),
    );
    if !brain.is_configured().await {
        print_warn("No language model configured. Run 'maintops vault set llm_api_key <key>'.");
    }
    GuideSection::new("Running")
        .text(&format!(
            "Press {} to stop the server.",
            style("Ctrl+C").bold().yellow()
        ))
        .print();

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    Ok(())
}
