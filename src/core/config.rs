use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE: &str = "config.toml";
pub const DATABASE_FILE: &str = "maintops.db";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Relative paths resolve against the data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HS256 secret for session tokens.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: i64,

    /// `openai` or `google`.
    #[serde(default)]
    pub llm_provider: Option<String>,

    #[serde(default)]
    pub llm_model: Option<String>,

    /// Override for OpenAI-compatible endpoints.
    #[serde(default)]
    pub llm_base_url: Option<String>,

    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Only honoured from the environment; the vault is the normal home for it.
    #[serde(skip)]
    pub llm_api_key: Option<String>,

    #[serde(default)]
    pub google_client_id: Option<String>,

    #[serde(default)]
    pub google_redirect_uri: Option<String>,

    #[serde(default)]
    pub push_webhook_url: Option<String>,

    #[serde(default)]
    pub sheets_spreadsheet_id: Option<String>,

    #[serde(default)]
    pub calendar_id: Option<String>,

    #[serde(default = "default_reconcile_cron")]
    pub reconcile_cron: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(skip)]
    pub data_dir: PathBuf,
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    17890
}
fn default_jwt_expiry_hours() -> i64 {
    24 * 7
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_reconcile_cron() -> String {
    // sec min hour day month weekday
    "0 */10 * * * *".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            api_port: default_api_port(),
            database_path: None,
            jwt_secret: None,
            jwt_expiry_hours: default_jwt_expiry_hours(),
            llm_provider: None,
            llm_model: None,
            llm_base_url: None,
            llm_timeout_secs: default_llm_timeout_secs(),
            llm_api_key: None,
            google_client_id: None,
            google_redirect_uri: None,
            push_webhook_url: None,
            sheets_spreadsheet_id: None,
            calendar_id: None,
            reconcile_cron: default_reconcile_cron(),
            log_level: default_log_level(),
            data_dir: PathBuf::new(),
        }
    }
}

impl AppConfig {
    /// Read `config.toml` from `data_dir` (absent file means defaults), then
    /// overlay `MAINTOPS_*` environment variables.
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let config_path = data_dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path).await?;
            toml::from_str::<AppConfig>(&content)?
        } else {
            AppConfig::default()
        };
        config.data_dir = data_dir;
        config.apply_env_with(|key| std::env::var(key).ok())?;
        info!(
            "Loaded config: api={}:{}, llm={}/{}, timeout={}s",
            config.api_host,
            config.api_port,
            config.llm_provider.as_deref().unwrap_or("-"),
            config.llm_model.as_deref().unwrap_or("-"),
            config.llm_timeout_secs
        );
        Ok(config)
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MAINTOPS_API_HOST") {
            self.api_host = v;
        }
        if let Some(v) = get("MAINTOPS_API_PORT") {
            self.api_port = match v.trim().parse() {
                Ok(port) => port,
                Err(_) => bail!("MAINTOPS_API_PORT is not a port number: {}", v),
            };
        }
        if let Some(v) = get("MAINTOPS_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MAINTOPS_JWT_SECRET") {
            self.jwt_secret = Some(v);
        }
        if let Some(v) = get("MAINTOPS_JWT_EXPIRY_HOURS") {
            self.jwt_expiry_hours = match v.trim().parse() {
                Ok(hours) => hours,
                Err(_) => bail!("MAINTOPS_JWT_EXPIRY_HOURS is not a number: {}", v),
            };
        }
        if let Some(v) = get("MAINTOPS_LLM_PROVIDER") {
            self.llm_provider = Some(v);
        }
        if let Some(v) = get("MAINTOPS_LLM_MODEL") {
            self.llm_model = Some(v);
        }
        if let Some(v) = get("MAINTOPS_LLM_BASE_URL") {
            self.llm_base_url = Some(v);
        }
        if let Some(v) = get("MAINTOPS_LLM_API_KEY") {
            self.llm_api_key = Some(v);
        }
        if let Some(v) = get("MAINTOPS_LLM_TIMEOUT_SECS") {
            self.llm_timeout_secs = match v.trim().parse() {
                Ok(secs) => secs,
                Err(_) => bail!("MAINTOPS_LLM_TIMEOUT_SECS is not a number: {}", v),
            };
        }
        if let Some(v) = get("MAINTOPS_GOOGLE_CLIENT_ID") {
            self.google_client_id = Some(v);
        }
        if let Some(v) = get("MAINTOPS_GOOGLE_REDIRECT_URI") {
            self.google_redirect_uri = Some(v);
        }
        if let Some(v) = get("MAINTOPS_PUSH_WEBHOOK_URL") {
            self.push_webhook_url = Some(v);
        }
        if let Some(v) = get("MAINTOPS_RECONCILE_CRON") {
            self.reconcile_cron = v;
        }
        if let Some(v) = get("MAINTOPS_LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.data_dir.join(path),
            None => self.data_dir.join(DATABASE_FILE),
        }
    }

    pub fn llm_model_or_default(&self) -> String {
        match (&self.llm_model, self.llm_provider.as_deref()) {
            (Some(model), _) if !model.trim().is_empty() => model.clone(),
            (_, Some("google") | Some("gemini")) => "gemini-2.5-flash".to_string(),
            _ => "gpt-4o-mini".to_string(),
        }
    }
}
