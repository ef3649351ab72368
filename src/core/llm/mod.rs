pub mod providers;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderType {
    OpenAI,
    Google,
}

impl ProviderType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" => Some(ProviderType::OpenAI),
            "google" | "gemini" => Some(ProviderType::Google),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Google => "google",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    // Execute a prompt against a selected model using a structured conversation history
    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String>;
}

pub struct LlmManager {
    providers: Vec<Box<dyn LlmProvider>>,
    selected_provider: Option<ProviderType>,
    selected_model: Option<String>,
}

impl Default for LlmManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmManager {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            selected_provider: None,
            selected_model: None,
        }
    }

    pub fn register_provider(&mut self, provider: Box<dyn LlmProvider>) {
        info!("Registered LLM Provider: {:?}", provider.provider_type());
        self.providers.push(provider);
    }

    pub fn set_active(&mut self, provider: ProviderType, model_id: String) {
        info!("Setting active LLM: {:?} ({})", provider, model_id);
        self.selected_provider = Some(provider);
        self.selected_model = Some(model_id);
    }

    pub fn get_provider(&self, pt: &ProviderType) -> Option<&dyn LlmProvider> {
        self.providers
            .iter()
            .find(|p| p.provider_type() == *pt)
            .map(|p| p.as_ref())
    }

    /// True when a provider with credentials is registered and selected.
    pub fn is_configured(&self) -> bool {
        match (&self.selected_provider, &self.selected_model) {
            (Some(pt), Some(model)) => !model.is_empty() && self.get_provider(pt).is_some(),
            _ => false,
        }
    }

    pub async fn generate_with_selected(&self, messages: &[ChatMessage]) -> Result<String> {
        let provider_type = self.selected_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!("No LLM Provider selected. Set llm_provider in config.toml.")
        })?;

        let model_id = self
            .selected_model
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No LLM Model selected."))?;

        let provider = self
            .get_provider(provider_type)
            .ok_or_else(|| anyhow::anyhow!("Selected provider has no API key in the vault"))?;

        provider.generate(model_id, messages).await
    }
}
