use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::llm::{ChatMessage, LlmProvider, ProviderType};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Debug, PartialEq)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug, PartialEq)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResContent,
}

#[derive(Deserialize)]
struct GeminiResContent {
    #[serde(default)]
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    #[serde(default)]
    text: String,
}

pub struct GoogleProvider {
    api_key: String,
    client: Client,
}

impl GoogleProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
        }
    }
}

/// System messages become the system instruction; the rest alternate
/// user/model, with consecutive same-role turns merged since Gemini rejects
/// repeats.
fn to_gemini(messages: &[ChatMessage]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
    let mut system_text: Vec<&str> = Vec::new();
    let mut contents: Vec<GeminiContent> = Vec::new();

    for m in messages {
        if m.role == "system" {
            system_text.push(&m.content);
            continue;
        }
        let role = if m.role == "assistant" { "model" } else { "user" };
        if let Some(last) = contents.last_mut()
            && last.role == role
            && let Some(part) = last.parts.first_mut()
        {
            part.text.push('\n');
            part.text.push_str(&m.content);
            continue;
        }
        contents.push(GeminiContent {
            role: role.to_string(),
            parts: vec![GeminiPart {
                text: m.content.clone(),
            }],
        });
    }

    let system_instruction = (!system_text.is_empty()).then(|| GeminiContent {
        role: "user".to_string(),
        parts: vec![GeminiPart {
            text: system_text.join("\n\n"),
        }],
    });
    (system_instruction, contents)
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Google
    }

    async fn generate(&self, model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        let (system_instruction, contents) = to_gemini(messages);
        let req = GeminiRequest {
            system_instruction,
            contents,
        };
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_BASE_URL, model_id, self.api_key
        );
        let res = self.client.post(&url).json(&req).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Google Gemini API Error ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: GeminiResponse = res.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow!("Gemini returned no candidates"))
    }
}
