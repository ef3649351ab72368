//! Google sign-in: authorization URL, code exchange and the userinfo call.

use anyhow::{Result, anyhow};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/calendar.events",
    "https://www.googleapis.com/auth/spreadsheets",
];

const STATE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    name: String,
}

/// What a successful login yields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleIdentity {
    pub email: String,
    pub name: String,
    pub sub: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    pub client_id: String,
    client_secret: String,
    pub redirect_uri: String,
    token_url: String,
    userinfo_url: String,
}

pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

impl GoogleOAuth {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }

    pub fn build_auth_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            state
        )
    }

    /// Code for tokens, then tokens for the profile.
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleIdentity> {
        let client = reqwest::Client::new();
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body: {}", e))?;
        if !status.is_success() {
            return Err(anyhow!("Token exchange failed (HTTP {}): {}", status, body));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse token response: {}", e))?;
        if let Some(error) = token.error {
            let desc = token.error_description.unwrap_or_default();
            return Err(anyhow!("OAuth error: {} - {}", error, desc));
        }
        let access_token = token
            .access_token
            .ok_or_else(|| anyhow!("No access_token in token response"))?;

        let info: UserInfo = client
            .get(&self.userinfo_url)
            .bearer_auth(&access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let email = info
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| anyhow!("Google profile has no email"))?;

        Ok(GoogleIdentity {
            email,
            name: info.name,
            sub: info.sub,
            access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        })
    }
}

/// Outstanding `state` values from login redirects. Each is accepted once.
#[derive(Default)]
pub struct PendingStates {
    states: Mutex<HashMap<String, Instant>>,
}

impl PendingStates {
    pub async fn issue(&self) -> String {
        let state = generate_state();
        let mut states = self.states.lock().await;
        states.retain(|_, issued| issued.elapsed() < STATE_TTL);
        states.insert(state.clone(), Instant::now());
        state
    }

    pub async fn consume(&self, state: &str) -> bool {
        match self.states.lock().await.remove(state) {
            Some(issued) => issued.elapsed() < STATE_TTL,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_encodes_redirect_and_scopes() {
        let oauth = GoogleOAuth::new(
            "client id".into(),
            "secret".into(),
            "http://localhost:17890/api/auth/google/callback".into(),
        );
        let url = oauth.build_auth_url("abc");
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A17890%2Fapi%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("calendar.events"));
        assert!(url.contains("state=abc"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn states_are_random_alphanumeric() {
        let a = generate_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, generate_state());
    }

    #[tokio::test]
    async fn state_is_single_use() {
        let pending = PendingStates::default();
        let state = pending.issue().await;
        assert!(pending.consume(&state).await);
        assert!(!pending.consume(&state).await);
        assert!(!pending.consume("forged").await);
    }
}
