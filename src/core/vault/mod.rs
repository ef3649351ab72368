//! Encrypted key/value storage for credentials that must not sit in
//! `config.toml`: the model API key, the Google client secret and the
//! per-user Google tokens captured at login.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Result, anyhow};
use base64::Engine;
use hmac::Mac;
use rusqlite::Connection;
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

type HmacSha256 = hmac::Hmac<Sha256>;

pub const LLM_API_KEY: &str = "llm_api_key";
pub const GOOGLE_CLIENT_SECRET: &str = "google_client_secret";

/// Vault key under which a user's Google token of `kind` is kept.
pub fn google_token_key(user_id: &str, kind: &str) -> String {
    format!("google_{}:{}", kind, user_id)
}

pub struct SecretsVault {
    db: Arc<Mutex<Connection>>,
    cipher: Aes256Gcm,
}

/// HMAC-SHA256(hostname + username) under a fixed context, so the key is
/// stable across restarts but bound to this machine and account.
fn derive_key() -> Result<[u8; 32]> {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let username = whoami::username();
    let input = format!("{}{}", hostname, username);

    let mut mac = <HmacSha256 as Mac>::new_from_slice(b"maintops-vault-v1")
        .map_err(|e| anyhow!("vault key derivation: {}", e))?;
    mac.update(input.as_bytes());
    let bytes = mac.finalize().into_bytes();

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

impl SecretsVault {
    pub fn new(db: Arc<Mutex<Connection>>) -> Result<Self> {
        let key = derive_key()?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow!("vault cipher: {}", e))?;
        Ok(Self { db, cipher })
    }

    pub async fn initialize(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "CREATE TABLE IF NOT EXISTS secrets_vault (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(())
    }

    /// base64(nonce || ciphertext)
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut combined = Vec::with_capacity(12 + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow!("Base64 decode failed: {}", e))?;

        if combined.len() < 13 {
            return Err(anyhow!("Encrypted value too short"));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| anyhow!("Decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(|e| anyhow!("UTF-8 decode failed: {}", e))
    }

    pub async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        let encrypted = self.encrypt(value)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO secrets_vault (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = CURRENT_TIMESTAMP",
            (key, &encrypted),
        )?;
        Ok(())
    }

    /// A value that no longer decrypts (copied database, changed hostname)
    /// reads as absent rather than failing the caller.
    pub async fn get_secret(&self, key: &str) -> Result<Option<String>> {
        let stored: Option<String> = {
            let db = self.db.lock().await;
            let mut stmt = db.prepare("SELECT value FROM secrets_vault WHERE key = ?1")?;
            let mut rows = stmt.query([key])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };

        match stored {
            Some(encoded) => match self.decrypt(&encoded) {
                Ok(plaintext) => Ok(Some(plaintext)),
                Err(e) => {
                    warn!("Vault key '{}' could not be decrypted: {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT key FROM secrets_vault ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }

    pub async fn remove_secret(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute("DELETE FROM secrets_vault WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_vault() -> SecretsVault {
        let db = Connection::open_in_memory().unwrap();
        SecretsVault::new(Arc::new(Mutex::new(db))).unwrap()
    }

    async fn test_vault() -> SecretsVault {
        let vault = bare_vault();
        vault.initialize().await.expect("init vault tables");
        vault
    }

    #[test]
    fn ciphertext_hides_value_and_decrypts() {
        let vault = bare_vault();
        let a = vault.encrypt("sk-live-key").unwrap();
        let b = vault.encrypt("sk-live-key").unwrap();
        assert_ne!(a, "sk-live-key");
        assert_ne!(a, b, "fresh nonce per write");
        assert_eq!(vault.decrypt(&a).unwrap(), "sk-live-key");
        assert_eq!(vault.decrypt(&b).unwrap(), "sk-live-key");
    }

    #[test]
    fn decrypt_rejects_garbage() {
        let vault = bare_vault();
        let short = base64::engine::general_purpose::STANDARD.encode(b"short");
        assert!(vault.decrypt(&short).is_err());
        assert!(vault.decrypt("not-valid-base64!!!").is_err());
    }

    #[tokio::test]
    async fn set_get_overwrite_remove() {
        let vault = test_vault().await;
        assert_eq!(vault.get_secret(LLM_API_KEY).await.unwrap(), None);
        vault.set_secret(LLM_API_KEY, "old").await.unwrap();
        vault.set_secret(LLM_API_KEY, "new").await.unwrap();
        assert_eq!(
            vault.get_secret(LLM_API_KEY).await.unwrap(),
            Some("new".to_string())
        );
        vault.remove_secret(LLM_API_KEY).await.unwrap();
        assert_eq!(vault.get_secret(LLM_API_KEY).await.unwrap(), None);
        vault.remove_secret("never-set").await.unwrap();
    }

    #[tokio::test]
    async fn undecryptable_value_reads_as_absent() {
        let vault = test_vault().await;
        {
            let db = vault.db.lock().await;
            db.execute(
                "INSERT INTO secrets_vault (key, value) VALUES ('legacy', 'plain text')",
                [],
            )
            .unwrap();
        }
        assert_eq!(vault.get_secret("legacy").await.unwrap(), None);
    }

    #[tokio::test]
    async fn per_user_token_keys_are_distinct() {
        let vault = test_vault().await;
        let a = google_token_key("u-1", "refresh");
        let b = google_token_key("u-2", "refresh");
        vault.set_secret(&a, "r1").await.unwrap();
        vault.set_secret(&b, "r2").await.unwrap();
        vault.set_secret(GOOGLE_CLIENT_SECRET, "cs").await.unwrap();
        assert_eq!(
            vault.list_keys().await.unwrap(),
            vec![
                "google_client_secret".to_string(),
                "google_refresh:u-1".to_string(),
                "google_refresh:u-2".to_string()
            ]
        );
        assert_eq!(vault.get_secret(&a).await.unwrap(), Some("r1".into()));
    }

    #[tokio::test]
    async fn hebrew_values_survive() {
        let vault = test_vault().await;
        vault.set_secret("note", "מפתח סודי").await.unwrap();
        assert_eq!(
            vault.get_secret("note").await.unwrap(),
            Some("מפתח סודי".to_string())
        );
    }
}
