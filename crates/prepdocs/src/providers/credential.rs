//! Credentials for Azure services
//!
//! Key credentials authenticate search requests; services that only accept
//! bearer tokens (Content Understanding, Vision) need a [`TokenCredential`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Source of bearer tokens for a scope
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Get a valid access token for the scope
    async fn get_token(&self, scope: &str) -> Result<String>;
}

/// Credential handed to collaborators
#[derive(Clone)]
pub enum AzureCredential {
    /// Static API key
    Key(String),
    /// Bearer tokens on demand
    Token(Arc<dyn TokenCredential>),
}

impl AzureCredential {
    pub fn is_key(&self) -> bool {
        matches!(self, Self::Key(_))
    }

    /// The token credential, if this is not a key credential
    pub fn token_credential(&self) -> Option<Arc<dyn TokenCredential>> {
        match self {
            Self::Key(_) => None,
            Self::Token(credential) => Some(Arc::clone(credential)),
        }
    }
}

impl fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(_) => f.write_str("AzureCredential::Key(****)"),
            Self::Token(_) => f.write_str("AzureCredential::Token"),
        }
    }
}

/// A pre-issued token returned for every scope
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct CliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Expiry as Unix seconds (az CLI 2.54+)
    #[serde(default)]
    expires_on: Option<u64>,
}

/// Tokens from the Azure CLI, cached per scope
pub struct AzureCliCredential {
    program: String,
    tokens: RwLock<HashMap<String, CachedToken>>,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch_token(&self, scope: &str) -> Result<CachedToken> {
        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--scope", scope])
            .output()
            .await
            .map_err(|e| Error::config(format!("failed to run Azure CLI: {}", e)))?;

        if !output.status.success() {
            return Err(Error::config(format!(
                "Azure CLI could not issue a token for {}: {}",
                scope,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token: CliToken = serde_json::from_slice(&output.stdout)?;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: expiry_instant(token.expires_on),
        })
    }
}

/// Convert a Unix expiry to an `Instant`, assuming 55 minutes when unknown
fn expiry_instant(expires_on: Option<u64>) -> Instant {
    let now_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let remaining = match expires_on {
        Some(expires_on) => Duration::from_secs(expires_on.saturating_sub(now_unix)),
        None => Duration::from_secs(55 * 60),
    };
    Instant::now() + remaining
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, scope: &str) -> Result<String> {
        {
            let tokens = self.tokens.read().await;
            if let Some(cached) = tokens.get(scope) {
                // Token valid for at least 60 more seconds
                if cached.expires_at > Instant::now() + Duration::from_secs(60) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let fresh = self.fetch_token(scope).await?;
        tracing::debug!("Fetched Azure CLI token for {}", scope);

        let access_token = fresh.access_token.clone();
        self.tokens.write().await.insert(scope.to_string(), fresh);
        Ok(access_token)
    }
}
