use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::config::settings::SettingsConfig;
use crate::errors::SearchError;

pub const IDENTITY_URL_DEFAULT: &str = "https://api.ebay.com/identity/v1/oauth2/token";
pub const SCOPE_DEFAULT: &str = "https://api.ebay.com/oauth/api_scope";
pub const SEARCH_URL_DEFAULT: &str = "https://api.ebay.com/buy/browse/v1/item_summary/search";

pub const SAFETY_BUFFER_SECONDS_DEFAULT: u64 = 60;
pub const SAFETY_BUFFER_SECONDS_MIN: u64 = 60;
pub const SAFETY_BUFFER_SECONDS_MAX: u64 = 120;

pub const IDENTITY_TIMEOUT_MS_DEFAULT: u64 = 10_000;
pub const SEARCH_TIMEOUT_MS_DEFAULT: u64 = 15_000;

pub const PAGE_SIZE_DEFAULT: u32 = 100;
pub const PAGE_SIZE_MAX: u32 = 200;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// ================================
/// Identity endpoint (client-credentials grant)
/// ================================
#[derive(Deserialize, Clone)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_url")]
    pub url: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_safety_buffer_seconds")]
    pub safety_buffer_seconds: u64,
    #[serde(default = "default_identity_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: default_identity_url(),
            client_id: None,
            client_secret: None,
            scope: default_scope(),
            safety_buffer_seconds: default_safety_buffer_seconds(),
            timeout_ms: default_identity_timeout_ms(),
        }
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("scope", &self.scope)
            .field("safety_buffer_seconds", &self.safety_buffer_seconds)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Client id/secret pair, or a configuration error naming what is missing.
    pub fn client_credentials(&self) -> Result<ClientCredentials, SearchError> {
        let client_id = non_empty(&self.client_id);
        let client_secret = non_empty(&self.client_secret);

        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(ClientCredentials {
                client_id: client_id.to_owned(),
                client_secret: client_secret.to_owned(),
            }),
            (client_id, client_secret) => {
                let mut missing = Vec::new();
                if client_id.is_none() {
                    missing.push("client_id");
                }
                if client_secret.is_none() {
                    missing.push("client_secret");
                }
                Err(SearchError::Configuration(format!(
                    "missing credentials: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Validated client id/secret pair.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    /// `Basic base64(client_id:client_secret)`
    pub fn basic_authorization(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        format!("Basic {}", encoded)
    }
}

/// ================================
/// Search endpoint
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            timeout_ms: default_search_timeout_ms(),
            page_size: default_page_size(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_identity_url() -> String {
    IDENTITY_URL_DEFAULT.to_string()
}

fn default_scope() -> String {
    SCOPE_DEFAULT.to_string()
}

fn default_safety_buffer_seconds() -> u64 {
    SAFETY_BUFFER_SECONDS_DEFAULT
}

fn default_identity_timeout_ms() -> u64 {
    IDENTITY_TIMEOUT_MS_DEFAULT
}

fn default_search_url() -> String {
    SEARCH_URL_DEFAULT.to_string()
}

fn default_search_timeout_ms() -> u64 {
    SEARCH_TIMEOUT_MS_DEFAULT
}

fn default_page_size() -> u32 {
    PAGE_SIZE_DEFAULT
}
