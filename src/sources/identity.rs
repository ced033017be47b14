use std::sync::Arc;

use http::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::sources::IdentityConfig;
use crate::errors::SearchError;

const GRANT_TYPE: &str = "client_credentials";

/// Parsed answer of the identity endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

// every field optional: a missing one is reported by name instead of as a serde error
#[derive(Debug, Deserialize)]
struct TokenGrantBody {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Performs the OAuth2 client-credentials grant.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    pub client: Client,
    pub cfg: Arc<IdentityConfig>,
}

impl IdentityClient {
    pub fn new(client: Client, cfg: IdentityConfig) -> Self {
        Self { client, cfg: Arc::new(cfg) }
    }

    pub fn safety_buffer_seconds(&self) -> u64 {
        self.cfg.safety_buffer_seconds
    }

    /// Client id used for diagnostics, never the secret.
    pub fn issued_from(&self) -> String {
        self.cfg
            .client_id
            .clone()
            .unwrap_or_else(|| "<unset>".to_owned())
    }

    pub async fn request_token(&self) -> Result<TokenGrant, SearchError> {
        let credentials = self.cfg.client_credentials()?;

        debug!("requesting access token from '{}' for client '{}'", self.cfg.url, credentials.client_id);
        let response = self
            .client
            .post(&self.cfg.url)
            .header(AUTHORIZATION, credentials.basic_authorization())
            .timeout(self.cfg.timeout())
            .form(&[("grant_type", GRANT_TYPE), ("scope", self.cfg.scope.as_str())])
            .send()
            .await
            .map_err(|err| SearchError::authentication(None, format!("token request failed: {}", err)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SearchError::authentication(Some(status.as_u16()), format!("token response unreadable: {}", err)))?;

        if !status.is_success() {
            warn!("identity endpoint answered {}", status);
            return Err(SearchError::authentication(Some(status.as_u16()), body));
        }

        parse_token_grant(status.as_u16(), &body)
    }
}

pub fn parse_token_grant(status: u16, body: &str) -> Result<TokenGrant, SearchError> {
    let parsed: TokenGrantBody = serde_json::from_str(body)
        .map_err(|err| SearchError::authentication(Some(status), format!("invalid JSON response: {}", err)))?;

    let mut missing = Vec::new();
    if parsed.access_token.is_none() {
        missing.push("access_token");
    }
    if parsed.expires_in.is_none() {
        missing.push("expires_in");
    }

    match (parsed.access_token, parsed.expires_in) {
        (Some(access_token), Some(expires_in)) => {
            if access_token.is_empty() {
                return Err(SearchError::authentication(Some(status), "invalid token response: empty access_token"));
            }
            if expires_in == 0 {
                return Err(SearchError::authentication(Some(status), "invalid token response: expires_in is 0"));
            }
            Ok(TokenGrant { access_token, expires_in })
        }
        _ => Err(SearchError::authentication(
            Some(status),
            format!("invalid token response: missing {}", missing.join(", ")),
        )),
    }
}
