// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::{get, post};
use http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use reqwest::Client;

use crate::cache::token_store::TokenStore;
use crate::config::sources::{IdentityConfig, SearchConfig};
use crate::resilience::retry::RetrySettings;
use crate::sources::identity::IdentityClient;
use crate::sources::search::SearchClient;

pub const IDENTITY_PATH: &str = "/identity/v1/oauth2/token";
pub const SEARCH_PATH: &str = "/buy/browse/v1/item_summary/search";
/// base64("test-client:test-secret")
pub const TEST_BASIC_AUTH: &str = "Basic dGVzdC1jbGllbnQ6dGVzdC1zZWNyZXQ=";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

pub fn identity_config(url: String) -> IdentityConfig {
    IdentityConfig {
        url,
        client_id: Some("test-client".to_owned()),
        client_secret: Some("test-secret".to_owned()),
        timeout_ms: 2_000,
        ..IdentityConfig::default()
    }
}

pub fn token_store(identity: IdentityConfig) -> TokenStore {
    TokenStore::new(IdentityClient::new(build_reqwest_client(), identity))
}

pub fn search_client(url: String, timeout_ms: u64) -> SearchClient {
    SearchClient::new(
        build_reqwest_client(),
        SearchConfig { url, timeout_ms, page_size: 50 },
    )
}

pub fn fast_retry(attempts: u32) -> RetrySettings {
    RetrySettings { attempts, base_delay_ms: 10, max_delay_ms: 20 }
}

/// Identity endpoint answering `respond(call_index)`.
pub struct IdentityStub {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    pub handle: JoinHandle<()>,
}

impl IdentityStub {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_identity<F>(respond: F) -> IdentityStub
where
    F: Fn(usize) -> (StatusCode, serde_json::Value) + Clone + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(IDENTITY_PATH, post(move || {
        let counter = counter.clone();
        let respond = respond.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let (status, body) = respond(n);
            (status, axum::Json(body))
        }
    }));
    let (handle, addr) = spawn_axum(router).await;
    IdentityStub { url: format!("http://{}{}", addr, IDENTITY_PATH), hits, handle }
}

/// Identity endpoint issuing `tok-<n>` valid for an hour on every call.
pub async fn spawn_token_issuer() -> IdentityStub {
    spawn_identity(|n| {
        (StatusCode::OK, json!({"access_token": format!("tok-{}", n), "expires_in": 3600, "token_type": "Application Access Token"}))
    })
    .await
}

/// Search endpoint answering `respond(call_index)` after `delay`, recording bearer headers.
pub struct SearchStub {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    pub authorizations: Arc<Mutex<Vec<String>>>,
    pub handle: JoinHandle<()>,
}

impl SearchStub {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn authorizations(&self) -> Vec<String> {
        self.authorizations.lock().unwrap().clone()
    }
}

pub async fn spawn_search<F>(delay: Duration, respond: F) -> SearchStub
where
    F: Fn(usize) -> (StatusCode, String) + Clone + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let authorizations = Arc::new(Mutex::new(Vec::new()));
    let counter = hits.clone();
    let seen = authorizations.clone();
    let router = Router::new().route(SEARCH_PATH, get(move |headers: HeaderMap| {
        let counter = counter.clone();
        let seen = seen.clone();
        let respond = respond.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let authorization = headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_owned();
            seen.lock().unwrap().push(authorization);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            respond(n)
        }
    }));
    let (handle, addr) = spawn_axum(router).await;
    SearchStub { url: format!("http://{}{}", addr, SEARCH_PATH), hits, authorizations, handle }
}

pub fn items_body(titles: &[&str]) -> String {
    let items: Vec<serde_json::Value> = titles
        .iter()
        .map(|title| json!({"title": title, "price": {"value": "10.00", "currency": "USD"}}))
        .collect();
    json!({"total": items.len(), "itemSummaries": items}).to_string()
}
