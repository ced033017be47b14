// Token store behaviour against a live identity endpoint:
//  - one refresh per expiry no matter how many callers race on it
//  - cached credentials served without network
//  - invalidate forces exactly one refresh
//  - failed refreshes leave the cached credential alone

#[cfg(test)]
mod test {

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{routing::post, Form, Router};
use chrono::TimeDelta;
use http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use crate::config::sources::IdentityConfig;
use crate::errors::SearchError;
use crate::helpers::time::{far_past, now};
use crate::tests::common::{identity_config, spawn_axum, spawn_identity, spawn_token_issuer, token_store, IDENTITY_PATH, TEST_BASIC_AUTH};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_refresh() {
    let identity_server = MockServer::start_async().await;
    let identity_mock = identity_server.mock_async(|when, then| {
        when.method(POST)
            .path(IDENTITY_PATH)
            .header("Authorization", TEST_BASIC_AUTH);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "access_token": "shared-token",
                "expires_in": 7200,
                "token_type": "Application Access Token"
            }))
            .delay(Duration::from_millis(300));
    }).await;

    let store = token_store(identity_config(identity_server.url(IDENTITY_PATH)));

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.acquire().await })
        })
        .collect();

    for caller in callers {
        let token = caller.await.expect("caller panicked").expect("acquire failed");
        assert_eq!(token, "shared-token");
    }

    // exactly one identity round trip
    identity_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn valid_credential_is_served_without_network() {
    let identity = spawn_token_issuer().await;
    let store = token_store(identity_config(identity.url.clone()));

    store.seed("seeded", now() + TimeDelta::hours(1)).await;
    assert_eq!(store.acquire().await.unwrap(), "seeded");
    assert_eq!(store.acquire().await.unwrap(), "seeded");
    assert_eq!(identity.hits(), 0);

    identity.handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetched_credential_is_reused_until_expiry() {
    let identity = spawn_token_issuer().await;
    let store = token_store(identity_config(identity.url.clone()));

    assert_eq!(store.acquire().await.unwrap(), "tok-0");
    assert_eq!(store.acquire().await.unwrap(), "tok-0");
    assert_eq!(identity.hits(), 1);

    let (_, valid_until) = store.cached().await;
    // 3600s lifetime minus the default 60s buffer
    let remaining = (valid_until - now()).num_seconds();
    assert!(remaining > 3500 && remaining <= 3540, "remaining {}", remaining);

    identity.handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalidate_forces_exactly_one_refresh() {
    let identity = spawn_token_issuer().await;
    let store = token_store(identity_config(identity.url.clone()));

    store.seed("seeded", now() + TimeDelta::days(365)).await;
    store.invalidate().await;
    // redundant invalidation is harmless
    store.invalidate().await;

    let callers: Vec<_> = (0..5)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.acquire().await })
        })
        .collect();
    for caller in callers {
        assert_eq!(caller.await.unwrap().unwrap(), "tok-0");
    }
    assert_eq!(identity.hits(), 1);

    identity.handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_expires_in_leaves_cached_credential_untouched() {
    let identity = spawn_identity(|_| (StatusCode::OK, json!({"access_token": "no-expiry"}))).await;
    let store = token_store(identity_config(identity.url.clone()));

    // empty store stays empty
    let err = store.acquire().await.unwrap_err();
    assert_eq!(err, SearchError::authentication(Some(200), "invalid token response: missing expires_in"));
    assert_eq!(store.cached().await.0, "");

    // previously fetched credential survives the failed refresh
    store.seed("seeded", now() + TimeDelta::hours(1)).await;
    store.invalidate().await;
    let err = store.acquire().await.unwrap_err();
    assert!(matches!(err, SearchError::Authentication { .. }));

    let (value, valid_until) = store.cached().await;
    assert_eq!(value, "seeded");
    assert_eq!(valid_until, far_past());
    assert_eq!(identity.hits(), 2);

    identity.handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_credentials_fail_without_network_call() {
    let identity = spawn_token_issuer().await;
    let store = token_store(IdentityConfig {
        url: identity.url.clone(),
        client_id: Some("test-client".to_owned()),
        client_secret: None,
        ..IdentityConfig::default()
    });

    let err = store.acquire().await.unwrap_err();
    assert_eq!(err, SearchError::Configuration("missing credentials: client_secret".to_owned()));
    assert_eq!(identity.hits(), 0);

    identity.handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_grant_carries_status_and_body() {
    let identity_server = MockServer::start_async().await;
    let identity_mock = identity_server.mock_async(|when, then| {
        when.method(POST).path(IDENTITY_PATH);
        then.status(401)
            .header("Content-Type", "application/json")
            .body(r#"{"error":"invalid_client"}"#);
    }).await;

    let store = token_store(identity_config(identity_server.url(IDENTITY_PATH)));
    let err = store.acquire().await.unwrap_err();

    assert_eq!(err, SearchError::authentication(Some(401), r#"{"error":"invalid_client"}"#));
    identity_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_identity_endpoint_is_authentication_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = token_store(identity_config(format!("http://{}{}", addr, IDENTITY_PATH)));
    let err = store.acquire().await.unwrap_err();
    assert!(matches!(err, SearchError::Authentication { status: None, .. }), "got {:?}", err);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_caller_does_not_cancel_shared_refresh() {
    let identity_server = MockServer::start_async().await;
    let identity_mock = identity_server.mock_async(|when, then| {
        when.method(POST).path(IDENTITY_PATH);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"access_token": "survivor", "expires_in": 7200}))
            .delay(Duration::from_millis(300));
    }).await;

    let store = token_store(identity_config(identity_server.url(IDENTITY_PATH)));

    let impatient = tokio::spawn({
        let store = store.clone();
        async move { store.acquire().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    impatient.abort();
    assert!(impatient.await.unwrap_err().is_cancelled());

    assert_eq!(store.acquire().await.unwrap(), "survivor");
    identity_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn short_lifetime_is_not_born_expired() {
    let identity = spawn_identity(|n| (StatusCode::OK, json!({"access_token": format!("short-{}", n), "expires_in": 90}))).await;
    let store = token_store(IdentityConfig {
        safety_buffer_seconds: 120,
        ..identity_config(identity.url.clone())
    });

    assert_eq!(store.acquire().await.unwrap(), "short-0");
    let (_, valid_until) = store.cached().await;
    assert!(valid_until > now());

    // still valid, so no second round trip
    assert_eq!(store.acquire().await.unwrap(), "short-0");
    assert_eq!(identity.hits(), 1);

    identity.handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn grant_request_uses_basic_auth_and_form_body() {
    let captured: Arc<Mutex<Option<(String, HashMap<String, String>)>>> = Arc::new(Mutex::new(None));
    let sink = captured.clone();
    let router = Router::new().route(IDENTITY_PATH, post(move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
        let sink = sink.clone();
        async move {
            let authorization = headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_owned();
            *sink.lock().unwrap() = Some((authorization, form));
            axum::Json(json!({"access_token": "form-ok", "expires_in": 7200}))
        }
    }));
    let (handle, addr) = spawn_axum(router).await;

    let store = token_store(IdentityConfig {
        scope: "https://api.ebay.com/oauth/api_scope/buy.item.feed".to_owned(),
        ..identity_config(format!("http://{}{}", addr, IDENTITY_PATH))
    });
    assert_eq!(store.acquire().await.unwrap(), "form-ok");

    let (authorization, form) = captured.lock().unwrap().clone().expect("request captured");
    assert_eq!(authorization, TEST_BASIC_AUTH);
    assert_eq!(form.get("grant_type").map(String::as_str), Some("client_credentials"));
    assert_eq!(form.get("scope").map(String::as_str), Some("https://api.ebay.com/oauth/api_scope/buy.item.feed"));

    handle.abort();
}

}
