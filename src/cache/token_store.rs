//! Shared OAuth2 access token with single-flight refresh.
//!
//! Every caller goes through [`TokenStore::acquire`]. A valid credential is
//! returned straight from the cache. An expired one triggers a refresh, and
//! callers that arrive while that refresh is running join it instead of
//! starting their own, so one expiry costs exactly one identity round trip.
//!
//! The refresh runs on its own task: cancelling a waiting caller never
//! cancels the refresh the other waiters depend on.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::credential::Credential;
use crate::errors::SearchError;
use crate::helpers::time::{compute_valid_until, get_instant, now};
use crate::observability::metrics::get_metrics;
use crate::sources::identity::IdentityClient;

type RefreshOutcome = Result<String, SearchError>;
type InflightRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct StoreState {
    credential: Credential,
    inflight: Option<InflightRefresh>,
}

struct StoreInner {
    state: Mutex<StoreState>,
    identity: IdentityClient,
}

/// Process-wide access token cache. Clones share the same credential.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<StoreInner>,
}

impl TokenStore {
    pub fn new(identity: IdentityClient) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState {
                    credential: Credential::empty(),
                    inflight: None,
                }),
                identity,
            }),
        }
    }

    /// Currently valid access token, refreshing it first when expired.
    pub async fn acquire(&self) -> Result<String, SearchError> {
        let refresh = {
            let mut state = self.inner.state.lock().await;

            // checked under the same lock that publishes a refresh, so a caller
            // that waited here sees the credential installed by the previous holder
            if let Some(value) = state.credential.valid_value(now()) {
                return Ok(value.to_owned());
            }

            match &state.inflight {
                Some(inflight) => {
                    debug!("joining in-flight token refresh");
                    inflight.clone()
                }
                None => {
                    let refresh = StoreInner::spawn_refresh(self.inner.clone());
                    state.inflight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Mark the cached credential expired so the next `acquire` refreshes it.
    pub async fn invalidate(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.credential.expire();
        }
        get_metrics().await.token_invalidations.inc();
        info!("cached access token invalidated");
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, value: &str, valid_until: chrono::DateTime<chrono::Utc>) {
        let mut state = self.inner.state.lock().await;
        state.credential = Credential::new(value.to_owned(), valid_until, self.inner.identity.issued_from());
    }

    #[cfg(test)]
    pub(crate) async fn cached(&self) -> (String, chrono::DateTime<chrono::Utc>) {
        let state = self.inner.state.lock().await;
        (state.credential.value().to_owned(), state.credential.valid_until())
    }
}

impl StoreInner {
    fn spawn_refresh(inner: Arc<StoreInner>) -> InflightRefresh {
        let task = tokio::spawn({
            let inner = inner.clone();
            async move { inner.refresh().await }
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    error!("token refresh task failed: {}", join_err);
                    inner.state.lock().await.inflight = None;
                    Err(SearchError::authentication(None, format!("token refresh task failed: {}", join_err)))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn refresh(&self) -> RefreshOutcome {
        let metrics = get_metrics().await;
        let start = get_instant();
        let requested_at = now();

        metrics.token_refresh_requests.inc();
        info!("refreshing access token for client '{}'", self.identity.issued_from());
        let outcome = self.identity.request_token().await;
        metrics.token_refresh_duration.observe(start.elapsed().as_secs_f64());

        let mut state = self.state.lock().await;
        state.inflight = None;

        match outcome {
            Ok(grant) => {
                let valid_until = compute_valid_until(
                    requested_at,
                    grant.expires_in,
                    self.identity.safety_buffer_seconds(),
                );
                info!(
                    "access token refreshed, expires_in {}s, valid until {}",
                    grant.expires_in, valid_until
                );
                metrics.token_valid_until_unix.set(valid_until.timestamp());
                state.credential = Credential::new(grant.access_token.clone(), valid_until, self.identity.issued_from());
                Ok(grant.access_token)
            }
            Err(err) => {
                // previous credential stays as it was
                metrics.token_refresh_failures.with_label_values(&[err.kind()]).inc();
                warn!("access token refresh failed: {}", err);
                Err(err)
            }
        }
    }
}
