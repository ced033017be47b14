//! Bounded retry loop around one search request.
//!
//! Per attempt: acquire a token, send the search, classify the outcome.
//!
//! ```text
//! Start -> Attempting -> Success
//!              |-> 401 ---------------> invalidate token -> Attempting
//!              |-> network / 5xx -----> backoff ----------> Attempting
//!              |-> other 4xx, config --> Failed
//!              `-> attempts exhausted -> Failed (RetriesExceeded)
//! ```

use std::future::Future;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::cache::token_store::TokenStore;
use crate::errors::SearchError;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::RetrySettings;
use crate::sources::search::{SearchClient, SearchParams};

/// Where the coordinator gets bearer tokens from.
pub trait CredentialProvider: Send + Sync {
    fn acquire(&self) -> impl Future<Output = Result<String, SearchError>> + Send;

    fn invalidate(&self) -> impl Future<Output = ()> + Send;
}

impl CredentialProvider for TokenStore {
    async fn acquire(&self) -> Result<String, SearchError> {
        TokenStore::acquire(self).await
    }

    async fn invalidate(&self) {
        TokenStore::invalidate(self).await
    }
}

/// Loop-local attempt counter.
#[derive(Debug)]
struct FetchAttempt {
    number: u32,
    max_attempts: u32,
}

impl FetchAttempt {
    fn new(max_attempts: u32) -> Self {
        Self { number: 0, max_attempts: max_attempts.max(1) }
    }

    fn begin(&mut self) -> u32 {
        self.number += 1;
        self.number
    }

    fn exhausted(&self) -> bool {
        self.number >= self.max_attempts
    }
}

enum Step {
    Success(Value),
    AuthRetry(SearchError),
    NetRetry(SearchError),
    Failed(SearchError),
}

impl Step {
    fn classify(result: Result<Value, SearchError>) -> Self {
        match result {
            Ok(value) => Step::Success(value),
            Err(err) => match err {
                SearchError::Authorization { .. } => Step::AuthRetry(err),
                SearchError::Connectivity(_) | SearchError::Authentication { .. } => Step::NetRetry(err),
                // server side failures get the same bounded retry as network errors
                SearchError::Upstream { status, .. } if status >= 500 => Step::NetRetry(err),
                _ => Step::Failed(err),
            },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Step::Success(_) => "success",
            Step::AuthRetry(err) | Step::NetRetry(err) | Step::Failed(err) => err.kind(),
        }
    }
}

pub struct FetchCoordinator<C = TokenStore> {
    credentials: C,
    search: SearchClient,
    retry: RetrySettings,
}

impl<C: CredentialProvider> FetchCoordinator<C> {
    pub fn new(credentials: C, search: SearchClient, retry: RetrySettings) -> Self {
        Self { credentials, search, retry }
    }

    pub async fn execute(&self, params: &SearchParams) -> Result<Value, SearchError> {
        let metrics = get_metrics().await;
        let start = get_instant();

        let result = self.run_attempts(params).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        metrics.search_duration.with_label_values(&[outcome]).observe(start.elapsed().as_secs_f64());
        result
    }

    async fn run_attempts(&self, params: &SearchParams) -> Result<Value, SearchError> {
        let metrics = get_metrics().await;
        let mut attempt = FetchAttempt::new(self.retry.attempts);

        loop {
            let number = attempt.begin();
            let step = Step::classify(self.attempt_once(params).await);
            metrics.search_attempts.with_label_values(&[step.label()]).inc();

            match step {
                Step::Success(value) => {
                    info!("search '{}' succeeded on attempt {}/{}", params.query, number, attempt.max_attempts);
                    return Ok(value);
                }
                Step::Failed(err) => {
                    warn!("search '{}' failed on attempt {}/{}: {}", params.query, number, attempt.max_attempts, err);
                    return Err(err);
                }
                Step::AuthRetry(err) => {
                    if attempt.exhausted() {
                        return Err(self.retries_exceeded(number, err).await);
                    }
                    info!("attempt {}/{} rejected with 401, invalidating access token", number, attempt.max_attempts);
                    self.credentials.invalidate().await;
                }
                Step::NetRetry(err) => {
                    if attempt.exhausted() {
                        return Err(self.retries_exceeded(number, err).await);
                    }
                    let delay = self.retry.backoff(number);
                    warn!("attempt {}/{} failed: {}, retrying in {:?}", number, attempt.max_attempts, err, delay);
                    sleep(delay).await;
                }
            }
        }
    }

    async fn attempt_once(&self, params: &SearchParams) -> Result<Value, SearchError> {
        let access_token = self.credentials.acquire().await?;
        self.search.search(params, &access_token).await
    }

    async fn retries_exceeded(&self, attempts: u32, last: SearchError) -> SearchError {
        get_metrics().await.search_retries_exceeded.inc();
        error!("all {} attempts failed, last error: {}", attempts, last);
        SearchError::RetriesExceeded { attempts, last: Box::new(last) }
    }
}
