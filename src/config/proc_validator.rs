//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * retry / logging / server invariants
//!   * identity endpoint, credentials presence and safety buffer range
//!   * search endpoint, timeout and page size

use tracing::{error, info};

use crate::config::settings::{LoggingConfig, RetryConfig, SettingsConfig};
use crate::config::sources::{
    IdentityConfig, SearchConfig, ServiceConfig, PAGE_SIZE_MAX, SAFETY_BUFFER_SECONDS_MAX,
    SAFETY_BUFFER_SECONDS_MIN,
};
use crate::observability::metrics::get_metrics;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_identity(&cfg.identity, &mut errors);
    validate_search(&cfg.search, &mut errors);

    if errors.is_empty() {
        info!("config validation passed");
        return Ok(());
    }

    let metrics = get_metrics().await;
    for err in &errors {
        error!("config validation: {}", err);
        metrics.config_validation_errors.inc();
    }
    Err(errors)
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }
    if let Some(logging) = &settings.logging {
        validate_logging(logging, errors);
    }
    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' is not a valid port",
            settings.server.port
        ));
    }
    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if base > max {
            errors.push(format!(
                "settings.retry.base_delay_ms ({}) must be <= max_delay_ms ({})",
                base, max
            ));
        }
    }
}

fn validate_logging(logging: &LoggingConfig, errors: &mut Vec<String>) {
    if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
        errors.push(format!(
            "settings.logging.level '{}' must be one of {:?}",
            logging.level, LOG_LEVELS
        ));
    }
}

fn validate_identity(identity: &IdentityConfig, errors: &mut Vec<String>) {
    validate_url("identity.url", &identity.url, errors);

    if let Err(err) = identity.client_credentials() {
        errors.push(format!("identity: {}", err));
    }
    if identity.scope.trim().is_empty() {
        errors.push("identity.scope must not be empty".to_string());
    }
    if !(SAFETY_BUFFER_SECONDS_MIN..=SAFETY_BUFFER_SECONDS_MAX)
        .contains(&identity.safety_buffer_seconds)
    {
        errors.push(format!(
            "identity.safety_buffer_seconds ({}) must be within {}..={}",
            identity.safety_buffer_seconds, SAFETY_BUFFER_SECONDS_MIN, SAFETY_BUFFER_SECONDS_MAX
        ));
    }
    if identity.timeout_ms == 0 {
        errors.push("identity.timeout_ms must be > 0".to_string());
    }
}

fn validate_search(search: &SearchConfig, errors: &mut Vec<String>) {
    validate_url("search.url", &search.url, errors);

    if search.timeout_ms == 0 {
        errors.push("search.timeout_ms must be > 0".to_string());
    }
    if search.page_size == 0 || search.page_size > PAGE_SIZE_MAX {
        errors.push(format!(
            "search.page_size ({}) must be within 1..={}",
            search.page_size, PAGE_SIZE_MAX
        ));
    }
}

fn validate_url(field: &str, url: &str, errors: &mut Vec<String>) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("{} '{}' must be an http(s) URL", field, url));
    }
}
