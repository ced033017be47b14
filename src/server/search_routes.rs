use std::str::FromStr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::errors::SearchError;
use crate::resilience::fetch_coordinator::FetchCoordinator;
use crate::server::server::AppState;
use crate::sources::search::{ItemCondition, SearchParams};

#[derive(Clone)]
pub struct SearchState {
    pub coordinator: Arc<FetchCoordinator>,
}

impl SearchState {
    pub fn new(coordinator: Arc<FetchCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn router(&self) -> Router<AppState> {
        Router::new()
            .route("/api/search", post(search))
            .route("/healthz", get(health))
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub product_name: Option<String>,
    pub condition: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SearchRequest {
    pub fn into_params(self) -> Result<SearchParams, String> {
        let query = self
            .product_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| "Missing product_name parameter".to_owned())?;

        let condition = match self.condition.as_deref() {
            Some(condition) => ItemCondition::from_str(condition)
                .map_err(|_| "Invalid condition specified".to_owned())?,
            None => ItemCondition::All,
        };

        SearchParams::checked(query, condition, self.page.unwrap_or(1), self.limit)
    }
}

async fn search(State(state): State<AppState>, payload: Result<Json<SearchRequest>, JsonRejection>) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("rejected search body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, "Request body must be a JSON object");
        }
    };
    let params = match request.into_params() {
        Ok(params) => params,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    info!("search request '{}' page {}", params.query, params.page);
    match state.search_state.coordinator.execute(&params).await {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "page": params.page, "result": result })),
        )
            .into_response(),
        Err(err) => {
            error!("search '{}' failed: {}", params.query, err);
            let status = status_for(&err);
            error_response(status, public_message(status))
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

pub fn status_for(err: &SearchError) -> StatusCode {
    match err.root_cause() {
        SearchError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
        SearchError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn public_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::SERVICE_UNAVAILABLE => "Marketplace API unavailable",
        StatusCode::INTERNAL_SERVER_ERROR => "Search backend is misconfigured",
        _ => "Failed to fetch marketplace data",
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
