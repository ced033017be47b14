use std::str::FromStr;
use std::sync::Arc;

use clap::ValueEnum;
use http::StatusCode;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::sources::{SearchConfig, PAGE_SIZE_MAX};
use crate::errors::SearchError;

/// Item condition groups understood by the marketplace `conditions` filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    #[default]
    All,
    New,
    Used,
    Refurbished,
    PartsOnly,
}

impl ItemCondition {
    pub fn codes(&self) -> &'static [&'static str] {
        match self {
            ItemCondition::All => &[],
            ItemCondition::New => &["NEW", "LIKE_NEW", "NEW_OTHER", "NEW_WITH_DEFECTS"],
            ItemCondition::Used => &[
                "PRE_OWNED_EXCELLENT",
                "USED_EXCELLENT",
                "USED_VERY_GOOD",
                "USED_GOOD",
                "USED_ACCEPTABLE",
            ],
            ItemCondition::Refurbished => &[
                "CERTIFIED_REFURBISHED",
                "EXCELLENT_REFURBISHED",
                "VERY_GOOD_REFURBISHED",
                "GOOD_REFURBISHED",
                "SELLER_REFURBISHED",
            ],
            ItemCondition::PartsOnly => &["FOR_PARTS_OR_NOT_WORKING"],
        }
    }

    /// `conditions:{A|B}` or None for `all`.
    pub fn filter_value(&self) -> Option<String> {
        let codes = self.codes();
        if codes.is_empty() {
            return None;
        }
        Some(format!("conditions:{{{}}}", codes.join("|")))
    }
}

impl FromStr for ItemCondition {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "all" => Ok(ItemCondition::All),
            "new" => Ok(ItemCondition::New),
            "used" => Ok(ItemCondition::Used),
            "refurbished" => Ok(ItemCondition::Refurbished),
            "parts_only" | "parts-only" => Ok(ItemCondition::PartsOnly),
            other => Err(format!("unknown condition '{}'", other)),
        }
    }
}

/// One logical search.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub condition: ItemCondition,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: default_page(),
            limit: None,
            condition: ItemCondition::All,
        }
    }

    /// Params from user input: `page >= 1`, `limit` within 1..=PAGE_SIZE_MAX.
    pub fn checked(query: String, condition: ItemCondition, page: u32, limit: Option<u32>) -> Result<Self, String> {
        if page == 0 {
            return Err("page must be >= 1".to_owned());
        }
        let mut params = Self::new(query).with_page(page).with_condition(condition);
        if let Some(limit) = limit {
            if limit == 0 || limit > PAGE_SIZE_MAX {
                return Err(format!("limit must be within 1..={}", PAGE_SIZE_MAX));
            }
            params = params.with_limit(limit);
        }
        Ok(params)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_condition(mut self, condition: ItemCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Query string of the upstream request.
    pub fn query_pairs(&self, default_limit: u32) -> Vec<(&'static str, String)> {
        let limit = self.limit.unwrap_or(default_limit);
        let offset = u64::from(self.page.saturating_sub(1)) * u64::from(limit);

        let mut pairs = vec![
            ("q", self.query.clone()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(filter) = self.condition.filter_value() {
            pairs.push(("filter", filter));
        }
        pairs
    }
}

fn default_page() -> u32 {
    1
}

/// Sends a single search request and classifies its HTTP outcome.
#[derive(Debug, Clone)]
pub struct SearchClient {
    pub client: Client,
    pub cfg: Arc<SearchConfig>,
}

impl SearchClient {
    pub fn new(client: Client, cfg: SearchConfig) -> Self {
        Self { client, cfg: Arc::new(cfg) }
    }

    pub async fn search(&self, params: &SearchParams, access_token: &str) -> Result<Value, SearchError> {
        let pairs = self.params_to_pairs(params);
        debug!("search '{}' with {:?}", self.cfg.url, pairs);

        let response = self
            .client
            .get(&self.cfg.url)
            .query(&pairs)
            .bearer_auth(access_token)
            .timeout(self.cfg.timeout())
            .send()
            .await
            .map_err(SearchError::from_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(SearchError::from_transport)?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(SearchError::Authorization { body });
        }
        if !status.is_success() {
            return Err(SearchError::Upstream { status: status.as_u16(), body });
        }

        let result: Value = serde_json::from_str(&body).map_err(|err| SearchError::Decode(err.to_string()))?;
        info!(
            "search returned {} items",
            result.get("itemSummaries").and_then(serde_json::Value::as_array).map(Vec::len).unwrap_or(0)
        );
        Ok(result)
    }

    fn params_to_pairs(&self, params: &SearchParams) -> Vec<(&'static str, String)> {
        params.query_pairs(self.cfg.page_size)
    }
}
