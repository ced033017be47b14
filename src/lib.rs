//! # Market Search Library
//!
//! Searches a marketplace API on behalf of many concurrent callers that
//! share one OAuth2 client-credentials access token.
//!
//! Modules:
//! - `config`: service configuration, loading and validation
//! - `cache`: access token store with single-flight refresh
//! - `sources`: identity (token grant) and search endpoints
//! - `resilience`: retry policy and the fetch coordinator
//! - `server`: HTTP API (search, health, metrics)

pub mod config;
pub mod cache;
pub mod errors;
pub mod sources;
pub mod resilience;
pub mod observability;
pub mod server;
pub mod helpers;
pub mod utils;

#[cfg(test)]
mod tests;


pub use crate::config::sources::*;
pub use crate::errors::SearchError;
