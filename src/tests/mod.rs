pub mod common;
mod token_store_refresh;
