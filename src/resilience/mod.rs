pub mod fetch_coordinator;
pub mod retry;
