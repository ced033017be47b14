pub mod search_routes;
pub mod server;
