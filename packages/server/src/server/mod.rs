// HTTP server setup (Axum + JSON)
pub mod app;
pub mod errors;
pub mod middleware;
pub mod routes;

pub use app::*;
pub use errors::ApiError;
