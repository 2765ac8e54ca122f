//! HTTP server module for the ticketing service.
//!
//! - Application state management
//! - Readiness and metrics endpoints
//! - Router configuration

pub mod health;
pub mod routes;
pub mod state;

pub use health::{metrics_endpoint, readiness_check};
pub use routes::build_router;
pub use state::AppState;
