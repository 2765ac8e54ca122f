//! Axum integration for the ticket engine.
//!
//! The engine services stay free of HTTP concerns; this crate supplies the
//! shell around them:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Axum shell                 │  ← X-User-Id, JSON, status codes
//! │  - caller resolution (extractors)       │  ← correlation ids, request logs
//! │  - EngineError → AppError               │
//! ├─────────────────────────────────────────┤
//! │           ticket-engine-core            │
//! │  - allocator / orders / transfers       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ticket_engine_web::{AppError, AuthenticatedUser, WebResult};
//!
//! async fn my_tickets(
//!     State(state): State<AppState>,
//!     AuthenticatedUser(user): AuthenticatedUser,
//! ) -> WebResult<Json<Vec<Ticket>>> {
//!     Ok(Json(state.allocator.tickets_owned_by(user.id).await?))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::{AppError, NOT_TRANSFERRABLE_MESSAGE};
pub use extractors::{AdminUser, AuthenticatedUser, CorrelationId, USER_ID_HEADER};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
