//! Ticket sale service.
//!
//! Serves the ticket engine over HTTP: customers open orders, check out with
//! the payment provider and hand tickets over to each other; administrators
//! approve and expire orders. Unpaid orders are expired in the background.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum) ──► api::* handlers ──► ticket_engine_core services
//!                                          │
//!                 sweeper (interval) ──────┤
//!                                          ▼
//!                              stores + payment provider
//! ```
//!
//! # Configuration
//!
//! See [`config::Config`] for the environment variables.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod config;
pub mod metrics;
pub mod server;
pub mod sweeper;

pub use app::run;
pub use config::Config;
pub use server::{AppState, build_router};
