//! HTTP request handlers shared by services built on the engine.

pub mod health;

// Re-export common handler utilities
pub use health::health_check;
