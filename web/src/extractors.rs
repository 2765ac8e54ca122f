//! Custom Axum extractors.
//!
//! - `CorrelationId`: extract or generate request correlation IDs
//! - `AuthenticatedUser`: resolve the caller from the trusted `X-User-Id` header
//! - `AdminUser`: an authenticated caller with the administrator flag
//!
//! Authentication itself happens upstream (gateway or session layer), which
//! forwards the resolved user id in `X-User-Id`.
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     correlation_id: CorrelationId,
//!     AuthenticatedUser(user): AuthenticatedUser,
//! ) -> Result<Json<Response>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, user = %user.username, "Processing request");
//!     Ok(Json(response))
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;
use ticket_engine_core::{EngineError, User, UserDirectory, UserId};
use uuid::Uuid;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Correlation ID for request tracing.
///
/// Extracts the correlation ID from the `X-Correlation-ID` header,
/// or generates a new UUID v4 if not present.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Prefer the id the middleware already settled on
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(crate::middleware::CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The calling user, resolved through the [`UserDirectory`] in state.
///
/// Rejects with 401 if the header is missing, malformed or names an unknown
/// user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn UserDirectory>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(UserId::from_uuid)
            .ok_or_else(|| AppError::unauthorized("Missing or malformed X-User-Id header"))?;

        let users = <Arc<dyn UserDirectory> as FromRef<S>>::from_ref(state);
        let user = users
            .get_user_by_id(user_id)
            .await
            .map_err(EngineError::from)?
            .ok_or_else(|| AppError::unauthorized("Unknown user"))?;

        tracing::Span::current().record("user", user.username.as_str());
        Ok(Self(user))
    }
}

/// An authenticated administrator. Rejects non-admins with 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<dyn UserDirectory>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.admin {
            tracing::warn!(user = %user.username, "Non-admin called an admin endpoint");
            return Err(AppError::forbidden("Administrator access required"));
        }
        Ok(Self(user))
    }
}
