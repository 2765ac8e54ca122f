//! Error types for web handlers.
//!
//! [`AppError`] bridges the engine's error taxonomy and HTTP responses. Every
//! response body is `{"code": ..., "message": ...}`; infrastructure details are
//! logged and never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use ticket_engine_core::{EngineError, GatewayError};

/// Message returned for every failed transfer attempt.
pub const NOT_TRANSFERRABLE_MESSAGE: &str = "The ticket is not transferrable";

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> WebResult<Json<Order>> {
///     let order = state.manager.get_order_by_id(OrderId::from_uuid(id)).await?;
///     Ok(Json(order))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// HTTP status of the response
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            message.into(),
            "FORBIDDEN".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            message.into(),
            "CONFLICT".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 502 Bad Gateway error.
    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            message.into(),
            "PAYMENT_GATEWAY_ERROR".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Map the engine's taxonomy onto HTTP.
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ResourceExhausted { .. } => Self::new(
                StatusCode::CONFLICT,
                err.to_string(),
                "SOLD_OUT".to_string(),
            ),
            EngineError::NotFound { entity, id } => Self::not_found(entity, id),
            EngineError::Conflict(message) => Self::conflict(message),
            EngineError::LimitReached { .. } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                err.to_string(),
                "ORDER_LIMIT_REACHED".to_string(),
            ),
            EngineError::Forbidden(message) => Self::forbidden(message),
            // Same status, code and message whatever the underlying reason.
            EngineError::NotTransferrable(_) => Self::new(
                StatusCode::BAD_REQUEST,
                NOT_TRANSFERRABLE_MESSAGE.to_string(),
                "NOT_TRANSFERRABLE".to_string(),
            ),
            EngineError::PaymentNotInitiated(_) => Self::new(
                StatusCode::CONFLICT,
                err.to_string(),
                "PAYMENT_NOT_INITIATED".to_string(),
            ),
            EngineError::InvalidArgument(message) => Self::bad_request(message),
            EngineError::TicketTypeNotBuyable(_) => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                err.to_string(),
                "TICKET_TYPE_NOT_BUYABLE".to_string(),
            ),
            EngineError::Storage(source) => {
                Self::internal("An internal error occurred").with_source(source.into())
            }
            EngineError::Gateway(GatewayError::Rejected { reason }) => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Payment provider rejected the order: {reason}"),
                "PAYMENT_REJECTED".to_string(),
            ),
            EngineError::Gateway(source) => {
                Self::bad_gateway("The payment provider is unavailable").with_source(source.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticket_engine_core::{OrderId, StoreError, TicketKey, TicketType};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_invalid_argument_is_bad_request() {
        let err = AppError::from(EngineError::InvalidArgument(
            "Order max age is out of range".to_string(),
        ));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "BAD_REQUEST");
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn test_not_found() {
        let err = AppError::not_found("order", "123");
        assert_eq!(err.to_string(), "[NOT_FOUND] order 123 not found");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_sold_out() {
        let err = AppError::from(EngineError::ResourceExhausted {
            ticket_type: TicketType::EarlyBird,
            limit: 50,
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "SOLD_OUT");
    }

    #[test]
    fn test_not_transferrable_hides_the_key() {
        let key = TicketKey::from_string("secret-key");
        let err = AppError::from(EngineError::NotTransferrable(key));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "NOT_TRANSFERRABLE");
        assert!(!err.message.contains("secret-key"));
    }

    #[test]
    fn test_limit_and_payment_codes() {
        let limit = AppError::from(EngineError::LimitReached {
            order_id: OrderId::new(),
            limit: 5,
        });
        assert_eq!(limit.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(limit.code, "ORDER_LIMIT_REACHED");

        let unpaid = AppError::from(EngineError::PaymentNotInitiated(OrderId::new()));
        assert_eq!(unpaid.status, StatusCode::CONFLICT);
        assert_eq!(unpaid.code, "PAYMENT_NOT_INITIATED");
    }

    #[test]
    fn test_infrastructure_details_stay_internal() {
        let err = AppError::from(EngineError::Storage(StoreError::Backend(
            "connection refused".to_string(),
        )));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("connection refused"));
        assert!(err.source.is_some());

        let gateway = AppError::from(EngineError::Gateway(GatewayError::Unavailable(
            "timeout".to_string(),
        )));
        assert_eq!(gateway.status, StatusCode::BAD_GATEWAY);
        assert!(!gateway.message.contains("timeout"));
    }
}
