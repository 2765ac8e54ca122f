//! Error taxonomy of the ticket engine.
//!
//! Every failure is raised where it is detected and handed to the caller
//! unchanged. The one deliberate merge is [`EngineError::NotTransferrable`],
//! which covers a missing ticket, a ticket that is not locked for transfer,
//! and a caller that is not the nominated recipient.

use crate::types::{OrderId, TicketKey, TicketType};
use thiserror::Error;

/// Result alias used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by the allocator, order lifecycle and transfer operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The ticket type is sold out
    #[error("Ticket type {ticket_type} is sold out (limit {limit})")]
    ResourceExhausted {
        /// Requested type
        ticket_type: TicketType,
        /// Capacity of the type
        limit: usize,
    },

    /// A user, ticket or order does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The entity is not in a state that allows the operation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The order already holds the maximum number of tickets
    #[error("Order {order_id} already holds the maximum of {limit} tickets")]
    LimitReached {
        /// Order
        order_id: OrderId,
        /// Per-order ticket cap
        limit: usize,
    },

    /// The caller does not own the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Ticket missing, not locked for transfer, or caller is not the goal owner.
    ///
    /// The message is the same in every case.
    #[error("Ticket {0} is not transferrable")]
    NotTransferrable(TicketKey),

    /// Status requested before checkout
    #[error("Order {0} has not been checked out yet")]
    PaymentNotInitiated(OrderId),

    /// An argument is outside the range the operation accepts
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The ticket type cannot be ordered
    #[error("Ticket type {0} is not for sale")]
    TicketTypeNotBuyable(TicketType),

    /// Persistence failure. Version conflicts are reported as
    /// [`EngineError::Conflict`] instead.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),

    /// Payment provider failure
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl EngineError {
    /// Shorthand for [`EngineError::NotFound`]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`EngineError::Conflict`]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// True for failures caused by the caller's request rather than the
    /// infrastructure
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Gateway(_))
    }
}

/// Errors raised by repository implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record changed since it was loaded
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        /// Kind of entity
        entity: &'static str,
        /// Identifier
        id: String,
        /// Version the writer loaded
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// A unique key is already taken by another record
    #[error("{entity} key {key} is already in use")]
    DuplicateKey {
        /// Kind of entity
        entity: &'static str,
        /// Offending key
        key: String,
    },

    /// Backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by a [`PaymentGateway`](crate::payment::PaymentGateway).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The provider refused to register the order
    #[error("Payment provider rejected the order: {reason}")]
    Rejected {
        /// Provider-supplied reason
        reason: String,
    },

    /// The provider does not know the reference
    #[error("Unknown payment reference {0}")]
    UnknownReference(String),

    /// Provider unreachable
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::VersionConflict { .. } => Self::Conflict(error.to_string()),
            other => Self::Storage(other),
        }
    }
}
