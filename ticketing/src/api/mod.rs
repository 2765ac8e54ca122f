//! API endpoints for the ticketing service.
//!
//! Handlers are organized by domain:
//! - Orders: create, modify, check out and refresh orders
//! - Tickets: availability and the caller's tickets
//! - Transfers: the two-party ticket handover
//! - Payments: provider callbacks
//! - Admin: approval, expiry and order listings
//!
//! Callers are identified by the `X-User-Id` header (see
//! [`ticket_engine_web::AuthenticatedUser`]).

pub mod admin;
pub mod orders;
pub mod payments;
pub mod tickets;
pub mod transfers;

use chrono::{DateTime, Utc};
use serde::Serialize;
use ticket_engine_core::{
    EngineError, EngineResult, Order, OrderId, OrderLifecycleManager, OrderStatus, Ticket,
    TicketKey, TicketType, User, UserId,
};

/// A ticket as shown to its owner.
#[derive(Debug, Clone, Serialize)]
pub struct TicketView {
    /// Current key (changes on every transfer)
    pub key: TicketKey,
    /// Ticket type
    pub ticket_type: TicketType,
    /// Pickup service booked
    pub pickup_service: bool,
    /// Member rate
    pub ch_member: bool,
    /// Paid for
    pub valid: bool,
    /// Pending transfer
    pub transferrable: bool,
}

impl From<&Ticket> for TicketView {
    fn from(ticket: &Ticket) -> Self {
        Self {
            key: ticket.key.clone(),
            ticket_type: ticket.ticket_type,
            pickup_service: ticket.pickup_service,
            ch_member: ticket.ch_member,
            valid: ticket.valid,
            transferrable: ticket.is_transferrable(),
        }
    }
}

/// An order with its tickets resolved.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    /// Order ID
    pub id: OrderId,
    /// Owner
    pub owner: UserId,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Tickets held by the order (empty once expired)
    pub tickets: Vec<TicketView>,
    /// Whether checkout was requested
    pub payment_requested: bool,
    /// When the order was opened
    pub created_at: DateTime<Utc>,
}

impl OrderView {
    /// Resolve an order's tickets into a view.
    ///
    /// # Errors
    ///
    /// Returns error if the ticket store fails.
    pub async fn load(manager: &OrderLifecycleManager, order: Order) -> EngineResult<Self> {
        let tickets = if order.status == OrderStatus::Expired {
            Vec::new()
        } else {
            manager
                .tickets_of(&order)
                .await?
                .iter()
                .map(TicketView::from)
                .collect()
        };

        Ok(Self {
            id: order.id,
            owner: order.owner,
            status: order.status,
            tickets,
            payment_requested: order.reference.is_some(),
            created_at: order.created_at,
        })
    }
}

/// Load an order the caller may act on: its owner or an administrator.
///
/// # Errors
///
/// - [`EngineError::NotFound`] if the order does not exist
/// - [`EngineError::Forbidden`] if the caller neither owns it nor is an admin
pub async fn owned_order(
    manager: &OrderLifecycleManager,
    caller: &User,
    order_id: OrderId,
) -> EngineResult<Order> {
    let order = manager.get_order_by_id(order_id).await?;
    if order.owner != caller.id && !caller.admin {
        return Err(EngineError::Forbidden(
            "You do not own this order".to_string(),
        ));
    }
    Ok(order)
}
