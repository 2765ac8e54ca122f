//! Pure order state machine.
//!
//! [`reduce`] validates a command against the order's status, applies the
//! state change in place and returns the effects the caller must run, in
//! order. It does no I/O; [`OrderLifecycleManager`](crate::OrderLifecycleManager)
//! executes the effects against the stores.

use crate::error::{EngineError, EngineResult};
use crate::types::{Order, OrderStatus};

/// Commands that move an order through its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderCommand {
    /// Payment confirmed by the provider or an administrator
    MarkPaid,
    /// Take the order out of circulation
    Expire,
}

/// Side effects requested by [`reduce`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderEffect {
    /// Persist the updated order
    Save,
    /// Mark every ticket of the order valid
    ValidateTickets,
    /// Write the expired-order snapshot
    Archive,
    /// Return the order's tickets to inventory
    ReleaseTickets,
    /// Remove the live order
    Delete,
}

/// Applies `command` to `order` and returns the effects to run.
///
/// Marking a paid order paid again is accepted and only re-validates its
/// tickets. Expiry leaves the live record untouched: the snapshot keeps the
/// status the order had, and the record is deleted last so a failed run can
/// be retried.
///
/// # Errors
///
/// Returns [`EngineError::Conflict`] if the status does not allow the command.
pub fn reduce(order: &mut Order, command: OrderCommand) -> EngineResult<Vec<OrderEffect>> {
    match (command, order.status) {
        (OrderCommand::MarkPaid, OrderStatus::Paid) => Ok(vec![OrderEffect::ValidateTickets]),
        (OrderCommand::MarkPaid, status) if status.can_transition_to(OrderStatus::Paid) => {
            order.status = OrderStatus::Paid;
            Ok(vec![OrderEffect::Save, OrderEffect::ValidateTickets])
        }
        (OrderCommand::Expire, status) if status.can_transition_to(OrderStatus::Expired) => {
            Ok(vec![
                OrderEffect::Archive,
                OrderEffect::ReleaseTickets,
                OrderEffect::Delete,
            ])
        }
        (command, status) => Err(EngineError::conflict(format!(
            "Order {} cannot {} while {status}",
            order.id,
            match command {
                OrderCommand::MarkPaid => "be paid",
                OrderCommand::Expire => "expire",
            }
        ))),
    }
}
