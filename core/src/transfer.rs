//! Ticket transfer coordinator.
//!
//! Ownership moves through a two-party handshake:
//!
//! ```text
//!            setup (owner)               transfer (goal owner)
//!  Owned ───────────────────► Locked(goal) ───────────────────► Owned(goal), new key
//!    ▲                            │
//!    └────── cancel (owner) ──────┘
//! ```
//!
//! On the recipient side, a missing ticket, a ticket that is not locked and a
//! caller who is not the nominated goal owner all fail with the same
//! [`EngineError::NotTransferrable`], so the endpoint cannot be used to probe
//! which keys exist.

use crate::error::{EngineError, EngineResult};
use crate::locks::KeyedLocks;
use crate::store::{TicketStore, UserDirectory};
use crate::types::{Ticket, TicketKey, UserId};
use std::sync::Arc;

/// Runs the transfer handshake on ticket records.
pub struct TransferCoordinator {
    tickets: Arc<dyn TicketStore>,
    users: Arc<dyn UserDirectory>,
    key_locks: KeyedLocks<TicketKey>,
}

impl TransferCoordinator {
    /// Creates a coordinator
    #[must_use]
    pub fn new(tickets: Arc<dyn TicketStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            tickets,
            users,
            key_locks: KeyedLocks::new(),
        }
    }

    /// Locks a ticket for transfer to `goal_username`. Only the current owner
    /// may do this; calling it again retargets the pending transfer.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the goal user or the ticket does not exist
    /// - [`EngineError::Forbidden`] if `caller` does not own the ticket
    /// - [`EngineError::Conflict`] if the ticket has not been paid for yet
    pub async fn setup_for_transfer(
        &self,
        caller: UserId,
        ticket_key: &TicketKey,
        goal_username: &str,
    ) -> EngineResult<Ticket> {
        let goal = self
            .users
            .get_user_by_username(goal_username)
            .await?
            .ok_or_else(|| EngineError::not_found("user", goal_username))?;

        let _guard = self.key_locks.lock(ticket_key.clone()).await;
        let mut ticket = self
            .tickets
            .find_by_key(ticket_key)
            .await?
            .ok_or_else(|| EngineError::not_found("ticket", ticket_key))?;

        if ticket.owner != caller {
            return Err(EngineError::Forbidden(
                "You are not allowed to set this ticket up for transfer".to_string(),
            ));
        }
        if !ticket.valid {
            return Err(EngineError::conflict(format!(
                "Ticket {ticket_key} has not been paid for"
            )));
        }

        ticket.lock_for_transfer(goal.id);
        let ticket = self.tickets.save(ticket).await?;

        tracing::info!(
            ticket_id = %ticket.id,
            goal_owner = %goal.id,
            "Ticket locked for transfer"
        );
        Ok(ticket)
    }

    /// Completes a pending transfer on behalf of the nominated recipient. The
    /// ticket changes owner and gets a new key; the old key stops resolving.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotTransferrable`] if the ticket does not exist,
    /// is not locked for transfer, or `caller` is not the goal owner.
    pub async fn transfer_ticket(&self, caller: UserId, ticket_key: &TicketKey) -> EngineResult<Ticket> {
        let _guard = self.key_locks.lock(ticket_key.clone()).await;

        let Some(mut ticket) = self.tickets.find_by_key(ticket_key).await? else {
            return Err(self.refuse(ticket_key, "unknown key"));
        };
        if ticket.transfer_goal_owner != Some(caller) {
            let reason = if ticket.is_transferrable() {
                "caller is not the goal owner"
            } else {
                "not locked for transfer"
            };
            return Err(self.refuse(ticket_key, reason));
        }

        let previous_owner = ticket.finalize_transfer();
        let ticket = self.tickets.save(ticket).await?;

        tracing::info!(
            ticket_id = %ticket.id,
            from = ?previous_owner,
            to = %ticket.owner,
            "Ticket transferred"
        );
        Ok(ticket)
    }

    /// Cancels a pending transfer. Only the current owner may do this.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the ticket does not exist
    /// - [`EngineError::Forbidden`] if `caller` does not own the ticket
    /// - [`EngineError::NotTransferrable`] if no transfer is pending
    pub async fn cancel_ticket_transfer(
        &self,
        caller: UserId,
        ticket_key: &TicketKey,
    ) -> EngineResult<Ticket> {
        let _guard = self.key_locks.lock(ticket_key.clone()).await;

        let mut ticket = self
            .tickets
            .find_by_key(ticket_key)
            .await?
            .ok_or_else(|| EngineError::not_found("ticket", ticket_key))?;
        if ticket.owner != caller {
            return Err(EngineError::Forbidden(
                "You are not allowed to cancel this transfer".to_string(),
            ));
        }
        if !ticket.is_transferrable() {
            return Err(EngineError::NotTransferrable(ticket_key.clone()));
        }

        ticket.cancel_transfer();
        let ticket = self.tickets.save(ticket).await?;

        tracing::info!(ticket_id = %ticket.id, "Ticket transfer cancelled");
        Ok(ticket)
    }

    /// Builds the uniform refusal. The reason is only logged at debug level.
    fn refuse(&self, ticket_key: &TicketKey, reason: &'static str) -> EngineError {
        tracing::debug!(ticket_key = %ticket_key, reason, "Transfer refused");
        EngineError::NotTransferrable(ticket_key.clone())
    }
}
