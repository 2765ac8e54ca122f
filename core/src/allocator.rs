//! Ticket allocator.
//!
//! Issues tickets against the per-type capacity of the [`TicketCatalog`].
//!
//! **No-oversell guarantee**: the capacity check and the insert run under a
//! per-type lock, and the store performs them as a single atomic
//! [`TicketStore::insert_within_capacity`] call. The lock serializes callers in
//! this process; the store-side check holds for every writer sharing the store.
//!
//! ```text
//! request(EARLY_BIRD) ──► lock(EARLY_BIRD) ──► insert if issued < limit
//!                                                 │
//!                              ┌──────────────────┴─────────────┐
//!                              ▼                                ▼
//!                        Ok(ticket)                 ResourceExhausted
//! ```

use crate::error::{EngineError, EngineResult};
use crate::locks::KeyedLocks;
use crate::store::TicketStore;
use crate::types::{Ticket, TicketCatalog, TicketId, TicketKey, TicketType, UserId};
use std::sync::Arc;

/// Capacity-enforcing ticket issuer.
pub struct TicketAllocator {
    tickets: Arc<dyn TicketStore>,
    catalog: TicketCatalog,
    type_locks: KeyedLocks<TicketType>,
}

impl TicketAllocator {
    /// Creates an allocator over a ticket store
    #[must_use]
    pub fn new(tickets: Arc<dyn TicketStore>, catalog: TicketCatalog) -> Self {
        Self {
            tickets,
            catalog,
            type_locks: KeyedLocks::new(),
        }
    }

    /// The capacity table in use
    #[must_use]
    pub const fn catalog(&self) -> &TicketCatalog {
        &self.catalog
    }

    /// Issues a new ticket of `ticket_type` to `owner`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TicketTypeNotBuyable`] if the type is not for sale
    /// - [`EngineError::ResourceExhausted`] if the type is at capacity; nothing
    ///   is written in that case
    pub async fn request_ticket_of_type(
        &self,
        ticket_type: TicketType,
        owner: UserId,
        pickup_service: bool,
        ch_member: bool,
    ) -> EngineResult<Ticket> {
        let spec = self.catalog.spec(ticket_type);
        if !spec.buyable {
            return Err(EngineError::TicketTypeNotBuyable(ticket_type));
        }

        let _guard = self.type_locks.lock(ticket_type).await;

        let candidate = Ticket::issue(owner, ticket_type, pickup_service, ch_member);
        let Some(ticket) = self
            .tickets
            .insert_within_capacity(candidate, spec.limit)
            .await?
        else {
            tracing::warn!(
                ticket_type = %ticket_type,
                limit = spec.limit,
                owner = %owner,
                "Ticket type sold out"
            );
            return Err(EngineError::ResourceExhausted {
                ticket_type,
                limit: spec.limit,
            });
        };

        tracing::info!(
            ticket_id = %ticket.id,
            ticket_type = %ticket_type,
            owner = %owner,
            "Ticket issued"
        );
        Ok(ticket)
    }

    /// Deletes a ticket, returning its capacity to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if no such ticket exists.
    pub async fn remove_ticket(&self, id: TicketId) -> EngineResult<()> {
        if self.tickets.delete(id).await? {
            tracing::info!(ticket_id = %id, "Ticket released");
            Ok(())
        } else {
            Err(EngineError::not_found("ticket", id))
        }
    }

    /// Number of tickets of a type currently issued
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn get_number_sold_of_type(&self, ticket_type: TicketType) -> EngineResult<usize> {
        Ok(self.tickets.count_by_type(ticket_type).await?)
    }

    /// Marks a ticket valid (its order has been paid). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if no such ticket exists, or
    /// [`EngineError::Conflict`] if it was modified concurrently.
    pub async fn validate_ticket(&self, id: TicketId) -> EngineResult<Ticket> {
        let mut ticket = self.get_ticket_by_id(id).await?;
        if ticket.valid {
            return Ok(ticket);
        }
        ticket.valid = true;
        let ticket = self.tickets.save(ticket).await?;
        tracing::debug!(ticket_id = %id, "Ticket validated");
        Ok(ticket)
    }

    /// Looks up a ticket by its current key
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the key resolves to nothing.
    pub async fn get_ticket_by_key(&self, key: &TicketKey) -> EngineResult<Ticket> {
        self.tickets
            .find_by_key(key)
            .await?
            .ok_or_else(|| EngineError::not_found("ticket", key))
    }

    /// Looks up a ticket by id
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if no such ticket exists.
    pub async fn get_ticket_by_id(&self, id: TicketId) -> EngineResult<Ticket> {
        self.tickets
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("ticket", id))
    }

    /// Lists the tickets a user currently owns
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn tickets_owned_by(&self, owner: UserId) -> EngineResult<Vec<Ticket>> {
        Ok(self.tickets.find_by_owner(owner).await?)
    }
}
