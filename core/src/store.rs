//! Repository and directory traits consumed by the engine.
//!
//! Implementations own durability; the engine only needs keyed lookup,
//! counting, versioned save and delete. Saves are optimistic: a record whose
//! `version` differs from the stored one is rejected with
//! [`StoreError::VersionConflict`], and a successful save returns the record
//! with its version bumped. New records are saved with version `0`.

use crate::error::StoreError;
use crate::types::{
    ExpiredOrder, Order, OrderId, Ticket, TicketId, TicketKey, TicketType, User, UserId,
};
use async_trait::async_trait;

/// Result alias for repository calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for [`Ticket`] records.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Finds a ticket by its current key
    async fn find_by_key(&self, key: &TicketKey) -> StoreResult<Option<Ticket>>;

    /// Finds a ticket by its stable id
    async fn find_by_id(&self, id: TicketId) -> StoreResult<Option<Ticket>>;

    /// Lists the tickets owned by a user
    async fn find_by_owner(&self, owner: UserId) -> StoreResult<Vec<Ticket>>;

    /// Counts the tickets of a type that currently exist
    async fn count_by_type(&self, ticket_type: TicketType) -> StoreResult<usize>;

    /// Inserts a new ticket only if fewer than `capacity` tickets of its type
    /// exist. The count and the insert happen as one atomic step.
    ///
    /// Returns `None` when the type is at capacity; nothing is written then.
    async fn insert_within_capacity(
        &self,
        ticket: Ticket,
        capacity: usize,
    ) -> StoreResult<Option<Ticket>>;

    /// Saves an existing ticket (versioned). The key index follows the
    /// ticket's current key, so a rekeyed ticket no longer resolves under its
    /// old key.
    async fn save(&self, ticket: Ticket) -> StoreResult<Ticket>;

    /// Deletes a ticket; returns whether it existed
    async fn delete(&self, id: TicketId) -> StoreResult<bool>;
}

/// Persistence for live [`Order`] records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Finds an order by id
    async fn find(&self, id: OrderId) -> StoreResult<Option<Order>>;

    /// Finds the order holding a payment reference
    async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>>;

    /// Lists a user's orders
    async fn find_by_owner(&self, owner: UserId) -> StoreResult<Vec<Order>>;

    /// Lists all orders
    async fn find_all(&self) -> StoreResult<Vec<Order>>;

    /// Inserts or updates an order (versioned)
    async fn save(&self, order: Order) -> StoreResult<Order>;

    /// Deletes an order; returns whether it existed
    async fn delete(&self, id: OrderId) -> StoreResult<bool>;
}

/// Append-only archive of [`ExpiredOrder`] snapshots.
#[async_trait]
pub trait ExpiredOrderStore: Send + Sync {
    /// Appends a snapshot
    async fn save(&self, expired: ExpiredOrder) -> StoreResult<()>;

    /// Finds the snapshot of a formerly live order
    async fn find_by_order_id(&self, order_id: OrderId) -> StoreResult<Option<ExpiredOrder>>;

    /// Lists all snapshots
    async fn find_all(&self) -> StoreResult<Vec<ExpiredOrder>>;
}

/// Read access to users. Authentication lives elsewhere.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolves a username (case-insensitive)
    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Resolves a user id
    async fn get_user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
}
