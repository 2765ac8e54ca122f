//! In-memory implementations of the store traits.
//!
//! Used by the development server and by tests. Each store keeps its data
//! behind a single `RwLock`, which makes every trait method atomic.

use crate::error::StoreError;
use crate::store::{ExpiredOrderStore, OrderStore, StoreResult, TicketStore, UserDirectory};
use crate::types::{
    ExpiredOrder, Order, OrderId, Ticket, TicketId, TicketKey, TicketType, User, UserId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

fn check_version(
    entity: &'static str,
    id: impl ToString,
    stored: Option<u64>,
    incoming: u64,
) -> StoreResult<()> {
    let actual = stored.unwrap_or(0);
    if actual == incoming {
        Ok(())
    } else {
        Err(StoreError::VersionConflict {
            entity,
            id: id.to_string(),
            expected: incoming,
            actual,
        })
    }
}

// ============================================================================
// Tickets
// ============================================================================

#[derive(Default)]
struct TicketTable {
    by_id: HashMap<TicketId, Ticket>,
    by_key: HashMap<TicketKey, TicketId>,
}

/// In-memory [`TicketStore`] with a key index.
#[derive(Default)]
pub struct InMemoryTicketStore {
    table: RwLock<TicketTable>,
}

impl InMemoryTicketStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tickets
    pub async fn len(&self) -> usize {
        self.table.read().await.by_id.len()
    }

    /// True if no tickets are stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn find_by_key(&self, key: &TicketKey) -> StoreResult<Option<Ticket>> {
        let table = self.table.read().await;
        Ok(table
            .by_key
            .get(key)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        Ok(self.table.read().await.by_id.get(&id).cloned())
    }

    async fn find_by_owner(&self, owner: UserId) -> StoreResult<Vec<Ticket>> {
        let table = self.table.read().await;
        let mut tickets: Vec<Ticket> = table
            .by_id
            .values()
            .filter(|ticket| ticket.owner == owner)
            .cloned()
            .collect();
        tickets.sort_by_key(|ticket| ticket.id);
        Ok(tickets)
    }

    async fn count_by_type(&self, ticket_type: TicketType) -> StoreResult<usize> {
        Ok(self
            .table
            .read()
            .await
            .by_id
            .values()
            .filter(|ticket| ticket.ticket_type == ticket_type)
            .count())
    }

    async fn insert_within_capacity(
        &self,
        mut ticket: Ticket,
        capacity: usize,
    ) -> StoreResult<Option<Ticket>> {
        let mut table = self.table.write().await;

        let issued = table
            .by_id
            .values()
            .filter(|existing| existing.ticket_type == ticket.ticket_type)
            .count();
        if issued >= capacity {
            return Ok(None);
        }

        if let Some(existing) = table.by_id.get(&ticket.id) {
            return Err(StoreError::VersionConflict {
                entity: "ticket",
                id: ticket.id.to_string(),
                expected: ticket.version,
                actual: existing.version,
            });
        }
        if table.by_key.contains_key(&ticket.key) {
            return Err(StoreError::DuplicateKey {
                entity: "ticket",
                key: ticket.key.to_string(),
            });
        }

        ticket.version = 1;
        table.by_key.insert(ticket.key.clone(), ticket.id);
        table.by_id.insert(ticket.id, ticket.clone());
        Ok(Some(ticket))
    }

    async fn save(&self, mut ticket: Ticket) -> StoreResult<Ticket> {
        let mut table = self.table.write().await;

        let previous_key = table.by_id.get(&ticket.id).map(|t| t.key.clone());
        check_version(
            "ticket",
            ticket.id,
            table.by_id.get(&ticket.id).map(|t| t.version),
            ticket.version,
        )?;
        if let Some(owner_id) = table.by_key.get(&ticket.key) {
            if *owner_id != ticket.id {
                return Err(StoreError::DuplicateKey {
                    entity: "ticket",
                    key: ticket.key.to_string(),
                });
            }
        }

        if let Some(previous_key) = previous_key {
            table.by_key.remove(&previous_key);
        }
        ticket.version += 1;
        table.by_key.insert(ticket.key.clone(), ticket.id);
        table.by_id.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn delete(&self, id: TicketId) -> StoreResult<bool> {
        let mut table = self.table.write().await;
        match table.by_id.remove(&id) {
            Some(ticket) => {
                table.by_key.remove(&ticket.key);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

/// In-memory [`OrderStore`].
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    orders
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|order| order.reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn find_by_owner(&self, owner: UserId) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(sorted(
            orders
                .values()
                .filter(|order| order.owner == owner)
                .cloned()
                .collect(),
        ))
    }

    async fn find_all(&self) -> StoreResult<Vec<Order>> {
        Ok(sorted(self.orders.read().await.values().cloned().collect()))
    }

    async fn save(&self, mut order: Order) -> StoreResult<Order> {
        let mut orders = self.orders.write().await;
        check_version(
            "order",
            order.id,
            orders.get(&order.id).map(|o| o.version),
            order.version,
        )?;
        order.version += 1;
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn delete(&self, id: OrderId) -> StoreResult<bool> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }
}

// ============================================================================
// Expired orders
// ============================================================================

/// In-memory [`ExpiredOrderStore`].
#[derive(Default)]
pub struct InMemoryExpiredOrderStore {
    archive: RwLock<Vec<ExpiredOrder>>,
}

impl InMemoryExpiredOrderStore {
    /// Creates an empty archive
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpiredOrderStore for InMemoryExpiredOrderStore {
    async fn save(&self, expired: ExpiredOrder) -> StoreResult<()> {
        self.archive.write().await.push(expired);
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: OrderId) -> StoreResult<Option<ExpiredOrder>> {
        Ok(self
            .archive
            .read()
            .await
            .iter()
            .find(|expired| expired.order_id == order_id)
            .cloned())
    }

    async fn find_all(&self) -> StoreResult<Vec<ExpiredOrder>> {
        Ok(self.archive.read().await.clone())
    }
}

// ============================================================================
// Users
// ============================================================================

/// In-memory [`UserDirectory`] seeded up front.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserDirectory {
    /// Creates a directory holding the given users
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|user| (user.id, user)).collect()),
        }
    }

    /// Adds or replaces a user
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn get_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}
