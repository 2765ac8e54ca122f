//! Order lifecycle manager.
//!
//! Owns order status transitions, ticket membership and expiry.
//!
//! ```text
//! create ──► CREATING ──(gateway PAID / admin approve)──► PAID
//!               │                                          │
//!               └──────────────(expire)──────────► EXPIRED ◄┘
//! ```
//!
//! Mutations of one order run under that order's lock; `create` runs under the
//! ordering user's lock so a user never ends up with two open orders. Orders
//! are saved with a version check, so a writer outside this process that raced
//! us is reported as a conflict instead of being overwritten.

use crate::allocator::TicketAllocator;
use crate::environment::Clock;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{self, OrderCommand, OrderEffect};
use crate::locks::KeyedLocks;
use crate::payment::PaymentGateway;
use crate::store::{ExpiredOrderStore, OrderStore, UserDirectory};
use crate::types::{
    ExpiredOrder, Order, OrderId, OrderStatus, Ticket, TicketAvailability, TicketId,
    TicketRequest, UserId,
};
use std::sync::Arc;

/// Dependencies of the [`OrderLifecycleManager`]
#[derive(Clone)]
pub struct OrderEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Live orders
    pub orders: Arc<dyn OrderStore>,
    /// Archive of expired orders
    pub expired_orders: Arc<dyn ExpiredOrderStore>,
    /// User lookups
    pub users: Arc<dyn UserDirectory>,
    /// Payment provider
    pub gateway: Arc<dyn PaymentGateway>,
}

impl OrderEnvironment {
    /// Creates a new `OrderEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        orders: Arc<dyn OrderStore>,
        expired_orders: Arc<dyn ExpiredOrderStore>,
        users: Arc<dyn UserDirectory>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            clock,
            orders,
            expired_orders,
            users,
            gateway,
        }
    }
}

/// Drives orders through their lifecycle.
pub struct OrderLifecycleManager {
    env: OrderEnvironment,
    allocator: Arc<TicketAllocator>,
    order_limit: usize,
    user_locks: KeyedLocks<UserId>,
    order_locks: KeyedLocks<OrderId>,
}

impl OrderLifecycleManager {
    /// Creates a manager allowing at most `order_limit` tickets per order
    #[must_use]
    pub fn new(env: OrderEnvironment, allocator: Arc<TicketAllocator>, order_limit: usize) -> Self {
        Self {
            env,
            allocator,
            order_limit,
            user_locks: KeyedLocks::new(),
            order_locks: KeyedLocks::new(),
        }
    }

    /// The allocator orders draw tickets from
    #[must_use]
    pub const fn allocator(&self) -> &Arc<TicketAllocator> {
        &self.allocator
    }

    /// Maximum number of tickets per order
    #[must_use]
    pub const fn order_limit(&self) -> usize {
        self.order_limit
    }

    // ------------------------------------------------------------------------
    // Ticket membership
    // ------------------------------------------------------------------------

    /// Opens an order for `user_id` holding one freshly allocated ticket.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the user does not exist
    /// - [`EngineError::Conflict`] if the user already has an open order
    /// - [`EngineError::ResourceExhausted`] if the ticket type is sold out
    pub async fn create(&self, user_id: UserId, request: TicketRequest) -> EngineResult<Order> {
        let _guard = self.user_locks.lock(user_id).await;

        let user = self
            .env
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("user", user_id))?;

        if let Some(open) = self
            .env
            .orders
            .find_by_owner(user.id)
            .await?
            .into_iter()
            .find(Order::is_mutable)
        {
            return Err(EngineError::conflict(format!(
                "User {} already has an open order {}",
                user.username, open.id
            )));
        }

        let ticket = self.allocate(user.id, request).await?;
        let mut order = Order::open(user.id, self.env.clock.now());
        order.tickets.push(ticket.id);
        let order = self.save_or_release(order, ticket.id).await?;

        tracing::info!(
            order_id = %order.id,
            user = %user.username,
            ticket_type = %request.ticket_type,
            "Order created"
        );
        Ok(order)
    }

    /// Allocates one more ticket into an open order.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the order does not exist
    /// - [`EngineError::Conflict`] if the order is no longer `CREATING`
    /// - [`EngineError::LimitReached`] if the order is full
    /// - [`EngineError::ResourceExhausted`] if the ticket type is sold out
    pub async fn add_ticket_to_order(
        &self,
        order_id: OrderId,
        request: TicketRequest,
    ) -> EngineResult<Order> {
        let _guard = self.order_locks.lock(order_id).await;

        let mut order = self.load_order(order_id).await?;
        ensure_mutable(&order)?;
        if order.tickets.len() >= self.order_limit {
            return Err(EngineError::LimitReached {
                order_id,
                limit: self.order_limit,
            });
        }

        let ticket = self.allocate(order.owner, request).await?;
        order.tickets.push(ticket.id);
        let order = self.save_or_release(order, ticket.id).await?;

        tracing::info!(
            order_id = %order_id,
            ticket_type = %request.ticket_type,
            tickets = order.tickets.len(),
            "Ticket added to order"
        );
        Ok(order)
    }

    /// Removes the first ticket matching `request` from an open order and
    /// releases it.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the order does not exist or holds no
    ///   matching ticket
    /// - [`EngineError::Conflict`] if the order is no longer `CREATING`
    pub async fn remove_ticket_from_order(
        &self,
        order_id: OrderId,
        request: TicketRequest,
    ) -> EngineResult<Order> {
        let _guard = self.order_locks.lock(order_id).await;

        let mut order = self.load_order(order_id).await?;
        ensure_mutable(&order)?;

        let mut position = None;
        let mut dangling = Vec::new();
        for (index, ticket_id) in order.tickets.iter().enumerate() {
            match self.allocator.get_ticket_by_id(*ticket_id).await {
                Ok(ticket) if request.matches(&ticket) => {
                    position = Some(index);
                    break;
                }
                Ok(_) => {}
                Err(EngineError::NotFound { .. }) => dangling.push(*ticket_id),
                Err(error) => return Err(error),
            }
        }
        let Some(index) = position else {
            return Err(EngineError::not_found(
                "ticket",
                format!(
                    "{} (pickup service: {}, member: {}) in order {order_id}",
                    request.ticket_type, request.pickup_service, request.ch_member
                ),
            ));
        };

        // Released before the save. A failed save leaves a dangling id that
        // the next removal drops.
        let ticket_id = order.tickets.remove(index);
        self.release_ticket(ticket_id).await?;
        order.tickets.retain(|id| !dangling.contains(id));
        let order = self.env.orders.save(order).await?;

        tracing::info!(
            order_id = %order_id,
            ticket_id = %ticket_id,
            tickets = order.tickets.len(),
            "Ticket removed from order"
        );
        Ok(order)
    }

    // ------------------------------------------------------------------------
    // Payment
    // ------------------------------------------------------------------------

    /// Registers an open order with the payment provider and returns the URL
    /// the customer pays at. The order stays `CREATING`; only its payment
    /// reference is recorded.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the order does not exist
    /// - [`EngineError::Conflict`] if the order is no longer `CREATING`
    /// - [`EngineError::Gateway`] if the provider refuses
    pub async fn request_payment(&self, order_id: OrderId) -> EngineResult<String> {
        let _guard = self.order_locks.lock(order_id).await;

        let mut order = self.load_order(order_id).await?;
        ensure_mutable(&order)?;

        let checkout = self.env.gateway.register_order(&order).await?;
        order.reference = Some(checkout.reference.clone());
        self.env.orders.save(order).await?;

        tracing::info!(
            order_id = %order_id,
            reference = %checkout.reference,
            "Payment requested"
        );
        Ok(checkout.payment_url)
    }

    /// Applies the provider's status for a payment reference (the provider's
    /// callback path).
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no live order carries the reference
    /// - [`EngineError::Gateway`] if the provider cannot be queried
    pub async fn update_order_status_by_reference(&self, reference: &str) -> EngineResult<Order> {
        let order_id = self.find_order_by_reference(reference).await?.id;

        let _guard = self.order_locks.lock(order_id).await;
        let order = self.load_order(order_id).await?;
        let reported = self.env.gateway.update_status(reference).await?;
        self.apply_payment_status(order, reported).await
    }

    /// Refreshes an order from the provider using its stored reference.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the order does not exist
    /// - [`EngineError::PaymentNotInitiated`] if the order was never checked out
    /// - [`EngineError::Gateway`] if the provider cannot be queried
    pub async fn update_order_status(&self, order_id: OrderId) -> EngineResult<Order> {
        let _guard = self.order_locks.lock(order_id).await;

        let order = self.load_order(order_id).await?;
        let reference = order
            .reference
            .clone()
            .filter(|reference| !reference.is_empty())
            .ok_or(EngineError::PaymentNotInitiated(order_id))?;

        let reported = self.env.gateway.update_status(&reference).await?;
        self.apply_payment_status(order, reported).await
    }

    /// Marks an order paid without consulting the provider.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the order does not exist.
    pub async fn admin_approve_order(&self, order_id: OrderId) -> EngineResult<Order> {
        let _guard = self.order_locks.lock(order_id).await;

        let order = self.load_order(order_id).await?;
        let order = self.mark_paid(order).await?;
        tracing::warn!(order_id = %order_id, "Order approved by administrator");
        Ok(order)
    }

    // ------------------------------------------------------------------------
    // Expiry
    // ------------------------------------------------------------------------

    /// Expires an order: an [`ExpiredOrder`] snapshot is archived, every
    /// ticket it held is released and the live order is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the order does not exist (including
    /// when it was already expired).
    pub async fn expire_order(&self, order_id: OrderId) -> EngineResult<ExpiredOrder> {
        let _guard = self.order_locks.lock(order_id).await;

        let order = self.load_order(order_id).await?;
        self.expire_locked(order).await
    }

    /// Expires every `CREATING` order opened more than `max_age` ago. Returns
    /// the archive entries of the orders that were expired.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidArgument`] if `max_age` is negative or reaches
    ///   past the representable range of dates
    /// - otherwise stops at the first failing expiry and returns its error
    pub async fn expire_stale_orders(
        &self,
        max_age: chrono::Duration,
    ) -> EngineResult<Vec<ExpiredOrder>> {
        if max_age < chrono::Duration::zero() {
            return Err(EngineError::InvalidArgument(format!(
                "Order max age must not be negative (got {max_age})"
            )));
        }
        let cutoff = self
            .env
            .clock
            .now()
            .checked_sub_signed(max_age)
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!("Order max age {max_age} is out of range"))
            })?;
        let is_stale = |order: &Order| order.is_mutable() && order.created_at < cutoff;

        let candidates: Vec<OrderId> = self
            .env
            .orders
            .find_all()
            .await?
            .into_iter()
            .filter(is_stale)
            .map(|order| order.id)
            .collect();

        let mut expired = Vec::with_capacity(candidates.len());
        for order_id in candidates {
            let _guard = self.order_locks.lock(order_id).await;
            // Paid or expired while we were waiting for the lock.
            let Some(order) = self.env.orders.find(order_id).await? else {
                continue;
            };
            if !is_stale(&order) {
                continue;
            }
            expired.push(self.expire_locked(order).await?);
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Stale orders expired");
        }
        Ok(expired)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Sold counts for every public, buyable ticket type.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn get_available_tickets(&self) -> EngineResult<Vec<TicketAvailability>> {
        let mut availability = Vec::new();
        for (ticket_type, spec) in self.allocator.catalog().iter() {
            if !spec.buyable || ticket_type.is_internal() {
                continue;
            }
            let sold = self.allocator.get_number_sold_of_type(ticket_type).await?;
            availability.push(TicketAvailability {
                ticket_type,
                sold,
                limit: spec.limit,
                remaining: spec.limit.saturating_sub(sold),
            });
        }
        Ok(availability)
    }

    /// Looks up a live order
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the order does not exist.
    pub async fn get_order_by_id(&self, order_id: OrderId) -> EngineResult<Order> {
        self.load_order(order_id).await
    }

    /// Looks up the live order carrying a payment reference
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if no live order carries it.
    pub async fn find_order_by_reference(&self, reference: &str) -> EngineResult<Order> {
        self.env
            .orders
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| EngineError::not_found("order", format!("with reference {reference}")))
    }

    /// Lists all live orders
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn get_all_orders(&self) -> EngineResult<Vec<Order>> {
        Ok(self.env.orders.find_all().await?)
    }

    /// Lists a user's live orders. Unknown usernames have no orders.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn find_orders_by_username(&self, username: &str) -> EngineResult<Vec<Order>> {
        match self.env.users.get_user_by_username(username).await? {
            Some(user) => Ok(self.env.orders.find_by_owner(user.id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Lists a user's orders that are still `CREATING`
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn get_open_orders(&self, username: &str) -> EngineResult<Vec<Order>> {
        let mut orders = self.find_orders_by_username(username).await?;
        orders.retain(Order::is_mutable);
        Ok(orders)
    }

    /// Lists all archived orders
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn get_expired_orders(&self) -> EngineResult<Vec<ExpiredOrder>> {
        Ok(self.env.expired_orders.find_all().await?)
    }

    /// Looks up the archive entry of an expired order
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the order was never expired.
    pub async fn get_expired_order(&self, order_id: OrderId) -> EngineResult<ExpiredOrder> {
        self.env
            .expired_orders
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("expired order", order_id))
    }

    /// Resolves the tickets of an order, skipping ids that no longer resolve
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn tickets_of(&self, order: &Order) -> EngineResult<Vec<Ticket>> {
        let mut tickets = Vec::with_capacity(order.tickets.len());
        for ticket_id in &order.tickets {
            match self.allocator.get_ticket_by_id(*ticket_id).await {
                Ok(ticket) => tickets.push(ticket),
                Err(EngineError::NotFound { .. }) => {
                    tracing::warn!(
                        order_id = %order.id,
                        ticket_id = %ticket_id,
                        "Order references a ticket that no longer exists"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        Ok(tickets)
    }

    // ------------------------------------------------------------------------
    // Internals (callers hold the order lock)
    // ------------------------------------------------------------------------

    async fn load_order(&self, order_id: OrderId) -> EngineResult<Order> {
        self.env
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order", order_id))
    }

    async fn allocate(&self, owner: UserId, request: TicketRequest) -> EngineResult<Ticket> {
        self.allocator
            .request_ticket_of_type(
                request.ticket_type,
                owner,
                request.pickup_service,
                request.ch_member,
            )
            .await
    }

    /// Saves an order that just gained `ticket_id`; if the save fails the
    /// ticket is released again so it does not hold capacity.
    async fn save_or_release(&self, order: Order, ticket_id: TicketId) -> EngineResult<Order> {
        match self.env.orders.save(order).await {
            Ok(order) => Ok(order),
            Err(error) => {
                if let Err(release_error) = self.allocator.remove_ticket(ticket_id).await {
                    tracing::error!(
                        ticket_id = %ticket_id,
                        error = %release_error,
                        "Failed to release ticket after order save failed"
                    );
                }
                Err(error.into())
            }
        }
    }

    async fn apply_payment_status(
        &self,
        mut order: Order,
        reported: OrderStatus,
    ) -> EngineResult<Order> {
        tracing::debug!(
            order_id = %order.id,
            current = %order.status,
            reported = %reported,
            "Applying payment status"
        );
        match reported {
            OrderStatus::Creating => Ok(order),
            OrderStatus::Paid => self.mark_paid(order).await,
            OrderStatus::Expired => {
                self.expire_locked(order.clone()).await?;
                order.status = OrderStatus::Expired;
                Ok(order)
            }
        }
    }

    /// Moves the order to `PAID` (if it is not already) and validates every
    /// ticket it holds. Re-running it on a paid order re-validates, which
    /// completes an earlier run that failed halfway.
    async fn mark_paid(&self, mut order: Order) -> EngineResult<Order> {
        let effects = lifecycle::reduce(&mut order, OrderCommand::MarkPaid)?;
        let (order, _) = self.run_effects(order, effects).await?;
        Ok(order)
    }

    /// Archives the order, releases its tickets and only then deletes the
    /// live order, so a failure at any step leaves the order in place and a
    /// retry picks up where the failed run stopped.
    async fn expire_locked(&self, mut order: Order) -> EngineResult<ExpiredOrder> {
        let effects = lifecycle::reduce(&mut order, OrderCommand::Expire)?;
        let order_id = order.id;
        let (order, archived) = self.run_effects(order, effects).await?;
        let expired = archived.ok_or_else(|| EngineError::not_found("expired order", order_id))?;

        tracing::info!(
            order_id = %order.id,
            status_at_expiry = %order.status,
            released = expired.tickets.len(),
            "Order expired"
        );
        Ok(expired)
    }

    async fn run_effects(
        &self,
        mut order: Order,
        effects: Vec<OrderEffect>,
    ) -> EngineResult<(Order, Option<ExpiredOrder>)> {
        let mut archived = None;
        for effect in effects {
            match effect {
                OrderEffect::Save => {
                    order = self.env.orders.save(order).await?;
                    tracing::info!(order_id = %order.id, status = %order.status, "Order saved");
                }
                OrderEffect::ValidateTickets => self.validate_tickets(&order).await?,
                OrderEffect::Archive => archived = Some(self.archive(&order).await?),
                OrderEffect::ReleaseTickets => {
                    for ticket_id in &order.tickets {
                        self.release_ticket(*ticket_id).await?;
                    }
                }
                OrderEffect::Delete => {
                    if !self.env.orders.delete(order.id).await? {
                        return Err(EngineError::not_found("order", order.id));
                    }
                }
            }
        }
        Ok((order, archived))
    }

    async fn validate_tickets(&self, order: &Order) -> EngineResult<()> {
        for ticket_id in &order.tickets {
            match self.allocator.validate_ticket(*ticket_id).await {
                Ok(_) => {}
                Err(EngineError::NotFound { .. }) => {
                    tracing::warn!(
                        order_id = %order.id,
                        ticket_id = %ticket_id,
                        "Skipping released ticket while marking order paid"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    /// Writes the snapshot, or returns the one a failed earlier run already
    /// wrote; tickets released by that run no longer resolve.
    async fn archive(&self, order: &Order) -> EngineResult<ExpiredOrder> {
        if let Some(archived) = self.env.expired_orders.find_by_order_id(order.id).await? {
            return Ok(archived);
        }
        let tickets = self.tickets_of(order).await?;
        let expired = ExpiredOrder::capture(order, &tickets, self.env.clock.now());
        self.env.expired_orders.save(expired.clone()).await?;
        Ok(expired)
    }

    /// Releases a ticket; one that is already gone counts as released.
    async fn release_ticket(&self, ticket_id: TicketId) -> EngineResult<()> {
        match self.allocator.remove_ticket(ticket_id).await {
            Ok(()) | Err(EngineError::NotFound { .. }) => Ok(()),
            Err(error) => Err(error),
        }
    }
}

fn ensure_mutable(order: &Order) -> EngineResult<()> {
    if order.is_mutable() {
        Ok(())
    } else {
        Err(EngineError::conflict(format!(
            "Order {} is immutable (status: {})",
            order.id, order.status
        )))
    }
}
