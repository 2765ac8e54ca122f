//! Domain types for the ticket engine.
//!
//! Identifiers, the ticket catalog, and the `Ticket`, `Order` and `ExpiredOrder`
//! records. Records are plain values: an `Order` refers to its tickets and its
//! owner by id and never embeds them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a user
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable internal identifier for a ticket.
///
/// Unlike [`TicketKey`], the id never changes over the ticket's lifetime, so
/// orders reference their tickets by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public, bearer-style ticket key.
///
/// A fresh key is generated at issuance and again on every completed transfer;
/// a key is never handed out twice.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketKey(String);

impl TicketKey {
    /// Generates a new unique key
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps a key received from a caller. No validation is done here: an
    /// unknown key simply resolves to nothing.
    #[must_use]
    pub fn from_string(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random `OrderId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrderId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Users
// ============================================================================

/// A user as resolved by the [`UserDirectory`](crate::store::UserDirectory).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,
    /// Unique username (compared case-insensitively)
    pub username: String,
    /// Whether the user may use administrative operations
    pub admin: bool,
}

impl User {
    /// Creates a regular (non-admin) user
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            admin: false,
        }
    }

    /// Creates an administrator
    #[must_use]
    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            admin: true,
            ..Self::new(username)
        }
    }
}

// ============================================================================
// Ticket catalog
// ============================================================================

/// Ticket types on sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    /// Discounted tickets sold before the regular sale opens
    EarlyBird,
    /// Regular full-event ticket
    Regular,
    /// Tickets sold in the final days before the event
    LastMinute,
    /// Internal type used to exercise the payment flow; never listed
    Test,
    /// Staff passes, handed out but never sold
    Staff,
}

impl TicketType {
    /// All ticket types, in catalog order
    pub const ALL: [Self; 5] = [
        Self::EarlyBird,
        Self::Regular,
        Self::LastMinute,
        Self::Test,
        Self::Staff,
    ];

    /// Internal types are excluded from the public availability overview
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::Test)
    }

    /// The `SCREAMING_SNAKE_CASE` name, as used on the wire and in config keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EarlyBird => "EARLY_BIRD",
            Self::Regular => "REGULAR",
            Self::LastMinute => "LAST_MINUTE",
            Self::Test => "TEST",
            Self::Staff => "STAFF",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity and purchasability of one ticket type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTypeSpec {
    /// Maximum number of tickets of this type that may exist at once
    pub limit: usize,
    /// Whether the type can be ordered
    pub buyable: bool,
}

/// Capacity table for every [`TicketType`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCatalog {
    specs: BTreeMap<TicketType, TicketTypeSpec>,
}

impl TicketCatalog {
    /// Overrides the capacity of a ticket type.
    #[must_use]
    pub fn with_limit(mut self, ticket_type: TicketType, limit: usize) -> Self {
        self.specs
            .entry(ticket_type)
            .and_modify(|spec| spec.limit = limit)
            .or_insert(TicketTypeSpec {
                limit,
                buyable: true,
            });
        self
    }

    /// Looks up the spec of a ticket type. Unlisted types are unbuyable with
    /// no capacity.
    #[must_use]
    pub fn spec(&self, ticket_type: TicketType) -> TicketTypeSpec {
        self.specs
            .get(&ticket_type)
            .copied()
            .unwrap_or(TicketTypeSpec {
                limit: 0,
                buyable: false,
            })
    }

    /// Iterates over all types in catalog order
    pub fn iter(&self) -> impl Iterator<Item = (TicketType, TicketTypeSpec)> + '_ {
        self.specs.iter().map(|(ticket_type, spec)| (*ticket_type, *spec))
    }
}

impl Default for TicketCatalog {
    fn default() -> Self {
        let specs = [
            (TicketType::EarlyBird, 50, true),
            (TicketType::Regular, 250, true),
            (TicketType::LastMinute, 50, true),
            (TicketType::Test, 2, true),
            (TicketType::Staff, 40, false),
        ]
        .into_iter()
        .map(|(ticket_type, limit, buyable)| (ticket_type, TicketTypeSpec { limit, buyable }))
        .collect();

        Self { specs }
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// An issued ticket.
///
/// A pending transfer is stored as `transfer_goal_owner = Some(goal)`; the
/// ticket is transferrable exactly when a goal owner is set, so the two can
/// never disagree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Stable ticket ID
    pub id: TicketId,
    /// Current public key
    pub key: TicketKey,
    /// Current owner
    pub owner: UserId,
    /// Ticket type
    pub ticket_type: TicketType,
    /// Includes the pickup service
    pub pickup_service: bool,
    /// Issued at the member rate
    pub ch_member: bool,
    /// Set once the owning order is paid
    pub valid: bool,
    /// Nominated recipient while a transfer is pending
    pub transfer_goal_owner: Option<UserId>,
    /// Store version, bumped on every save
    pub version: u64,
}

impl Ticket {
    /// Creates a fresh, unpaid ticket with a new id and key
    #[must_use]
    pub fn issue(
        owner: UserId,
        ticket_type: TicketType,
        pickup_service: bool,
        ch_member: bool,
    ) -> Self {
        Self {
            id: TicketId::new(),
            key: TicketKey::generate(),
            owner,
            ticket_type,
            pickup_service,
            ch_member,
            valid: false,
            transfer_goal_owner: None,
            version: 0,
        }
    }

    /// True while a transfer is pending
    #[must_use]
    pub const fn is_transferrable(&self) -> bool {
        self.transfer_goal_owner.is_some()
    }

    /// Locks the ticket for transfer to `goal`, replacing any earlier nominee.
    pub fn lock_for_transfer(&mut self, goal: UserId) {
        self.transfer_goal_owner = Some(goal);
    }

    /// Drops a pending transfer, keeping the current owner.
    pub fn cancel_transfer(&mut self) {
        self.transfer_goal_owner = None;
    }

    /// Completes a pending transfer: ownership moves to the goal owner and the
    /// ticket gets a brand-new key. Returns the previous owner, or `None` if no
    /// transfer was pending (the ticket is left untouched).
    pub fn finalize_transfer(&mut self) -> Option<UserId> {
        let goal = self.transfer_goal_owner.take()?;
        let previous = std::mem::replace(&mut self.owner, goal);
        self.key = TicketKey::generate();
        Some(previous)
    }
}

/// The attributes a caller picks when ordering or removing a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRequest {
    /// Requested type
    pub ticket_type: TicketType,
    /// Include the pickup service
    #[serde(default)]
    pub pickup_service: bool,
    /// Member rate
    #[serde(default)]
    pub ch_member: bool,
}

impl TicketRequest {
    /// Creates a request without extras
    #[must_use]
    pub const fn of_type(ticket_type: TicketType) -> Self {
        Self {
            ticket_type,
            pickup_service: false,
            ch_member: false,
        }
    }

    /// True if the ticket has the requested (type, member, pickup) attributes
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.ticket_type == self.ticket_type
            && ticket.ch_member == self.ch_member
            && ticket.pickup_service == self.pickup_service
    }
}

/// Public inventory line for one ticket type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketAvailability {
    /// Ticket type
    pub ticket_type: TicketType,
    /// Tickets currently issued
    pub sold: usize,
    /// Capacity
    pub limit: usize,
    /// Capacity left
    pub remaining: usize,
}

// ============================================================================
// Orders
// ============================================================================

/// Order lifecycle status.
///
/// ```text
/// CREATING ──► PAID ──► EXPIRED
///     │                    ▲
///     └────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Open: tickets may be added or removed
    Creating,
    /// Settled: tickets are valid
    Paid,
    /// Archived; terminal
    Expired,
}

impl OrderStatus {
    /// Whether `self -> next` is an edge of the lifecycle.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Creating, Self::Paid | Self::Expired) | (Self::Paid, Self::Expired)
        )
    }

    /// Lower-case label for logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Paid => "paid",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID
    pub id: OrderId,
    /// Ordering user
    pub owner: UserId,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Tickets held by this order, in the order they were added
    pub tickets: Vec<TicketId>,
    /// Payment session reference, set at checkout
    pub reference: Option<String>,
    /// When the order was opened
    pub created_at: DateTime<Utc>,
    /// Store version, bumped on every save
    pub version: u64,
}

impl Order {
    /// Opens a new, empty order in `CREATING`
    #[must_use]
    pub fn open(owner: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            owner,
            status: OrderStatus::Creating,
            tickets: Vec::new(),
            reference: None,
            created_at,
            version: 0,
        }
    }

    /// Tickets may only be added or removed while the order is open
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.status == OrderStatus::Creating
    }
}

/// Ticket data captured when an order is archived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    /// Ticket ID
    pub id: TicketId,
    /// Key at expiry
    pub key: TicketKey,
    /// Owner at expiry
    pub owner: UserId,
    /// Ticket type
    pub ticket_type: TicketType,
    /// Pickup service
    pub pickup_service: bool,
    /// Member rate
    pub ch_member: bool,
    /// Whether the ticket was valid
    pub valid: bool,
}

impl From<&Ticket> for TicketSnapshot {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            key: ticket.key.clone(),
            owner: ticket.owner,
            ticket_type: ticket.ticket_type,
            pickup_service: ticket.pickup_service,
            ch_member: ticket.ch_member,
            valid: ticket.valid,
        }
    }
}

/// Immutable audit record written when an order is expired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredOrder {
    /// ID the live order had
    pub order_id: OrderId,
    /// Ordering user
    pub owner: UserId,
    /// Status the order had right before expiry
    pub status_at_expiry: OrderStatus,
    /// Tickets the order held
    pub tickets: Vec<TicketSnapshot>,
    /// Payment reference, if checkout happened
    pub reference: Option<String>,
    /// When the order was opened
    pub created_at: DateTime<Utc>,
    /// When it was expired
    pub expired_at: DateTime<Utc>,
}

impl ExpiredOrder {
    /// Captures an order and its tickets
    #[must_use]
    pub fn capture(order: &Order, tickets: &[Ticket], expired_at: DateTime<Utc>) -> Self {
        Self {
            order_id: order.id,
            owner: order.owner,
            status_at_expiry: order.status,
            tickets: tickets.iter().map(TicketSnapshot::from).collect(),
            reference: order.reference.clone(),
            created_at: order.created_at,
            expired_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use OrderStatus::{Creating, Expired, Paid};

        assert!(Creating.can_transition_to(Paid));
        assert!(Creating.can_transition_to(Expired));
        assert!(Paid.can_transition_to(Expired));

        assert!(!Paid.can_transition_to(Creating));
        assert!(!Expired.can_transition_to(Creating));
        assert!(!Expired.can_transition_to(Paid));
        assert!(!Creating.can_transition_to(Creating));
    }

    #[test]
    fn test_finalize_transfer_moves_owner_and_rekeys() {
        let alice = UserId::new();
        let bob = UserId::new();
        let mut ticket = Ticket::issue(alice, TicketType::Regular, false, false);
        let old_key = ticket.key.clone();

        ticket.lock_for_transfer(bob);
        assert!(ticket.is_transferrable());

        assert_eq!(ticket.finalize_transfer(), Some(alice));
        assert_eq!(ticket.owner, bob);
        assert_ne!(ticket.key, old_key);
        assert!(!ticket.is_transferrable());
    }

    #[test]
    fn test_finalize_without_pending_transfer_is_noop() {
        let mut ticket = Ticket::issue(UserId::new(), TicketType::Regular, true, false);
        let before = ticket.clone();

        assert_eq!(ticket.finalize_transfer(), None);
        assert_eq!(ticket, before);
    }

    #[test]
    fn test_request_matches_all_three_attributes() {
        let ticket = Ticket::issue(UserId::new(), TicketType::EarlyBird, true, false);

        let exact = TicketRequest {
            ticket_type: TicketType::EarlyBird,
            pickup_service: true,
            ch_member: false,
        };
        assert!(exact.matches(&ticket));
        assert!(!TicketRequest { ch_member: true, ..exact }.matches(&ticket));
        assert!(!TicketRequest::of_type(TicketType::EarlyBird).matches(&ticket));
    }

    #[test]
    fn test_catalog_overrides_and_unknown_types() {
        let catalog = TicketCatalog::default().with_limit(TicketType::EarlyBird, 2);
        assert_eq!(catalog.spec(TicketType::EarlyBird).limit, 2);
        assert!(catalog.spec(TicketType::EarlyBird).buyable);
        assert!(!catalog.spec(TicketType::Staff).buyable);
    }

    #[test]
    fn test_ticket_type_names() {
        assert_eq!(TicketType::LastMinute.to_string(), "LAST_MINUTE");
        assert!(TicketType::Test.is_internal());
        assert!(!TicketType::Regular.is_internal());
    }
}
