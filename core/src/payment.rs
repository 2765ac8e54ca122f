//! Payment gateway interface and a mock provider for development.
//!
//! The engine treats the provider as opaque: it registers an order and gets
//! back a reference plus a redirect URL, and later asks for the status behind
//! a reference. Settlement, retries and provider callbacks stay outside.

use crate::error::GatewayError;
use crate::types::{Order, OrderId, OrderStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// A registered payment session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// Provider reference, stored on the order
    pub reference: String,
    /// Where the customer is sent to pay
    pub payment_url: String,
}

/// Payment provider abstraction.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registers an order for payment
    ///
    /// # Errors
    ///
    /// Returns error if the provider refuses or cannot be reached
    async fn register_order(&self, order: &Order) -> GatewayResult<Checkout>;

    /// Current status of the payment behind `reference`
    ///
    /// # Errors
    ///
    /// Returns error if the reference is unknown or the provider cannot be reached
    async fn update_status(&self, reference: &str) -> GatewayResult<OrderStatus>;
}

/// Mock payment gateway.
///
/// Registered sessions start out unpaid (`CREATING`). Tests and the dev server
/// settle them with [`MockPaymentGateway::settle`]; with `auto_pay` every known
/// reference reports `PAID` on its first status query.
#[derive(Debug)]
pub struct MockPaymentGateway {
    return_url: String,
    auto_pay: bool,
    sessions: RwLock<HashMap<String, (OrderId, OrderStatus)>>,
}

impl MockPaymentGateway {
    /// Creates a mock provider redirecting to `return_url`
    #[must_use]
    pub fn new(return_url: impl Into<String>, auto_pay: bool) -> Self {
        Self {
            return_url: return_url.into(),
            auto_pay,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(return_url: impl Into<String>, auto_pay: bool) -> Arc<Self> {
        Arc::new(Self::new(return_url, auto_pay))
    }

    /// Sets the status the provider reports for `reference`
    ///
    /// # Errors
    ///
    /// Returns error if the reference was never registered
    pub async fn settle(&self, reference: &str, status: OrderStatus) -> GatewayResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(reference)
            .ok_or_else(|| GatewayError::UnknownReference(reference.to_string()))?;
        session.1 = status;
        tracing::info!(reference, status = %status, "Mock payment settled");
        Ok(())
    }

    /// Reference registered for an order, if any
    pub async fn reference_for(&self, order_id: OrderId) -> Option<String> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|(_, (id, _))| *id == order_id)
            .map(|(reference, _)| reference.clone())
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new("http://localhost:8080/payments/mock", false)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn register_order(&self, order: &Order) -> GatewayResult<Checkout> {
        if order.tickets.is_empty() {
            return Err(GatewayError::Rejected {
                reason: "order holds no tickets".to_string(),
            });
        }

        let reference = format!("mock_ref_{}", uuid::Uuid::new_v4().simple());
        self.sessions
            .write()
            .await
            .insert(reference.clone(), (order.id, OrderStatus::Creating));

        tracing::info!(
            order_id = %order.id,
            reference = %reference,
            tickets = order.tickets.len(),
            "Mock payment session registered"
        );

        Ok(Checkout {
            payment_url: format!("{}/{reference}", self.return_url.trim_end_matches('/')),
            reference,
        })
    }

    async fn update_status(&self, reference: &str) -> GatewayResult<OrderStatus> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(reference)
            .ok_or_else(|| GatewayError::UnknownReference(reference.to_string()))?;
        if self.auto_pay && session.1 == OrderStatus::Creating {
            session.1 = OrderStatus::Paid;
        }
        Ok(session.1)
    }
}
