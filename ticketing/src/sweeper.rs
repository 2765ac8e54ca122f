//! Background task that expires unpaid orders.
//!
//! Every `sweep_interval_secs` the sweeper expires each `CREATING` order older
//! than `expiry_minutes`, returning its tickets to inventory. A failing sweep
//! is logged and retried on the next tick.

use crate::config::OrderConfig;
use crate::metrics;
use std::sync::Arc;
use std::time::Duration;
use ticket_engine_core::OrderLifecycleManager;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Spawn the order sweeper. It runs until `shutdown` fires or its sender is
/// dropped.
pub fn spawn_order_sweeper(
    manager: Arc<OrderLifecycleManager>,
    config: OrderConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let max_age = config.max_age();
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.sweep_interval_secs.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = config.sweep_interval_secs,
            expiry_minutes = config.expiry_minutes,
            "Order sweeper started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match manager.expire_stale_orders(max_age).await {
                        Ok(expired) if expired.is_empty() => debug!("No stale orders"),
                        Ok(expired) => {
                            metrics::record_expiries(&expired);
                            info!(count = expired.len(), "Sweeper expired stale orders");
                        }
                        Err(error) if error.is_client_error() => {
                            warn!(error = %error, "Order sweep refused");
                        }
                        Err(error) => error!(error = %error, "Order sweep failed"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Order sweeper shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ticket_engine_core::{OrderStatus, TicketRequest, TicketType};
    use ticket_engine_testing::TestEngine;

    fn fast_config() -> OrderConfig {
        OrderConfig {
            limit: 5,
            expiry_minutes: 30,
            sweep_interval_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_sweeper_expires_stale_orders() {
        let engine = TestEngine::new();
        let order = engine
            .manager
            .create(engine.alice.id, TicketRequest::of_type(TicketType::Regular))
            .await
            .unwrap();
        engine.clock.advance(chrono::Duration::minutes(31));

        let (tx, rx) = broadcast::channel(1);
        let handle = spawn_order_sweeper(engine.manager.clone(), fast_config(), rx);

        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        let archived = engine.manager.get_expired_order(order.id).await.unwrap();
        assert_eq!(archived.status_at_expiry, OrderStatus::Creating);
        assert_eq!(
            engine
                .allocator
                .get_number_sold_of_type(TicketType::Regular)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_sender_dropped() {
        let engine = TestEngine::new();
        let (tx, rx) = broadcast::channel::<()>(1);
        let handle = spawn_order_sweeper(engine.manager.clone(), fast_config(), rx);

        drop(tx);
        handle.await.unwrap();
    }
}
