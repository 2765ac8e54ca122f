//! Business metrics for the ticketing service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `tickets_allocated_total{type}` - Tickets issued, by ticket type
//! - `tickets_sold_out_total{type}` - Allocation requests refused for capacity
//! - `tickets_released_total` - Tickets returned to inventory
//! - `orders_total{status}` - Order transitions (created, paid, expired)
//! - `ticket_transfers_total{outcome}` - Transfer steps (offered, completed,
//!   cancelled, refused)
//!
//! ## Gauges
//! - `tickets_remaining{type}` - Remaining capacity, refreshed on availability
//!   queries

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use ticket_engine_core::{EngineError, EngineResult, ExpiredOrder, TicketAvailability, TicketType};

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "tickets_allocated_total",
        "Total number of tickets issued by ticket type"
    );
    describe_counter!(
        "tickets_sold_out_total",
        "Total number of allocation requests refused because the type was sold out"
    );
    describe_counter!(
        "tickets_released_total",
        "Total number of tickets returned to inventory"
    );
    describe_counter!(
        "orders_total",
        "Total number of order transitions by status (created, paid, expired)"
    );
    describe_counter!(
        "ticket_transfers_total",
        "Total number of transfer steps by outcome (offered, completed, cancelled, refused)"
    );
    describe_gauge!(
        "tickets_remaining",
        "Remaining capacity per ticket type"
    );

    tracing::info!("Business metrics registered");
}

/// Install the Prometheus recorder and return the handle used by `GET /metrics`.
///
/// # Errors
///
/// Returns error if a global recorder is already installed.
pub fn install_exporter() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_business_metrics();
    Ok(handle)
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record the outcome of a ticket allocation.
pub fn record_allocation<T>(ticket_type: TicketType, result: &EngineResult<T>) {
    match result {
        Ok(_) => {
            metrics::counter!("tickets_allocated_total", "type" => ticket_type.as_str())
                .increment(1);
        }
        Err(EngineError::ResourceExhausted { .. }) => {
            metrics::counter!("tickets_sold_out_total", "type" => ticket_type.as_str())
                .increment(1);
        }
        Err(_) => {}
    }
}

/// Record tickets returned to inventory.
pub fn record_tickets_released(count: usize) {
    metrics::counter!("tickets_released_total").increment(u64::try_from(count).unwrap_or(u64::MAX));
    tracing::debug!(count, "Recorded tickets_released metric");
}

/// Record an order transition.
///
/// # Arguments
///
/// * `status` - `created`, `paid` or `expired`
pub fn record_order(status: &'static str) {
    metrics::counter!("orders_total", "status" => status).increment(1);
}

/// Record expired orders and the tickets they returned to inventory.
pub fn record_expiries(expired: &[ExpiredOrder]) {
    for archived in expired {
        record_order("expired");
        record_tickets_released(archived.tickets.len());
    }
}

/// Record a transfer step.
///
/// # Arguments
///
/// * `outcome` - `offered`, `completed`, `cancelled` or `refused`
pub fn record_transfer(outcome: &'static str) {
    metrics::counter!("ticket_transfers_total", "outcome" => outcome).increment(1);
}

/// Refresh the remaining-capacity gauges.
#[allow(clippy::cast_precision_loss)]
pub fn update_remaining(availability: &[TicketAvailability]) {
    for line in availability {
        metrics::gauge!("tickets_remaining", "type" => line.ticket_type.as_str())
            .set(line.remaining as f64);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::orders::record_transition;
    use ticket_engine_core::{Order, OrderStatus, Ticket, UserId};
    use ticket_engine_testing::epoch;

    fn render(record: impl FnOnce()) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, record);
        handle.render()
    }

    fn archived_with(tickets: usize) -> ExpiredOrder {
        let owner = UserId::new();
        let tickets: Vec<Ticket> = (0..tickets)
            .map(|_| Ticket::issue(owner, TicketType::Regular, false, false))
            .collect();
        ExpiredOrder::capture(&Order::open(owner, epoch()), &tickets, epoch())
    }

    #[test]
    fn test_expiries_count_orders_and_released_tickets() {
        let rendered = render(|| record_expiries(&[archived_with(2), archived_with(3)]));

        assert!(rendered.contains("orders_total{status=\"expired\"} 2"));
        assert!(rendered.contains("tickets_released_total 5"));
    }

    #[test]
    fn test_only_real_transitions_are_counted() {
        let rendered = render(|| {
            record_transition(OrderStatus::Paid, OrderStatus::Paid, 1);
            record_transition(OrderStatus::Creating, OrderStatus::Creating, 1);
            record_transition(OrderStatus::Creating, OrderStatus::Paid, 1);
        });

        assert!(rendered.contains("orders_total{status=\"paid\"} 1"));
        assert!(!rendered.contains("status=\"creating\""));
    }
}
