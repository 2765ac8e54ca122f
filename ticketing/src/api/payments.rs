//! Payment provider callbacks.
//!
//! The provider calls `POST /payments/webhook/:reference` whenever a payment
//! session changes. The body is ignored: the current status is always fetched
//! from the provider itself, so a forged callback can at most trigger a
//! refresh.

use super::OrderView;
use super::orders::record_transition;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use ticket_engine_web::{CorrelationId, WebResult};

/// Apply the provider's status for the order behind `reference`.
pub async fn payment_webhook(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Path(reference): Path<String>,
) -> WebResult<Json<OrderView>> {
    tracing::info!(
        correlation_id = %correlation_id.0,
        reference = %reference,
        "Payment callback received"
    );

    let before = state.manager.find_order_by_reference(&reference).await?;
    let order = state
        .manager
        .update_order_status_by_reference(&reference)
        .await?;
    record_transition(before.status, order.status, before.tickets.len());

    Ok(Json(OrderView::load(&state.manager, order).await?))
}
