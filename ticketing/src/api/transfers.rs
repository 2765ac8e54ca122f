//! Ticket transfer endpoints.
//!
//! - POST /tickettransfer - Owner offers a ticket to another user
//! - PUT /tickettransfer/:key - Recipient claims the ticket
//! - DELETE /tickettransfer/:key - Owner withdraws the offer
//!
//! A refused claim always answers `400 NOT_TRANSFERRABLE` with the same body,
//! whether the key is unknown, not offered, or offered to someone else.

use super::TicketView;
use crate::metrics;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use ticket_engine_core::{EngineError, EngineResult, TicketKey};
use ticket_engine_web::{AuthenticatedUser, WebResult};

/// Request to offer a ticket.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Key of the ticket to hand over
    pub ticket_key: TicketKey,
    /// Username of the recipient
    pub goal_username: String,
}

/// Lock a ticket for transfer to another user.
///
/// ```bash
/// curl -X POST http://localhost:8080/tickettransfer \
///   -H "X-User-Id: <owner id>" \
///   -H "Content-Type: application/json" \
///   -d '{"ticket_key": "K1", "goal_username": "bob"}'
/// ```
pub async fn setup_transfer(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<TransferRequest>,
) -> WebResult<Json<TicketView>> {
    let ticket = state
        .transfers
        .setup_for_transfer(user.id, &request.ticket_key, &request.goal_username)
        .await?;
    metrics::record_transfer("offered");

    Ok(Json(TicketView::from(&ticket)))
}

/// Claim a ticket offered to the caller. The response carries the new key.
pub async fn complete_transfer(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(key): Path<String>,
) -> WebResult<Json<TicketView>> {
    let result = state
        .transfers
        .transfer_ticket(user.id, &TicketKey::from_string(key))
        .await;
    record_claim(&result);

    Ok(Json(TicketView::from(&result?)))
}

/// Withdraw a pending offer.
pub async fn cancel_transfer(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(key): Path<String>,
) -> WebResult<Json<TicketView>> {
    let ticket = state
        .transfers
        .cancel_ticket_transfer(user.id, &TicketKey::from_string(key))
        .await?;
    metrics::record_transfer("cancelled");

    Ok(Json(TicketView::from(&ticket)))
}

fn record_claim<T>(result: &EngineResult<T>) {
    match result {
        Ok(_) => metrics::record_transfer("completed"),
        Err(EngineError::NotTransferrable(_)) => metrics::record_transfer("refused"),
        Err(_) => {}
    }
}
