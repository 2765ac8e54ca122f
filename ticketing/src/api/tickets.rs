//! Ticket API endpoints.
//!
//! - GET /tickets/available - Public inventory overview
//! - GET /tickets - Tickets owned by the caller

use super::TicketView;
use crate::metrics;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use ticket_engine_core::TicketAvailability;
use ticket_engine_web::{AuthenticatedUser, WebResult};

/// Remaining capacity per buyable ticket type.
///
/// ```bash
/// curl http://localhost:8080/tickets/available
/// # [{"ticket_type":"EARLY_BIRD","sold":3,"limit":50,"remaining":47}, ...]
/// ```
pub async fn available_tickets(
    State(state): State<AppState>,
) -> WebResult<Json<Vec<TicketAvailability>>> {
    let availability = state.manager.get_available_tickets().await?;
    metrics::update_remaining(&availability);
    Ok(Json(availability))
}

/// Tickets currently owned by the caller.
pub async fn my_tickets(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> WebResult<Json<Vec<TicketView>>> {
    let tickets = state.allocator.tickets_owned_by(user.id).await?;
    Ok(Json(tickets.iter().map(TicketView::from).collect()))
}
