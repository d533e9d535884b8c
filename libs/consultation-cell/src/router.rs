use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::ConsultationCellState;

/// Routes mounted under `/consultations`.
pub fn consultation_routes(state: Arc<ConsultationCellState>) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/", post(handlers::create_slot))
        .route("/search", get(handlers::search_slots))
        .route("/upcoming", get(handlers::upcoming_slots))
        .route("/{slot_id}", get(handlers::get_slot))
        .route("/{slot_id}/cancel", put(handlers::cancel_slot))
        .route("/{slot_id}/complete", put(handlers::complete_slot))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}

/// Routes mounted under `/bookings`.
pub fn booking_routes(state: Arc<ConsultationCellState>) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/slot/{slot_id}", post(handlers::book_slot))
        .route("/mine", get(handlers::my_bookings))
        .route("/confirm", put(handlers::confirm_attendance))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}/cancel", post(handlers::cancel_booking))
        .route("/{booking_id}/checkin", post(handlers::check_in))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
