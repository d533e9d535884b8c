use std::sync::Arc;

use axum::{routing::get, Router};

use consultation_cell::router::{booking_routes, consultation_routes};
use consultation_cell::ConsultationCellState;
use patient_cell::router::patient_routes;
use patient_cell::PatientCellState;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let patient_state = Arc::new(PatientCellState::new(config.clone()));
    let consultation_state = Arc::new(ConsultationCellState::new(config));

    Router::new()
        .route("/", get(|| async { "Hospital scheduling API is running!" }))
        .nest("/patients", patient_routes(patient_state))
        .nest("/consultations", consultation_routes(consultation_state.clone()))
        .nest("/bookings", booking_routes(consultation_state))
}
