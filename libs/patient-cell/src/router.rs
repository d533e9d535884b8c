use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::PatientCellState;

pub fn patient_routes(state: Arc<PatientCellState>) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/", post(handlers::register_patient))
        .route("/{patient_id}", get(handlers::get_patient))
        .route(
            "/{patient_id}/balance-and-history",
            get(handlers::balance_and_history),
        )
        .route("/{patient_id}/points/purchase", put(handlers::purchase_points))
        .route("/{patient_id}/points/deduct", put(handlers::deduct_points))
        .route("/{patient_id}/points/add", put(handlers::add_points))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
