use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AddPointsRequest, DeductPointsRequest, PointsBalanceResponse, PurchasePointsRequest,
    RegisterPatientRequest,
};
use crate::PatientCellState;

#[axum::debug_handler]
pub async fn register_patient(
    State(state): State<Arc<PatientCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<RegisterPatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    user.require_staff()?;

    let patient = state.ledger.register_patient(request)?;
    Ok((StatusCode::CREATED, Json(json!(patient))))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<PatientCellState>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.can_access_patient(patient_id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient".to_string(),
        ));
    }

    let patient = state.ledger.get_patient(patient_id)?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn balance_and_history(
    State(state): State<Arc<PatientCellState>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.can_access_patient(patient_id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's points".to_string(),
        ));
    }

    let response = state.ledger.balance_and_history(patient_id)?;
    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn purchase_points(
    State(state): State<Arc<PatientCellState>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<PurchasePointsRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.can_access_patient(patient_id) {
        return Err(AppError::Forbidden(
            "Not authorized to purchase points for this patient".to_string(),
        ));
    }

    let balance = state.ledger.purchase_points(patient_id, request.amount)?;
    Ok(Json(json!(PointsBalanceResponse {
        patient_id,
        balance
    })))
}

/// Internal endpoint used by the consultation service during booking
/// settlement. Staff / service-to-service tokens only.
#[axum::debug_handler]
pub async fn deduct_points(
    State(state): State<Arc<PatientCellState>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<DeductPointsRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() && user.patient_id != Some(patient_id) {
        return Err(AppError::Forbidden(
            "Not authorized to deduct points for this patient".to_string(),
        ));
    }

    let balance = state
        .ledger
        .deduct_points(patient_id, request.points, &request.reason)?;
    Ok(Json(json!(PointsBalanceResponse {
        patient_id,
        balance
    })))
}

#[axum::debug_handler]
pub async fn add_points(
    State(state): State<Arc<PatientCellState>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<AddPointsRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() && user.patient_id != Some(patient_id) {
        return Err(AppError::Forbidden(
            "Not authorized to add points for this patient".to_string(),
        ));
    }

    let balance =
        state
            .ledger
            .add_points(patient_id, request.points, &request.reason, request.source)?;
    Ok(Json(json!(PointsBalanceResponse {
        patient_id,
        balance
    })))
}
