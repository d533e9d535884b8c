use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BookSlotRequest, ConfirmAttendanceQuery, CreateSlotRequest, SlotResponse, SlotSearchQuery,
};
use crate::ConsultationCellState;

// ==============================================================================
// SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<Arc<ConsultationCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    user.require_staff()?;

    let slot = state.slots.create_slot(request)?;
    Ok((StatusCode::CREATED, Json(json!(SlotResponse::from(slot)))))
}

#[axum::debug_handler]
pub async fn search_slots(
    State(state): State<Arc<ConsultationCellState>>,
    Query(query): Query<SlotSearchQuery>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let slots: Vec<SlotResponse> = state
        .slots
        .search(&query)
        .into_iter()
        .map(SlotResponse::from)
        .collect();
    Ok(Json(json!(slots)))
}

/// Slots starting within the next 48 hours, for the staff check-in
/// dashboard.
#[axum::debug_handler]
pub async fn upcoming_slots(
    State(state): State<Arc<ConsultationCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    user.require_staff()?;

    let slots: Vec<SlotResponse> = state
        .slots
        .upcoming_48h()
        .into_iter()
        .map(SlotResponse::from)
        .collect();
    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn get_slot(
    State(state): State<Arc<ConsultationCellState>>,
    Path(slot_id): Path<Uuid>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let slot = state.slots.get_slot(slot_id)?;
    Ok(Json(json!(SlotResponse::from(slot))))
}

#[axum::debug_handler]
pub async fn cancel_slot(
    State(state): State<Arc<ConsultationCellState>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    user.require_staff()?;

    state.slots.cancel_slot(slot_id, auth.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn complete_slot(
    State(state): State<Arc<ConsultationCellState>>,
    Path(slot_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    user.require_staff()?;

    state.slots.complete_slot(slot_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// BOOKINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<ConsultationCellState>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = user.require_patient()?;

    let booking = state
        .booking
        .book_slot(slot_id, patient_id, request, auth.token())
        .await?;
    Ok((StatusCode::CREATED, Json(json!(booking))))
}

#[axum::debug_handler]
pub async fn my_bookings(
    State(state): State<Arc<ConsultationCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.require_patient()?;

    let bookings = state.booking.list_patient_bookings(patient_id);
    Ok(Json(json!(bookings)))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<ConsultationCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking = state.booking.get_booking(booking_id)?;
    if !user.can_access_patient(booking.patient_id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this booking".to_string(),
        ));
    }
    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<ConsultationCellState>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let patient_id = user.require_patient()?;

    state
        .booking
        .cancel_booking(booking_id, patient_id, auth.token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn check_in(
    State(state): State<Arc<ConsultationCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let patient_id = user.require_patient()?;

    state.booking.check_in(booking_id, patient_id, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}

/// Staff scans the code on the patient's booking to confirm attendance.
#[axum::debug_handler]
pub async fn confirm_attendance(
    State(state): State<Arc<ConsultationCellState>>,
    Query(query): Query<ConfirmAttendanceQuery>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    user.require_staff()?;

    state.booking.confirm_attendance(&query.code, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}
