use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

/// Fixed exchange rate: 1 point = 5.00 currency units.
pub const POINT_VALUE: Decimal = dec!(5.00);
/// Seats per slot are bounded to keep a single consultation manageable.
pub const MAX_SEATS: u32 = 50;
pub const MAX_NOTES_LEN: usize = 500;
/// Check-in opens this many hours before the slot time.
pub const CHECKIN_WINDOW_HOURS: i64 = 48;

// ==============================================================================
// CORE MODELS
// ==============================================================================

/// A bookable consultation time with a finite number of seats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationSlot {
    pub id: Uuid,
    /// Sequential human-facing code, e.g. "CON001".
    pub code: String,
    pub scheduled_at: DateTime<Utc>,
    pub specialty: String,
    pub doctor_name: String,
    pub price: Decimal,
    pub total_seats: u32,
    pub occupied_seats: u32,
    pub status: SlotStatus,
    pub created_at: DateTime<Utc>,
}

impl ConsultationSlot {
    pub fn has_free_seats(&self) -> bool {
        self.occupied_seats < self.total_seats
    }

    pub fn free_seats(&self) -> u32 {
        self.total_seats.saturating_sub(self.occupied_seats)
    }

    /// occupied/total, 0 when the slot has no seats at all.
    pub fn occupancy_rate(&self) -> f64 {
        if self.total_seats == 0 {
            0.0
        } else {
            self.occupied_seats as f64 / self.total_seats as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Cancelled,
    Completed,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Cancelled => write!(f, "cancelled"),
            SlotStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One patient's reservation against a slot. Bookings are never deleted;
/// cancellation is a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Unique booking code handed to the patient, e.g. "AGD1672589123456-7".
    pub code: String,
    pub patient_id: Uuid,
    pub slot_id: Uuid,
    pub points_used: Decimal,
    /// slot price minus the points discount, floored at zero.
    pub amount_paid: Decimal,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Booking {
    /// A booking still counts against the slot while created or checked in.
    pub fn is_active(&self) -> bool {
        matches!(self.status, BookingStatus::Created | BookingStatus::CheckedIn)
    }

    pub fn can_cancel(&self) -> bool {
        self.is_active()
    }

    pub fn can_confirm(&self) -> bool {
        self.status == BookingStatus::CheckedIn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Created,
    CheckedIn,
    Attended,
    NoShow,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::NoShow | BookingStatus::Completed | BookingStatus::Cancelled
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Created => write!(f, "created"),
            BookingStatus::CheckedIn => write!(f, "checked_in"),
            BookingStatus::Attended => write!(f, "attended"),
            BookingStatus::NoShow => write!(f, "no_show"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub scheduled_at: DateTime<Utc>,
    pub specialty: String,
    pub doctor_name: String,
    pub price: Decimal,
    pub total_seats: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotSearchQuery {
    pub specialty: Option<String>,
    pub doctor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmAttendanceQuery {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    #[serde(default)]
    pub points_used: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotResponse {
    #[serde(flatten)]
    pub slot: ConsultationSlot,
    pub free_seats: u32,
    pub occupancy_rate: f64,
}

impl From<ConsultationSlot> for SlotResponse {
    fn from(slot: ConsultationSlot) -> Self {
        let free_seats = slot.free_seats();
        let occupancy_rate = slot.occupancy_rate();
        Self {
            slot,
            free_seats,
            occupancy_rate,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Failure modes of the cross-service settlement calls against the points
/// ledger. Everything that is not a typed rejection collapses into
/// `Communication`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettlementError {
    #[error("Patient not found in points ledger")]
    PatientNotFound,

    #[error("Settlement call was not authorized")]
    Unauthorized,

    #[error("Points ledger rejected the operation: {0}")]
    Rejected(String),

    #[error("Communication failure with points ledger: {0}")]
    Communication(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsultationError {
    #[error("Consultation slot not found")]
    SlotNotFound,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Consultation slot is not available: {0}")]
    SlotUnavailable(String),

    #[error("Consultation slot has no free seats")]
    NoSeatsAvailable,

    #[error("Patient already has an active booking for this slot")]
    DuplicateBooking,

    #[error("Insufficient points balance: current {balance}, requested {requested}")]
    InsufficientPoints { balance: Decimal, requested: Decimal },

    #[error("Occupied seat count would fall below zero")]
    SeatUnderflow,

    #[error("Check-in not allowed: {0}")]
    CheckinInvalid(String),

    #[error("Attendance confirmation not allowed: {0}")]
    ConfirmationInvalid(String),

    #[error("Cancellation not allowed: {0}")]
    CancellationInvalid(String),

    #[error("Booking belongs to another patient")]
    NotOwner,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        match &err {
            ConsultationError::SlotNotFound | ConsultationError::BookingNotFound => {
                AppError::NotFound(err.to_string())
            }
            ConsultationError::SlotUnavailable(_)
            | ConsultationError::NoSeatsAvailable
            | ConsultationError::DuplicateBooking
            | ConsultationError::InsufficientPoints { .. } => AppError::Conflict(err.to_string()),
            ConsultationError::CheckinInvalid(_)
            | ConsultationError::ConfirmationInvalid(_)
            | ConsultationError::CancellationInvalid(_) => AppError::InvalidState(err.to_string()),
            ConsultationError::NotOwner => AppError::Forbidden(err.to_string()),
            ConsultationError::Validation(msg) => AppError::ValidationError(msg.clone()),
            ConsultationError::SeatUnderflow => AppError::Internal(err.to_string()),
            ConsultationError::Settlement(settlement) => match settlement {
                SettlementError::PatientNotFound => AppError::NotFound(settlement.to_string()),
                SettlementError::Unauthorized => AppError::Auth(settlement.to_string()),
                SettlementError::Rejected(msg) => AppError::Conflict(msg.clone()),
                SettlementError::Communication(msg) => {
                    AppError::CommunicationFailure(msg.clone())
                }
            },
        }
    }
}
