use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

/// Fixed exchange rate: 1 point = 5.00 currency units.
pub const POINT_VALUE: Decimal = dec!(5.00);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Purchase,
    ConsultationUse,
    BookingCancelRefund,
    ConsultationCancelRefund,
}

/// One immutable entry in a patient's points ledger. Transactions are only
/// ever appended; the balance is the sum of `in` minus `out` points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsTransaction {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub direction: TransactionDirection,
    pub source: TransactionSource,
    /// Currency amount, set only for purchases.
    pub amount_paid: Option<Decimal>,
    pub points: Decimal,
    pub description: String,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPatientRequest {
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasePointsRequest {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductPointsRequest {
    pub points: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPointsRequest {
    pub points: Decimal,
    pub reason: String,
    pub source: TransactionSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceAndHistoryResponse {
    pub balance: Decimal,
    pub transactions: Vec<PointsTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsBalanceResponse {
    pub patient_id: Uuid,
    pub balance: Decimal,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("Patient with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Insufficient points balance: current {balance}, requested {requested}")]
    InsufficientBalance { balance: Decimal, requested: Decimal },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
            LedgerError::DuplicateEmail(_) => AppError::Conflict(err.to_string()),
            LedgerError::InsufficientBalance { .. } => AppError::Conflict(err.to_string()),
            LedgerError::InvalidAmount(_) => AppError::ValidationError(err.to_string()),
        }
    }
}
