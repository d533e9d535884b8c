use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub const ROLE_PATIENT: &str = "patient";
pub const ROLE_STAFF: &str = "staff";

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub patient_id: Option<Uuid>,
}

/// The identity assertion attached to every authenticated request.
/// Role is a plain discriminant ("patient" / "staff"); patient tokens
/// additionally carry the id of the patient record they own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub patient_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_staff(&self) -> bool {
        self.role.as_deref() == Some(ROLE_STAFF)
    }

    pub fn is_patient(&self) -> bool {
        self.role.as_deref() == Some(ROLE_PATIENT)
    }

    /// Patient id carried by the token, or Forbidden for non-patient tokens.
    pub fn require_patient(&self) -> Result<Uuid, AppError> {
        self.patient_id
            .filter(|_| self.is_patient())
            .ok_or_else(|| AppError::Forbidden("Patient credentials required".to_string()))
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Staff credentials required".to_string()))
        }
    }

    /// True when the token belongs to the given patient or to staff.
    pub fn can_access_patient(&self, patient_id: Uuid) -> bool {
        self.is_staff() || self.patient_id == Some(patient_id)
    }
}
