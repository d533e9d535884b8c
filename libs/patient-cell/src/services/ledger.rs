use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    BalanceAndHistoryResponse, LedgerError, Patient, RegisterPatientRequest, TransactionSource,
    POINT_VALUE,
};
use crate::store::LedgerStore;

pub struct LedgerService {
    store: LedgerStore,
}

impl LedgerService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    pub fn register_patient(&self, request: RegisterPatientRequest) -> Result<Patient, LedgerError> {
        if request.full_name.trim().is_empty() {
            return Err(LedgerError::InvalidAmount("Patient name is required".to_string()));
        }
        if request.email.trim().is_empty() || !request.email.contains('@') {
            return Err(LedgerError::InvalidAmount("A valid email is required".to_string()));
        }

        let patient = Patient {
            id: Uuid::new_v4(),
            full_name: request.full_name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            registered_at: Utc::now(),
            active: true,
        };

        let patient = self.store.insert_patient(patient)?;
        info!("Registered patient {} ({})", patient.id, patient.email);
        Ok(patient)
    }

    pub fn get_patient(&self, patient_id: Uuid) -> Result<Patient, LedgerError> {
        self.store.get_patient(patient_id)
    }

    /// Convert a currency amount into points at the fixed rate, floored to
    /// two decimal places. Purchases that floor to zero points are rejected.
    pub fn purchase_points(
        &self,
        patient_id: Uuid,
        amount: Decimal,
    ) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(
                "Purchase amount must be positive".to_string(),
            ));
        }

        let points = (amount / POINT_VALUE).round_dp_with_strategy(2, RoundingStrategy::ToZero);
        if points <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "Amount too small to purchase points; minimum is {}",
                POINT_VALUE
            )));
        }

        self.store.get_patient(patient_id)?;

        let balance = self.store.append_credit(
            patient_id,
            points,
            TransactionSource::Purchase,
            Some(amount),
            format!("POINTS PURCHASE - amount: {} | points: {}", amount, points),
        )?;

        info!(
            "Patient {} purchased {} points for {} (balance now {})",
            patient_id, points, amount, balance
        );
        Ok(balance)
    }

    pub fn deduct_points(
        &self,
        patient_id: Uuid,
        points: Decimal,
        reason: &str,
    ) -> Result<Decimal, LedgerError> {
        if points <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(
                "Points to deduct must be positive".to_string(),
            ));
        }

        let balance = self.store.append_debit(
            patient_id,
            points,
            TransactionSource::ConsultationUse,
            reason.to_string(),
        )?;

        info!(
            "Deducted {} points from patient {} (balance now {})",
            points, patient_id, balance
        );
        Ok(balance)
    }

    pub fn add_points(
        &self,
        patient_id: Uuid,
        points: Decimal,
        reason: &str,
        source: TransactionSource,
    ) -> Result<Decimal, LedgerError> {
        if points <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(
                "Points to add must be positive".to_string(),
            ));
        }

        let balance =
            self.store
                .append_credit(patient_id, points, source, None, reason.to_string())?;

        info!(
            "Added {} points to patient {} (balance now {})",
            points, patient_id, balance
        );
        Ok(balance)
    }

    pub fn balance_and_history(
        &self,
        patient_id: Uuid,
    ) -> Result<BalanceAndHistoryResponse, LedgerError> {
        debug!("Fetching balance and history for patient {}", patient_id);
        let balance = self.store.balance(patient_id)?;
        let transactions = self.store.history(patient_id)?;
        Ok(BalanceAndHistoryResponse {
            balance,
            transactions,
        })
    }
}
