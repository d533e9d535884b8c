use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared_store::Store;

use crate::models::{
    LedgerError, Patient, PointsTransaction, TransactionDirection, TransactionSource,
};

#[derive(Debug, Default)]
pub struct LedgerState {
    patients: HashMap<Uuid, Patient>,
    transactions: Vec<PointsTransaction>,
}

/// Append-only points ledger. Balance checks and appends for a patient run
/// inside one write closure, so concurrent deducts serialize on the balance
/// computation instead of racing a stale read.
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    state: Store<LedgerState>,
}

fn balance_of(state: &LedgerState, patient_id: Uuid) -> Decimal {
    state
        .transactions
        .iter()
        .filter(|t| t.patient_id == patient_id)
        .fold(Decimal::ZERO, |acc, t| match t.direction {
            TransactionDirection::In => acc + t.points,
            TransactionDirection::Out => acc - t.points,
        })
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_patient(&self, patient: Patient) -> Result<Patient, LedgerError> {
        self.state.write(|state| {
            if state.patients.values().any(|p| p.email == patient.email) {
                return Err(LedgerError::DuplicateEmail(patient.email.clone()));
            }
            state.patients.insert(patient.id, patient.clone());
            Ok(patient)
        })
    }

    pub fn get_patient(&self, patient_id: Uuid) -> Result<Patient, LedgerError> {
        self.state.read(|state| {
            state
                .patients
                .get(&patient_id)
                .cloned()
                .ok_or(LedgerError::PatientNotFound)
        })
    }

    /// Current balance, derived from the full transaction history.
    pub fn balance(&self, patient_id: Uuid) -> Result<Decimal, LedgerError> {
        self.state.read(|state| {
            if !state.patients.contains_key(&patient_id) {
                return Err(LedgerError::PatientNotFound);
            }
            Ok(balance_of(state, patient_id))
        })
    }

    /// Transaction history, most recent first.
    pub fn history(&self, patient_id: Uuid) -> Result<Vec<PointsTransaction>, LedgerError> {
        self.state.read(|state| {
            if !state.patients.contains_key(&patient_id) {
                return Err(LedgerError::PatientNotFound);
            }
            let mut history: Vec<PointsTransaction> = state
                .transactions
                .iter()
                .filter(|t| t.patient_id == patient_id)
                .cloned()
                .collect();
            history.reverse();
            Ok(history)
        })
    }

    /// Append an `in` transaction and return the new balance.
    pub fn append_credit(
        &self,
        patient_id: Uuid,
        points: Decimal,
        source: TransactionSource,
        amount_paid: Option<Decimal>,
        description: String,
    ) -> Result<Decimal, LedgerError> {
        self.state.write(|state| {
            if !state.patients.contains_key(&patient_id) {
                return Err(LedgerError::PatientNotFound);
            }
            state.transactions.push(PointsTransaction {
                id: Uuid::new_v4(),
                patient_id,
                occurred_at: Utc::now(),
                direction: TransactionDirection::In,
                source,
                amount_paid,
                points,
                description,
            });
            Ok(balance_of(state, patient_id))
        })
    }

    /// Append an `out` transaction, failing inside the same critical section
    /// when the derived balance does not cover the requested points.
    pub fn append_debit(
        &self,
        patient_id: Uuid,
        points: Decimal,
        source: TransactionSource,
        description: String,
    ) -> Result<Decimal, LedgerError> {
        self.state.write(|state| {
            if !state.patients.contains_key(&patient_id) {
                return Err(LedgerError::PatientNotFound);
            }
            let balance = balance_of(state, patient_id);
            if balance < points {
                return Err(LedgerError::InsufficientBalance {
                    balance,
                    requested: points,
                });
            }
            state.transactions.push(PointsTransaction {
                id: Uuid::new_v4(),
                patient_id,
                occurred_at: Utc::now(),
                direction: TransactionDirection::Out,
                source,
                amount_paid: None,
                points,
                description,
            });
            Ok(balance - points)
        })
    }
}
