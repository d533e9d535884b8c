//! HTTP client for the points ledger. Every call carries the caller's bearer
//! token and a bounded timeout so a stuck ledger cannot hang a booking
//! request indefinitely.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::SettlementError;

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SettlementService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SettlementService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.patient_service_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.settlement_timeout_secs),
        }
    }

    /// Current points balance of a patient.
    pub async fn fetch_balance(
        &self,
        patient_id: Uuid,
        token: &str,
    ) -> Result<Decimal, SettlementError> {
        let url = format!("{}/{}/balance-and-history", self.base_url, patient_id);
        debug!(%patient_id, "Fetching points balance");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SettlementError::Communication(e.to_string()))?;

        let response = Self::check_status(response).await?;
        let body: BalanceResponse = response
            .json()
            .await
            .map_err(|e| SettlementError::Communication(e.to_string()))?;
        Ok(body.balance)
    }

    /// Deduct points from a patient's balance. The ledger rejects the call
    /// when the balance does not cover it.
    pub async fn deduct_points(
        &self,
        patient_id: Uuid,
        points: Decimal,
        reason: &str,
        token: &str,
    ) -> Result<(), SettlementError> {
        let url = format!("{}/{}/points/deduct", self.base_url, patient_id);
        debug!(%patient_id, %points, "Deducting points");

        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .json(&json!({ "points": points, "reason": reason }))
            .send()
            .await
            .map_err(|e| SettlementError::Communication(e.to_string()))?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Credit points back to a patient, e.g. on cancellation.
    pub async fn add_points(
        &self,
        patient_id: Uuid,
        points: Decimal,
        reason: &str,
        source: &str,
        token: &str,
    ) -> Result<(), SettlementError> {
        let url = format!("{}/{}/points/add", self.base_url, patient_id);
        debug!(%patient_id, %points, source, "Crediting points");

        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .json(&json!({ "points": points, "reason": reason, "source": source }))
            .send()
            .await
            .map_err(|e| SettlementError::Communication(e.to_string()))?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SettlementError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status.as_u16() {
            404 => Err(SettlementError::PatientNotFound),
            401 | 403 => Err(SettlementError::Unauthorized),
            409 | 400 => {
                let message = response
                    .json::<ErrorBody>()
                    .await
                    .ok()
                    .and_then(|b| b.message)
                    .unwrap_or_else(|| format!("ledger returned {}", status));
                Err(SettlementError::Rejected(message))
            }
            _ => Err(SettlementError::Communication(format!(
                "ledger returned {}",
                status
            ))),
        }
    }
}
