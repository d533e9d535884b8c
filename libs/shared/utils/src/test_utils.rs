use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub patient_service_url: String,
    pub settlement_timeout_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            patient_service_url: "http://localhost:3000/patients".to_string(),
            settlement_timeout_secs: 2,
        }
    }
}

impl TestConfig {
    pub fn with_patient_service_url(url: &str) -> Self {
        Self {
            patient_service_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            patient_service_url: self.patient_service_url.clone(),
            settlement_timeout_secs: self.settlement_timeout_secs,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub patient_id: Option<Uuid>,
}

impl TestUser {
    pub fn patient(patient_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "patient@example.com".to_string(),
            role: "patient".to_string(),
            patient_id: Some(patient_id),
        }
    }

    pub fn staff(email: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: "staff".to_string(),
            patient_id: None,
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            patient_id: self.patient_id,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "patient_id": user.patient_id,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned ledger-service bodies for wiremock-backed settlement tests.
pub struct MockLedgerResponses;

impl MockLedgerResponses {
    pub fn balance_and_history(balance: &str) -> serde_json::Value {
        json!({
            "balance": balance,
            "transactions": []
        })
    }

    pub fn patient_response(patient_id: Uuid) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": "Test Patient",
            "email": "patient@example.com",
            "registered_at": "2024-01-01T00:00:00Z",
            "active": true
        })
    }

    pub fn error_response(code: &str, message: &str) -> serde_json::Value {
        json!({
            "code": code,
            "message": message
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::validate_token;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert!(!app_config.jwt_secret.is_empty());
        assert!(app_config.is_configured());
    }

    #[test]
    fn test_jwt_token_round_trip() {
        let patient_id = Uuid::new_v4();
        let user = TestUser::patient(patient_id);
        let config = TestConfig::default();

        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));
        let validated = validate_token(&token, &config.jwt_secret).unwrap();

        assert_eq!(validated.id, user.id);
        assert_eq!(validated.role.as_deref(), Some("patient"));
        assert_eq!(validated.patient_id, Some(patient_id));
    }

    #[test]
    fn test_expired_token_rejected() {
        let user = TestUser::staff("staff@example.com");
        let config = TestConfig::default();

        let token = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);
        assert!(validate_token(&token, &config.jwt_secret).is_err());
    }

    #[test]
    fn test_bad_signature_rejected() {
        let user = TestUser::staff("staff@example.com");
        let config = TestConfig::default();

        let token = JwtTestUtils::create_invalid_signature_token(&user);
        assert!(validate_token(&token, &config.jwt_secret).is_err());
    }
}
