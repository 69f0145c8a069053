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
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub whatsapp_api_url: String,
    pub whatsapp_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            whatsapp_api_url: String::new(),
            whatsapp_api_key: String::new(),
        }
    }
}

impl TestConfig {
    /// Points the Supabase client at a mock server.
    pub fn with_supabase_url(mut self, url: &str) -> Self {
        self.supabase_url = url.to_string();
        self
    }

    pub fn with_whatsapp(mut self, url: &str, key: &str) -> Self {
        self.whatsapp_api_url = url.to_string();
        self.whatsapp_api_key = key.to_string();
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            whatsapp_api_url: self.whatsapp_api_url.clone(),
            whatsapp_api_key: self.whatsapp_api_key.clone(),
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
    pub hospital_id: Uuid,
    pub doctor_id: Option<Uuid>,
}

impl TestUser {
    pub fn new(email: &str, role: &str, hospital_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            hospital_id,
            doctor_id: None,
        }
    }

    pub fn reception(hospital_id: Uuid) -> Self {
        Self::new("reception@example.com", "reception", hospital_id)
    }

    pub fn doctor(hospital_id: Uuid, doctor_id: Uuid) -> Self {
        let mut user = Self::new("doctor@example.com", "doctor", hospital_id);
        user.doctor_id = Some(doctor_id);
        user
    }

    pub fn admin(hospital_id: Uuid) -> Self {
        Self::new("admin@example.com", "hospital_admin", hospital_id)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            hospital_id: Some(self.hospital_id),
            doctor_id: self.doctor_id,
            metadata: None,
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
            "role": "authenticated",
            "app_metadata": {
                "role": user.role,
                "hospital_id": user.hospital_id,
                "doctor_id": user.doctor_id,
            },
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

/// PostgREST rows as the clinic tables return them.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn hospital_row(hospital_id: Uuid, slug: &str) -> serde_json::Value {
        json!({
            "id": hospital_id,
            "hospital_name": "City Care Clinic",
            "slug": slug
        })
    }

    pub fn doctor_row(doctor_id: Uuid, hospital_id: Uuid, name: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "hospital_id": hospital_id,
            "doctor_name": name,
            "consult_start_time": "18:00:00",
            "average_consult_minutes": 10,
            "is_active": true
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        hospital_id: Uuid,
        doctor_id: Uuid,
        status: i16,
        queue_position: i32,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "hospital_id": hospital_id,
            "doctor_id": doctor_id,
            "patient_id": Uuid::new_v4(),
            "patient_name": "Asha Rao",
            "mobile_num": "9876543210",
            "appointment_on": Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            "token_num": "A1B2",
            "queue_position": queue_position,
            "eta": "18:10:00",
            "status": status,
            "called": false,
            "queue_start_time": null,
            "completed_at": null,
            "created_at": "2024-01-01T00:00:00"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
