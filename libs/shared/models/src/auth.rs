use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Staff roles of a hospital tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    HospitalAdmin,
    Reception,
    Doctor,
    Accountant,
    SuperAdmin,
}

impl StaffRole {
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "hospital_admin" => Some(StaffRole::HospitalAdmin),
            "reception" => Some(StaffRole::Reception),
            "doctor" => Some(StaffRole::Doctor),
            "accountant" => Some(StaffRole::Accountant),
            "super_admin" => Some(StaffRole::SuperAdmin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Tenant the user works for, from `app_metadata.hospital_id`.
    pub hospital_id: Option<Uuid>,
    /// Set when the user is a doctor, from `app_metadata.doctor_id`.
    pub doctor_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn staff_role(&self) -> Option<StaffRole> {
        self.role.as_deref().and_then(StaffRole::parse)
    }

    pub fn is_doctor(&self) -> bool {
        self.doctor_id.is_some() || self.staff_role() == Some(StaffRole::Doctor)
    }
}

/// Reads a UUID field out of the `app_metadata` claim.
pub fn metadata_uuid(app_metadata: Option<&serde_json::Value>, key: &str) -> Option<Uuid> {
    app_metadata
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}
