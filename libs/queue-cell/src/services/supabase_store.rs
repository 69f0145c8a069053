use async_trait::async_trait;
use chrono::NaiveTime;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::{
    Appointment, AppointmentFilter, AppointmentStatus, AppointmentStore, AuditLogEntry, Doctor, Hospital,
    QueueError, QueueScope,
};

const APPOINTMENTS: &str = "/rest/v1/appointments";
const AUDIT_LOG: &str = "/rest/v1/appointment_audit_log";
const DOCTORS: &str = "/rest/v1/doctors";
const HOSPITALS: &str = "/rest/v1/hospitals";

/// `AppointmentStore` over the Supabase PostgREST API. Built per request so
/// the caller's token reaches the database; `None` uses the anon key.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig, auth_token: Option<String>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token,
        }
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, QueueError> {
        self.supabase
            .request::<Vec<T>>(Method::GET, path, self.token(), None)
            .await
            .map_err(store_error)
    }

    async fn fetch_one<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, QueueError> {
        Ok(self.fetch::<T>(path).await?.into_iter().next())
    }

    async fn write(&self, method: Method, path: &str, body: Value) -> Result<Vec<Value>, QueueError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.supabase
            .request_with_headers::<Vec<Value>>(method, path, self.token(), Some(body), Some(headers))
            .await
            .map_err(store_error)
    }
}

fn store_error(err: anyhow::Error) -> QueueError {
    match err.downcast_ref::<SupabaseError>() {
        Some(SupabaseError::Conflict(body)) => QueueError::Conflict(body.clone()),
        _ => QueueError::StoreError(err.to_string()),
    }
}

fn status_filter(statuses: &[AppointmentStatus]) -> String {
    match statuses {
        [] => String::new(),
        [single] => format!("&status=eq.{}", single.code()),
        many => {
            let codes: Vec<String> = many.iter().map(|s| s.code().to_string()).collect();
            format!("&status=in.({})", codes.join(","))
        }
    }
}

fn scope_query(scope: &QueueScope) -> String {
    format!(
        "hospital_id=eq.{}&doctor_id=eq.{}&appointment_on=eq.{}",
        scope.hospital_id,
        scope.doctor_id,
        scope.appointment_on.format("%Y-%m-%d")
    )
}

fn filter_query(filter: &AppointmentFilter) -> String {
    let mut parts = vec![format!("hospital_id=eq.{}", filter.hospital_id)];

    if let Some(date) = filter.appointment_on {
        parts.push(format!("appointment_on=eq.{}", date.format("%Y-%m-%d")));
    }
    if let Some(doctor_id) = filter.doctor_id {
        parts.push(format!("doctor_id=eq.{}", doctor_id));
    }
    if let Some(status) = filter.status {
        parts.push(format!("status=eq.{}", status.code()));
    }
    if let Some(name) = filter.patient_name.as_deref().filter(|n| !n.is_empty()) {
        parts.push(format!("patient_name=ilike.*{}*", urlencoding::encode(name)));
    }
    parts.push("order=queue_position.asc".to_string());

    parts.join("&")
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn count_appointments(
        &self,
        scope: &QueueScope,
        statuses: &[AppointmentStatus],
    ) -> Result<u32, QueueError> {
        let path = format!("{}?select=id&{}{}", APPOINTMENTS, scope_query(scope), status_filter(statuses));
        let count = self.supabase.count(&path, self.token()).await.map_err(store_error)?;

        debug!("Counted {} appointments for {:?}", count, statuses);
        u32::try_from(count).map_err(|_| QueueError::StoreError(format!("appointment count {} out of range", count)))
    }

    async fn get_appointment(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, QueueError> {
        let path = format!("{}?id=eq.{}&hospital_id=eq.{}", APPOINTMENTS, appointment_id, hospital_id);
        self.fetch_one(&path).await
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, QueueError> {
        let rows = self
            .write(Method::POST, APPOINTMENTS, serde_json::to_value(appointment)?)
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::StoreError("Insert returned no appointment".to_string()))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn update_appointment(&self, appointment: &Appointment) -> Result<(), QueueError> {
        let path = format!(
            "{}?id=eq.{}&hospital_id=eq.{}",
            APPOINTMENTS, appointment.id, appointment.hospital_id
        );
        let body = json!({
            "status": appointment.status,
            "queue_position": appointment.queue_position,
            "eta": appointment.eta,
            "called": appointment.called,
            "queue_start_time": appointment.queue_start_time,
            "completed_at": appointment.completed_at,
        });

        let rows = self.write(Method::PATCH, &path, body).await?;
        if rows.is_empty() {
            return Err(QueueError::AppointmentNotFound(appointment.id));
        }
        Ok(())
    }

    async fn set_eta(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
        eta: Option<NaiveTime>,
    ) -> Result<(), QueueError> {
        let path = format!("{}?id=eq.{}&hospital_id=eq.{}", APPOINTMENTS, appointment_id, hospital_id);

        let rows = self.write(Method::PATCH, &path, json!({ "eta": eta })).await?;
        if rows.is_empty() {
            return Err(QueueError::AppointmentNotFound(appointment_id));
        }
        Ok(())
    }

    async fn mark_called(&self, hospital_id: Uuid, appointment_id: Uuid) -> Result<Appointment, QueueError> {
        let path = format!("{}?id=eq.{}&hospital_id=eq.{}", APPOINTMENTS, appointment_id, hospital_id);

        let row = self
            .write(Method::PATCH, &path, json!({ "called": true }))
            .await?
            .into_iter()
            .next()
            .ok_or(QueueError::AppointmentNotFound(appointment_id))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, QueueError> {
        let path = format!("{}?{}", APPOINTMENTS, filter_query(filter));
        self.fetch(&path).await
    }

    async fn append_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), QueueError> {
        self.write(Method::POST, AUDIT_LOG, serde_json::to_value(entry)?).await?;
        Ok(())
    }

    async fn list_audit_entries(
        &self,
        hospital_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, QueueError> {
        let path = format!(
            "{}?appointment_id=eq.{}&hospital_id=eq.{}&order=created_at.asc",
            AUDIT_LOG, appointment_id, hospital_id
        );
        self.fetch(&path).await
    }

    async fn get_doctor(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<Option<Doctor>, QueueError> {
        let path = format!("{}?id=eq.{}&hospital_id=eq.{}", DOCTORS, doctor_id, hospital_id);
        self.fetch_one(&path).await
    }

    async fn list_doctors(&self, hospital_id: Uuid) -> Result<Vec<Doctor>, QueueError> {
        let path = format!(
            "{}?hospital_id=eq.{}&is_active=eq.true&order=doctor_name.asc",
            DOCTORS, hospital_id
        );
        self.fetch(&path).await
    }

    async fn get_hospital(&self, hospital_id: Uuid) -> Result<Option<Hospital>, QueueError> {
        let path = format!("{}?id=eq.{}", HOSPITALS, hospital_id);
        self.fetch_one(&path).await
    }

    async fn find_hospital_by_slug(&self, slug: &str) -> Result<Option<Hospital>, QueueError> {
        let path = format!("{}?slug=eq.{}", HOSPITALS, urlencoding::encode(slug));
        self.fetch_one(&path).await
    }
}
