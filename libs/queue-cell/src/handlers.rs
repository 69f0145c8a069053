use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_hospital;

use crate::{
    AppointmentStatus, DashboardQuery, DashboardViewer, EtaQuery, QueueService, RegisterAppointmentRequest,
    RescheduleRequest, SupabaseAppointmentStore, SystemClock, WhatsAppNotifier,
};

/// Service bound to the caller's token. `None` reads through the anon key.
fn queue_service(config: &AppConfig, token: Option<&str>) -> QueueService {
    let store = SupabaseAppointmentStore::new(config, token.map(str::to_string));
    let service = QueueService::new(Arc::new(store), Arc::new(SystemClock));

    if config.is_whatsapp_configured() {
        service.with_notifier(Arc::new(WhatsAppNotifier::new(config)))
    } else {
        service
    }
}

#[axum::debug_handler]
pub async fn register_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RegisterAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;

    let appointment = queue_service(&state, Some(auth.token()))
        .register_appointment(hospital_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": format!("Registered with token {}", appointment.token_num)
    })))
}

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;
    let doctor_id = if user.is_doctor() {
        Some(user.doctor_id.ok_or_else(|| {
            AppError::Forbidden("Doctor account is not linked to a doctor profile".to_string())
        })?)
    } else {
        None
    };
    let viewer = DashboardViewer { hospital_id, doctor_id };

    let rows = queue_service(&state, Some(auth.token()))
        .dashboard(viewer, &query)
        .await?;

    Ok(Json(json!({
        "appointments": rows,
        "total": rows.len()
    })))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((appointment_id, status_code)): Path<(Uuid, i16)>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;
    let new_status = AppointmentStatus::from_code(status_code)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown status code {}", status_code)))?;

    let update = queue_service(&state, Some(auth.token()))
        .update_status(hospital_id, appointment_id, new_status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": update.appointment,
        "audit": update.audit,
        "message": format!("Appointment is now {}", new_status.label())
    })))
}

#[axum::debug_handler]
pub async fn call_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;

    let appointment = queue_service(&state, Some(auth.token()))
        .call_patient(hospital_id, appointment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_audit_history(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;

    let entries = queue_service(&state, Some(auth.token()))
        .audit_history(hospital_id, appointment_id)
        .await?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "entries": entries
    })))
}

#[axum::debug_handler]
pub async fn preview_eta(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<EtaQuery>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;

    let preview = queue_service(&state, Some(auth.token()))
        .preview_eta(hospital_id, query.doctor_id, query.date.as_deref())
        .await?;

    Ok(Json(json!(preview)))
}

#[axum::debug_handler]
pub async fn predict_eta(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<EtaQuery>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;

    let prediction = queue_service(&state, Some(auth.token()))
        .predict_eta(hospital_id, query.doctor_id, query.date.as_deref())
        .await?;

    Ok(Json(json!(prediction)))
}

#[axum::debug_handler]
pub async fn reschedule_queue(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;

    let summary = queue_service(&state, Some(auth.token()))
        .reschedule(hospital_id, &request)
        .await?;

    Ok(Json(json!({
        "success": summary.failed == 0,
        "summary": summary
    })))
}

#[axum::debug_handler]
pub async fn get_staff_display(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = require_hospital(&user)?;

    let display = queue_service(&state, Some(auth.token()))
        .display_for_hospital(hospital_id)
        .await?;

    Ok(Json(json!(display)))
}

/// Waiting-room screen; no login.
#[axum::debug_handler]
pub async fn get_public_display(
    State(state): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    debug!("Public queue display requested for {}", slug);

    let display = queue_service(&state, None).display_for_slug(&slug).await?;

    Ok(Json(json!(display)))
}
