use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{SchedulingDefaults, UpdateAvailabilityRequest, WeeklySchedule};
use crate::services::profile::DoctorProfileService;

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = DoctorProfileService::new(&state);
    let defaults = SchedulingDefaults::default();

    let doctor = service
        .find_doctor(doctor_id, token)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    let schedule = doctor.weekly_schedule(&defaults);

    Ok(Json(json!({
        "doctor_id": doctor.id,
        "availability": schedule.to_json_value(),
        "slot_minutes": doctor.slot_granularity(&defaults),
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Only the owning provider or an administrator may overwrite a schedule.
    let is_owner = user.has_role("doctor") && doctor_id.to_string() == user.id;
    if !is_owner && !user.has_role("admin") {
        return Err(AppError::Auth(
            "Not authorized to update availability for this doctor".to_string(),
        ));
    }

    let schedule = WeeklySchedule::from_days(request.availability);
    schedule.validate().map_err(AppError::ValidationError)?;

    let service = DoctorProfileService::new(&state);
    let updated = service
        .update_schedule(doctor_id, &schedule, token)
        .await
        .map_err(|e| {
            if e.to_string().contains("not found") {
                AppError::NotFound("Doctor not found".to_string())
            } else {
                AppError::Internal(e.to_string())
            }
        })?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": updated.id,
        "availability": updated
            .availability
            .as_deref()
            .map(WeeklySchedule::from_json)
            .unwrap_or_else(WeeklySchedule::standard_office_hours)
            .to_json_value(),
        "message": "Availability updated successfully"
    })))
}
