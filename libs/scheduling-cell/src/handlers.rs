use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentListQuery, AvailableSlotsQuery, CreateAppointmentRequest, MeetingLinkRequest,
    RescheduleAppointmentRequest, SchedulingError, UpdateStatusRequest,
};
use crate::services::booking::BookingService;
use crate::services::lifecycle::LifecycleService;
use crate::services::reschedule::RescheduleService;

fn scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::NotFound(entity) => AppError::NotFound(format!("{} not found", entity)),
        SchedulingError::SlotUnavailable => {
            AppError::Conflict("Requested slot is no longer available".to_string())
        }
        SchedulingError::InvalidTransition(status) => {
            AppError::BadRequest(format!("Cannot transition appointment from status: {}", status))
        }
        SchedulingError::ValidationError(msg) => AppError::ValidationError(msg),
        SchedulingError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

// ==============================================================================
// SLOT DISCOVERY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AvailableSlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let slots = booking_service
        .available_slots_for(params.doctor, params.date, None, token)
        .await
        .map_err(scheduling_error)?;

    let available_slots: Vec<String> = slots
        .iter()
        .map(|slot| slot.start.format("%H:%M").to_string())
        .collect();

    Ok(Json(json!({ "availableSlots": available_slots })))
}

// ==============================================================================
// BOOKING AND RESCHEDULING
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Patients may only book for themselves; staff and doctors may book on
    // a patient's behalf.
    let is_self = request.patient_id.to_string() == user.id;
    if !is_self && !user.is_staff() && !user.has_role("doctor") {
        return Err(AppError::Auth(
            "Not authorized to create appointment for another patient".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .create_appointment(request, token)
        .await
        .map_err(scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment created successfully"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(scheduling_error)?;

    if !appointment.involves(&user.id) && !user.is_staff() {
        return Err(AppError::Auth(
            "Not authorized to reschedule this appointment".to_string(),
        ));
    }

    let reschedule_service = RescheduleService::new(&state);
    let rescheduled = reschedule_service
        .reschedule(appointment_id, request, token)
        .await
        .map_err(scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": rescheduled,
        "message": "Appointment rescheduled successfully"
    })))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);
    let lifecycle_service = LifecycleService::new();

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(scheduling_error)?;

    // Parties may act on their own appointments; staff on any.
    if !appointment.involves(&user.id) && !user.is_staff() {
        return Err(AppError::Auth(
            "Not authorized to update this appointment".to_string(),
        ));
    }

    let role = user.role.as_deref().unwrap_or("patient");
    if !lifecycle_service.role_may_trigger(role, &request.status) {
        return Err(AppError::Auth(format!(
            "Role {} may not set appointment status to {}",
            role, request.status
        )));
    }

    let updated = booking_service
        .update_status(appointment_id, request.status, token)
        .await
        .map_err(scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment status updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_meeting_link(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<MeetingLinkRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if request.meeting_link.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Meeting link is required".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(scheduling_error)?;

    // Only the appointment's own doctor manages its meeting link.
    let is_own_doctor =
        user.has_role("doctor") && appointment.doctor_id.to_string() == user.id;
    if !is_own_doctor {
        return Err(AppError::Auth(
            "Not authorized to update meeting link".to_string(),
        ));
    }

    let updated = booking_service
        .set_meeting_link(appointment_id, request.meeting_link.trim(), token)
        .await
        .map_err(scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Meeting link updated successfully"
    })))
}

// ==============================================================================
// READS AND ADMIN
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(scheduling_error)?;

    if !appointment.involves(&user.id) && !user.is_staff() {
        return Err(AppError::Auth(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn get_user_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_own = user_id.to_string() == user.id;
    if !is_own && !user.is_staff() && !user.has_role("doctor") {
        return Err(AppError::Auth(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);
    let appointments = booking_service
        .appointments_for_user(user_id, &params, token)
        .await
        .map_err(scheduling_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_staff() {
        return Err(AppError::Auth(
            "Not authorized to access this resource".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);
    let appointments = booking_service
        .list_appointments(&params, token)
        .await
        .map_err(scheduling_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.has_role("admin") {
        return Err(AppError::Auth(
            "Not authorized to delete appointments".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);
    booking_service
        .delete_appointment(appointment_id, token)
        .await
        .map_err(scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}
