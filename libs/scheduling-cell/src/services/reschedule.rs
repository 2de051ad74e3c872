use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use provider_cell::models::SchedulingDefaults;
use provider_cell::services::profile::DoctorProfileService;
use provider_cell::services::schedule::{generate_slots, slot_boundaries};
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    parse_wall_clock, Appointment, RescheduleAppointmentRequest, ScheduleChange, SchedulingError,
};
use crate::services::conflict::{available_slots, ConflictService};

/// Moves an existing appointment to a new slot while preserving its identity
/// and history. The record keeps its id and status; the displaced timing is
/// appended to `schedule_history`.
pub struct RescheduleService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictService,
    profile_service: DoctorProfileService,
    defaults: SchedulingDefaults,
}

impl RescheduleService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflict_service: ConflictService::new(Arc::clone(&supabase)),
            profile_service: DoctorProfileService::new(config),
            defaults: SchedulingDefaults::default(),
            supabase,
        }
    }

    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.fetch_appointment(appointment_id, auth_token).await?;

        if current.status.is_terminal() {
            return Err(SchedulingError::InvalidTransition(current.status));
        }

        // Identity is preserved: the appointment cannot change hands.
        if let Some(doctor_id) = request.doctor_id {
            if doctor_id != current.doctor_id {
                return Err(SchedulingError::ValidationError(
                    "Rescheduling cannot move an appointment to a different doctor".to_string(),
                ));
            }
        }

        let new_start = parse_wall_clock(&request.start_time)?;

        let doctor = self
            .profile_service
            .find_doctor(current.doctor_id, auth_token)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?
            .ok_or(SchedulingError::NotFound("Doctor"))?;

        let schedule = doctor.weekly_schedule(&self.defaults);
        let granularity = doctor.slot_granularity(&self.defaults);

        // The appointment's own slot stays selectable, so moving to the same
        // time (or an adjacent overlapping one) succeeds.
        let candidates = generate_slots(&schedule, request.date, granularity);
        let booked = self
            .conflict_service
            .booked_appointments(current.doctor_id, request.date, auth_token)
            .await?;
        let open = available_slots(candidates, &booked, Some(appointment_id));

        if !open.iter().any(|slot| slot.start == new_start) {
            return Err(SchedulingError::SlotUnavailable);
        }

        // The stored end time is the next boundary of the full sequence: a
        // reschedule always snaps to the provider's granularity, whatever
        // end time the client supplied.
        let new_end = slot_boundaries(&schedule, request.date, granularity)
            .into_iter()
            .find(|boundary| *boundary > new_start)
            .ok_or(SchedulingError::SlotUnavailable)?;

        let mut history = current.schedule_history.clone();
        history.push(ScheduleChange {
            date: current.date,
            start_time: current.start_time,
            end_time: current.end_time,
            changed_at: Utc::now(),
        });

        let mut update_data = json!({
            "date": request.date,
            "start_time": new_start.format("%H:%M:%S").to_string(),
            "end_time": new_end.format("%H:%M:%S").to_string(),
            "schedule_history": history,
            "updated_at": Utc::now().to_rfc3339(),
        });
        if let Some(notes) = &request.notes {
            update_data["notes"] = json!(notes);
        }

        // Status is left as-is: a confirmed appointment stays confirmed
        // after a move. The PATCH is filtered on non-terminal status and the
        // slot unique index still guards the target, so concurrent
        // cancellations and competing bookings both fail cleanly.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.(pending,confirmed)",
            appointment_id
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(detail) => {
                    warn!(
                        "Lost reschedule race for appointment {} to {} {}: {}",
                        appointment_id, request.date, new_start, detail
                    );
                    SchedulingError::SlotUnavailable
                }
                other => SchedulingError::DatabaseError(other.to_string()),
            })?;

        match result.into_iter().next() {
            Some(row) => {
                let updated: Appointment = serde_json::from_value(row).map_err(|e| {
                    SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e))
                })?;
                info!(
                    "Appointment {} rescheduled to {} {}",
                    updated.id, updated.date, updated.start_time
                );
                Ok(updated)
            }
            None => {
                // The record went terminal between the read and the write.
                let fresh = self.fetch_appointment(appointment_id, auth_token).await?;
                Err(SchedulingError::InvalidTransition(fresh.status))
            }
        }
    }

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or(SchedulingError::NotFound("Appointment"))?;
        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }
}
