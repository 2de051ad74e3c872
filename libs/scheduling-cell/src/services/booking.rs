use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use provider_cell::models::{SchedulingDefaults, Slot};
use provider_cell::services::profile::DoctorProfileService;
use provider_cell::services::schedule::generate_slots;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    parse_wall_clock, Appointment, AppointmentListQuery, AppointmentStatus,
    CreateAppointmentRequest, SchedulingError,
};
use crate::services::conflict::{available_slots, ConflictService};
use crate::services::lifecycle::{LifecycleService, TransitionOutcome};

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictService,
    lifecycle_service: LifecycleService,
    profile_service: DoctorProfileService,
    defaults: SchedulingDefaults,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflict_service: ConflictService::new(Arc::clone(&supabase)),
            lifecycle_service: LifecycleService::new(),
            profile_service: DoctorProfileService::new(config),
            defaults: SchedulingDefaults::default(),
            supabase,
        }
    }

    /// The currently bookable slots for one doctor and date: the generated
    /// candidates minus everything occupied by a non-terminal appointment.
    pub async fn available_slots_for(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Slot>, SchedulingError> {
        let doctor = self
            .profile_service
            .find_doctor(doctor_id, auth_token)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?
            .ok_or(SchedulingError::NotFound("Doctor"))?;

        let schedule = doctor.weekly_schedule(&self.defaults);
        let granularity = doctor.slot_granularity(&self.defaults);

        let candidates = generate_slots(&schedule, date, granularity);
        let booked = self
            .conflict_service
            .booked_appointments(doctor_id, date, auth_token)
            .await?;

        Ok(available_slots(candidates, &booked, exclude_appointment_id))
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking appointment for patient {} with doctor {}",
            request.patient_id, request.doctor_id
        );

        if request.reason.trim().is_empty() {
            return Err(SchedulingError::ValidationError(
                "A reason for the appointment is required".to_string(),
            ));
        }

        let start_time = parse_wall_clock(&request.start_time)?;
        let end_time = parse_wall_clock(&request.end_time)?;
        if start_time >= end_time {
            return Err(SchedulingError::ValidationError(
                "startTime must be before endTime".to_string(),
            ));
        }

        let doctor = self
            .profile_service
            .find_doctor(request.doctor_id, auth_token)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?
            .ok_or(SchedulingError::NotFound("Doctor"))?;

        if request.is_virtual && !doctor.telehealth_enabled {
            return Err(SchedulingError::ValidationError(
                "Selected doctor does not support telehealth appointments".to_string(),
            ));
        }

        self.verify_patient_exists(request.patient_id, auth_token).await?;

        // The requested interval must be one of the currently bookable slots.
        let schedule = doctor.weekly_schedule(&self.defaults);
        let granularity = doctor.slot_granularity(&self.defaults);
        let candidates = generate_slots(&schedule, request.date, granularity);
        let booked = self
            .conflict_service
            .booked_appointments(request.doctor_id, request.date, auth_token)
            .await?;
        let open = available_slots(candidates, &booked, None);

        let slot = open
            .iter()
            .find(|slot| slot.start == start_time)
            .copied()
            .ok_or(SchedulingError::SlotUnavailable)?;

        if end_time != slot.end {
            return Err(SchedulingError::ValidationError(format!(
                "endTime must align with the doctor's {}-minute slots",
                granularity
            )));
        }

        let appointment = self
            .insert_appointment(&request, start_time, end_time, auth_token)
            .await?;

        info!(
            "Appointment {} booked for doctor {} at {} {}",
            appointment.id, appointment.doctor_id, appointment.date, appointment.start_time
        );
        Ok(appointment)
    }

    pub async fn get_appointment(
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

    /// Appointments where the given user is a party, on either side.
    pub async fn appointments_for_user(
        &self,
        user_id: Uuid,
        query: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut parts = vec![format!(
            "or=(patient_id.eq.{},doctor_id.eq.{})",
            user_id, user_id
        )];
        Self::push_filters(&mut parts, query);

        self.query_appointments(&parts, auth_token).await
    }

    /// Unscoped listing for staff.
    pub async fn list_appointments(
        &self,
        query: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut parts = Vec::new();
        if let Some(doctor) = query.doctor {
            parts.push(format!("doctor_id=eq.{}", doctor));
        }
        if let Some(patient) = query.patient {
            parts.push(format!("patient_id=eq.{}", patient));
        }
        Self::push_filters(&mut parts, query);

        self.query_appointments(&parts, auth_token).await
    }

    /// Apply a lifecycle transition. The update is a compare-and-swap on the
    /// status the caller saw, so two racing transitions cannot both win.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        match self
            .lifecycle_service
            .validate_transition(&current.status, &new_status)?
        {
            TransitionOutcome::NoOp => {
                debug!(
                    "Duplicate {} trigger on appointment {}, leaving record untouched",
                    new_status, appointment_id
                );
                return Ok(current);
            }
            TransitionOutcome::Apply => {}
        }

        if new_status == AppointmentStatus::Completed {
            self.lifecycle_service
                .warn_if_completed_early(&current, Utc::now().naive_utc());
        }

        let update_data = json!({
            "status": new_status,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id, current.status
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
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| {
                SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e))
            }),
            // The status moved under us; re-read and re-validate so duplicate
            // no-show triggers still resolve as a no-op.
            None => {
                warn!(
                    "Concurrent status change detected for appointment {}",
                    appointment_id
                );
                let fresh = self.get_appointment(appointment_id, auth_token).await?;
                match self
                    .lifecycle_service
                    .validate_transition(&fresh.status, &new_status)?
                {
                    TransitionOutcome::NoOp => Ok(fresh),
                    TransitionOutcome::Apply => {
                        Err(SchedulingError::InvalidTransition(fresh.status))
                    }
                }
            }
        }
    }

    /// Attach a meeting link to a confirmed telehealth appointment.
    pub async fn set_meeting_link(
        &self,
        appointment_id: Uuid,
        meeting_link: &str,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        if !current.is_virtual {
            return Err(SchedulingError::ValidationError(
                "Cannot add meeting link to non-telehealth appointment".to_string(),
            ));
        }
        if current.status != AppointmentStatus::Confirmed {
            return Err(SchedulingError::ValidationError(
                "Can only add meeting link to confirmed appointments".to_string(),
            ));
        }

        let update_data = json!({
            "meeting_link": meeting_link,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
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
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or(SchedulingError::NotFound("Appointment"))?;
        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        // Confirm existence so a bad id surfaces as 404 rather than silence.
        self.get_appointment(appointment_id, auth_token).await?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn verify_patient_exists(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(SchedulingError::NotFound("Patient"));
        }
        Ok(())
    }

    /// Insert the record. The table's partial unique index on
    /// `(doctor_id, date, start_time)` over non-terminal statuses is the
    /// last word on slot ownership: a concurrent booking that lost the race
    /// comes back as 409 and is reported as an unavailable slot.
    async fn insert_appointment(
        &self,
        request: &CreateAppointmentRequest,
        start_time: NaiveTime,
        end_time: NaiveTime,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = Utc::now().to_rfc3339();
        let record = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "date": request.date,
            "start_time": start_time.format("%H:%M:%S").to_string(),
            "end_time": end_time.format("%H:%M:%S").to_string(),
            "reason": request.reason,
            "notes": request.notes,
            "is_virtual": request.is_virtual,
            "meeting_link": Value::Null,
            "status": AppointmentStatus::Pending,
            "schedule_history": [],
            "created_at": now,
            "updated_at": now,
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(record),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(detail) => {
                    warn!(
                        "Lost booking race for doctor {} on {} at {}: {}",
                        request.doctor_id, request.date, start_time, detail
                    );
                    SchedulingError::SlotUnavailable
                }
                other => SchedulingError::DatabaseError(other.to_string()),
            })?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("Insert returned no record".to_string()))?;
        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    fn push_filters(parts: &mut Vec<String>, query: &AppointmentListQuery) {
        if let Some(status) = query.status {
            parts.push(format!("status=eq.{}", status));
        }
        if let Some(start_date) = query.start_date {
            parts.push(format!("date=gte.{}", start_date));
        }
        if let Some(end_date) = query.end_date {
            parts.push(format!("date=lte.{}", end_date));
        }
    }

    async fn query_appointments(
        &self,
        filter_parts: &[String],
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut path = String::from("/rest/v1/appointments?");
        if !filter_parts.is_empty() {
            path.push_str(&filter_parts.join("&"));
            path.push('&');
        }
        path.push_str("order=date.asc,start_time.asc");

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}
