use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use provider_cell::models::Slot;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, SchedulingError};

/// Half-open interval overlap: `[a_start, a_end)` against `[b_start, b_end)`.
/// Sharing a boundary is adjacency, not overlap.
pub fn intervals_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Prune candidate slots that collide with existing non-terminal
/// appointments. The slot occupied by `exclude_appointment_id` stays
/// selectable, so a reschedule can land on its own current time. Candidate
/// ordering is preserved.
pub fn available_slots(
    candidates: Vec<Slot>,
    booked: &[Appointment],
    exclude_appointment_id: Option<Uuid>,
) -> Vec<Slot> {
    candidates
        .into_iter()
        .filter(|slot| {
            !booked.iter().any(|appointment| {
                if appointment.status.is_terminal() {
                    return false;
                }
                if Some(appointment.id) == exclude_appointment_id {
                    return false;
                }
                intervals_overlap(
                    slot.start,
                    slot.end,
                    appointment.start_time,
                    appointment.end_time,
                )
            })
        })
        .collect()
}

pub struct ConflictService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// All slot-occupying appointments for one doctor and date.
    pub async fn booked_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Fetching booked appointments for doctor {} on {}", doctor_id, date);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&status=in.(pending,confirmed)&order=start_time.asc",
            doctor_id, date
        );

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
