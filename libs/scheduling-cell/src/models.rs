use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// Appointment record as stored in the `appointments` table. The slot it
/// occupies is the half-open interval `[start_time, end_time)` on `date`;
/// among non-terminal appointments for one doctor and date these intervals
/// are pairwise non-overlapping (enforced by a partial unique index on
/// `(doctor_id, date, start_time)` over non-terminal statuses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_virtual: bool,
    pub meeting_link: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub schedule_history: Vec<ScheduleChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn scheduled_start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.patient_id.to_string() == user_id || self.doctor_id.to_string() == user_id
    }
}

/// A prior timing of a rescheduled appointment. Rescheduling mutates the
/// record in place and appends the displaced timing here, so the record's
/// identity and history survive any number of moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleChange {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Wire DTOs are camelCase to match the web client; times arrive as
/// `"HH:MM"` strings and are parsed via [`parse_wall_clock`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub reason: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: String,
    /// Advisory only: the stored end time always snaps to the provider's
    /// slot granularity.
    pub end_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingLinkRequest {
    pub meeting_link: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub doctor: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub doctor: Option<Uuid>,
    pub patient: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Parse a `"HH:MM"` wall-clock string (seconds tolerated).
pub fn parse_wall_clock(raw: &str) -> Result<NaiveTime, SchedulingError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(|_| SchedulingError::ValidationError(format!("Invalid time of day: {:?}", raw)))
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Unparsable availability strings are deliberately absent here: the read
/// path recovers them locally (the day is treated as not available), and the
/// write path rejects them up front as `ValidationError`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Requested slot is not available")]
    SlotUnavailable,

    #[error("Invalid status transition from {0}")]
    InvalidTransition(AppointmentStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_format_is_kebab_case() {
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::NoShow).unwrap(),
            "\"no-show\""
        );
        assert_eq!(
            serde_json::from_str::<AppointmentStatus>("\"no-show\"").unwrap(),
            AppointmentStatus::NoShow
        );
        assert_eq!(
            serde_json::from_str::<AppointmentStatus>("\"confirmed\"").unwrap(),
            AppointmentStatus::Confirmed
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(!AppointmentStatus::Pending.is_terminal());
        assert!(!AppointmentStatus::Confirmed.is_terminal());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(AppointmentStatus::NoShow.is_terminal());
    }

    #[test]
    fn wall_clock_parsing() {
        assert_eq!(
            parse_wall_clock("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_wall_clock("09:30:00").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_wall_clock("9:30 AM").is_err());
        assert!(parse_wall_clock("noon").is_err());
    }

    #[test]
    fn create_request_accepts_camel_case() {
        let body = serde_json::json!({
            "doctorId": Uuid::new_v4(),
            "patientId": Uuid::new_v4(),
            "date": "2025-06-02",
            "startTime": "09:00",
            "endTime": "09:30",
            "reason": "Follow-up",
            "isVirtual": true
        });
        let request: CreateAppointmentRequest = serde_json::from_value(body).unwrap();
        assert!(request.is_virtual);
        assert_eq!(request.start_time, "09:00");
    }
}
