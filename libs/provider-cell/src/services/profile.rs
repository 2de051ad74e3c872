use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, WeeklySchedule};

pub struct DoctorProfileService {
    supabase: SupabaseClient,
}

impl DoctorProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Look up a provider record. `Ok(None)` means no such doctor.
    pub async fn find_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Option<Doctor>> {
        debug!("Fetching doctor record: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        match result.into_iter().next() {
            Some(row) => {
                let doctor: Doctor = serde_json::from_value(row)?;
                Ok(Some(doctor))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the provider's weekly schedule. The schedule is stored as a
    /// normalized JSON document; callers validate before persisting.
    pub async fn update_schedule(
        &self,
        doctor_id: Uuid,
        schedule: &WeeklySchedule,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Updating availability for doctor: {}", doctor_id);

        let update_data = json!({
            "availability": schedule.to_json_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
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
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Doctor not found"))?;
        let doctor: Doctor = serde_json::from_value(row)?;

        debug!("Availability updated for doctor {}", doctor.id);
        Ok(doctor)
    }
}
