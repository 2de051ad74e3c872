use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::handlers::*;
use scheduling_cell::models::*;
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

const MONDAY: &str = "2025-06-02";

fn create_test_user_extension(role: &str, id: &str) -> Extension<User> {
    Extension(User {
        id: id.to_string(),
        email: Some(format!("{}@example.com", role)),
        role: Some(role.to_string()),
        metadata: None,
        created_at: Some(chrono::Utc::now()),
    })
}

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    let auth = Authorization::bearer(token).unwrap();
    TypedHeader(auth)
}

fn create_request(patient_id: Uuid, doctor_id: Uuid) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        doctor_id,
        patient_id,
        date: MONDAY.parse().unwrap(),
        start_time: "09:00".to_string(),
        end_time: "09:30".to_string(),
        reason: "Routine check-up".to_string(),
        notes: None,
        is_virtual: false,
    }
}

async fn mock_appointment_by_id(mock_server: &MockServer, appointment_id: &str, row: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(mock_server)
        .await;
}

// ==============================================================================
// AUTHORIZATION
// ==============================================================================

#[tokio::test]
async fn patient_cannot_book_for_another_patient() {
    let config = TestConfig::default().to_arc();
    let patient = TestUser::patient("patient@example.com");

    let result = create_appointment(
        State(config),
        create_auth_header("test-token"),
        create_test_user_extension("patient", &patient.id),
        Json(create_request(Uuid::new_v4(), Uuid::new_v4())),
    )
    .await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn non_admin_cannot_delete_appointments() {
    let config = TestConfig::default().to_arc();
    let doctor = TestUser::doctor("doctor@example.com");

    let result = delete_appointment(
        State(config),
        Path(Uuid::new_v4()),
        create_auth_header("test-token"),
        create_test_user_extension("doctor", &doctor.id),
    )
    .await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn uninvolved_user_cannot_view_appointment() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    let outsider = TestUser::patient("outsider@example.com");
    let appointment_id = Uuid::new_v4();
    mock_appointment_by_id(
        &mock_server,
        &appointment_id.to_string(),
        MockSupabaseResponses::appointment_row(
            &appointment_id.to_string(),
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
            MONDAY,
            "09:00:00",
            "09:30:00",
            "pending",
        ),
    )
    .await;

    let result = get_appointment(
        State(config),
        Path(appointment_id),
        create_auth_header("test-token"),
        create_test_user_extension("patient", &outsider.id),
    )
    .await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn patient_cannot_confirm_their_own_appointment() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4();
    mock_appointment_by_id(
        &mock_server,
        &appointment_id.to_string(),
        MockSupabaseResponses::appointment_row(
            &appointment_id.to_string(),
            &patient.id,
            &Uuid::new_v4().to_string(),
            MONDAY,
            "09:00:00",
            "09:30:00",
            "pending",
        ),
    )
    .await;

    let result = update_appointment_status(
        State(config),
        Path(appointment_id),
        create_auth_header("test-token"),
        create_test_user_extension("patient", &patient.id),
        Json(UpdateStatusRequest {
            status: AppointmentStatus::Confirmed,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn patient_can_cancel_their_own_appointment() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4();
    let pending = MockSupabaseResponses::appointment_row(
        &appointment_id.to_string(),
        &patient.id,
        &Uuid::new_v4().to_string(),
        MONDAY,
        "09:00:00",
        "09:30:00",
        "pending",
    );
    let mut cancelled = pending.clone();
    cancelled["status"] = json!("cancelled");

    mock_appointment_by_id(&mock_server, &appointment_id.to_string(), pending).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    let result = update_appointment_status(
        State(config),
        Path(appointment_id),
        create_auth_header("test-token"),
        create_test_user_extension("patient", &patient.id),
        Json(UpdateStatusRequest {
            status: AppointmentStatus::Cancelled,
        }),
    )
    .await;

    let Json(body) = result.expect("patient-initiated cancellation should succeed");
    assert_eq!(body["appointment"]["status"], json!("cancelled"));
}

#[tokio::test]
async fn meeting_link_is_managed_by_the_appointments_own_doctor() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    let other_doctor = TestUser::doctor("other@example.com");
    let appointment_id = Uuid::new_v4();
    mock_appointment_by_id(
        &mock_server,
        &appointment_id.to_string(),
        MockSupabaseResponses::appointment_row(
            &appointment_id.to_string(),
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
            MONDAY,
            "09:00:00",
            "09:30:00",
            "confirmed",
        ),
    )
    .await;

    let result = update_meeting_link(
        State(config),
        Path(appointment_id),
        create_auth_header("test-token"),
        create_test_user_extension("doctor", &other_doctor.id),
        Json(MeetingLinkRequest {
            meeting_link: "https://meet.example.com/abc".to_string(),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn meeting_link_rejected_for_in_person_appointment() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    let doctor = TestUser::doctor("doctor@example.com");
    let appointment_id = Uuid::new_v4();
    // appointment_row is an in-person visit (is_virtual: false)
    mock_appointment_by_id(
        &mock_server,
        &appointment_id.to_string(),
        MockSupabaseResponses::appointment_row(
            &appointment_id.to_string(),
            &Uuid::new_v4().to_string(),
            &doctor.id,
            MONDAY,
            "09:00:00",
            "09:30:00",
            "confirmed",
        ),
    )
    .await;

    let result = update_meeting_link(
        State(config),
        Path(appointment_id),
        create_auth_header("test-token"),
        create_test_user_extension("doctor", &doctor.id),
        Json(MeetingLinkRequest {
            meeting_link: "https://meet.example.com/abc".to_string(),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

// ==============================================================================
// REQUEST VALIDATION
// ==============================================================================

#[tokio::test]
async fn booking_with_empty_reason_is_rejected() {
    let config = TestConfig::default().to_arc();
    let patient = TestUser::patient("patient@example.com");
    let mut request = create_request(patient.id.parse().unwrap(), Uuid::new_v4());
    request.reason = "   ".to_string();

    let result = create_appointment(
        State(config),
        create_auth_header("test-token"),
        create_test_user_extension("patient", &patient.id),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn booking_with_unparsable_time_is_rejected() {
    let config = TestConfig::default().to_arc();
    let patient = TestUser::patient("patient@example.com");
    let mut request = create_request(patient.id.parse().unwrap(), Uuid::new_v4());
    request.start_time = "9am".to_string();

    let result = create_appointment(
        State(config),
        create_auth_header("test-token"),
        create_test_user_extension("patient", &patient.id),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn booking_with_inverted_interval_is_rejected() {
    let config = TestConfig::default().to_arc();
    let patient = TestUser::patient("patient@example.com");
    let mut request = create_request(patient.id.parse().unwrap(), Uuid::new_v4());
    request.start_time = "10:00".to_string();
    request.end_time = "09:30".to_string();

    let result = create_appointment(
        State(config),
        create_auth_header("test-token"),
        create_test_user_extension("patient", &patient.id),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn reschedule_cannot_move_appointment_to_a_different_doctor() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4();
    mock_appointment_by_id(
        &mock_server,
        &appointment_id.to_string(),
        MockSupabaseResponses::appointment_row(
            &appointment_id.to_string(),
            &patient.id,
            &Uuid::new_v4().to_string(),
            MONDAY,
            "10:00:00",
            "10:30:00",
            "confirmed",
        ),
    )
    .await;

    let result = reschedule_appointment(
        State(config),
        Path(appointment_id),
        create_auth_header("test-token"),
        create_test_user_extension("patient", &patient.id),
        Json(RescheduleAppointmentRequest {
            doctor_id: Some(Uuid::new_v4()),
            date: MONDAY.parse().unwrap(),
            start_time: "11:00".to_string(),
            end_time: None,
            notes: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}
