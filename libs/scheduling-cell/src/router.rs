use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/available-slots", get(handlers::get_available_slots))
        .route("/", post(handlers::create_appointment))
        .route("/", get(handlers::list_appointments))
        .route("/user/{user_id}", get(handlers::get_user_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", put(handlers::reschedule_appointment))
        .route("/{appointment_id}", delete(handlers::delete_appointment))
        .route("/status/{appointment_id}", patch(handlers::update_appointment_status))
        .route("/{appointment_id}/meeting-link", patch(handlers::update_meeting_link))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
