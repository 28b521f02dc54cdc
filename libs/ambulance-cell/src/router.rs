use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::handlers::{
    accept_booking, ambulance_ws, cancel_booking, get_booking, request_booking,
    trigger_emergency, update_status,
};
use crate::services::{
    AmbulanceNotificationService, DispatchCoordinator, LiveBookingCache, TripLedgerService,
};

/// Long-lived cell state: one coordinator (and thus one cache and one
/// notification channel map) per process.
#[derive(Clone)]
pub struct AmbulanceState {
    pub coordinator: Arc<DispatchCoordinator>,
}

impl AmbulanceState {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let coordinator = DispatchCoordinator::new(
            LiveBookingCache::new(),
            TripLedgerService::new(supabase),
            AmbulanceNotificationService::new(),
        );

        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

pub fn create_ambulance_router(state: AmbulanceState) -> Router {
    Router::new()
        .route("/trigger", post(trigger_emergency))
        .route("/request", post(request_booking))
        .route("/accept", post(accept_booking))
        .route("/status", post(update_status))
        .route("/cancel", post(cancel_booking))
        .route("/ws", get(ambulance_ws))
        .route("/{id}", get(get_booking))
        .with_state(state)
}
