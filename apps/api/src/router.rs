use axum::{routing::get, Router};

use ambulance_cell::{create_ambulance_router, AmbulanceState};
use shared_config::AppConfig;

pub fn create_router(config: &AppConfig) -> Router {
    let ambulance_state = AmbulanceState::new(config);

    Router::new()
        .route("/", get(|| async { "API Working" }))
        .nest("/api/ambulance", create_ambulance_router(ambulance_state))
}
