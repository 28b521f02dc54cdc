use std::sync::Arc;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_database::SupabaseClient;

use crate::error::AmbulanceError;
use crate::models::{
    AmbulanceInfo, Booking, TripRecord, STATUS_ASSIGNED, STATUS_CANCELLED, STATUS_COMPLETED,
    STATUS_REQUESTED,
};

/// Durable trip store. One row per booking in `ambulance_trips` (unique
/// `booking_id`), with the append-only event log as inserts into
/// `ambulance_trip_events`.
///
/// The ledger is written after the cache mutation and is not transactionally
/// linked to it; callers treat write failures as log-and-continue.
pub struct TripLedgerService {
    supabase: Arc<SupabaseClient>,
}

impl TripLedgerService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Insert the trip row with dispatch time and the first event.
    pub async fn create_trip(&self, booking: &Booking) -> Result<(), AmbulanceError> {
        let row = json!({
            "booking_id": booking.booking_id,
            "user_id": booking.user_id,
            "zone": booking.zone,
            "location": booking.location,
            "initial_report": booking.notes,
            "requested_at": booking.created_at,
            "dispatched_at": Utc::now(),
            "status": STATUS_REQUESTED,
        });

        self.supabase
            .execute(Method::POST, "/rest/v1/ambulance_trips", row)
            .await
            .map_err(|e| AmbulanceError::Persistence(e.to_string()))?;

        self.append_event(&booking.booking_id, STATUS_REQUESTED, None, Some("Request created"))
            .await
    }

    pub async fn record_acceptance(
        &self,
        booking_id: &str,
        ambulance: &AmbulanceInfo,
    ) -> Result<(), AmbulanceError> {
        let patch = json!({
            "status": STATUS_ASSIGNED,
            "accepted_at": Utc::now(),
            "ambulance": ambulance,
        });
        self.patch_trip(booking_id, patch).await?;
        self.append_event(booking_id, STATUS_ASSIGNED, None, Some("Driver accepted"))
            .await
    }

    /// Mirror a status transition; `completed` additionally stamps
    /// `completed_at`.
    pub async fn record_status(
        &self,
        booking_id: &str,
        status: &str,
        eta_minutes: Option<u32>,
    ) -> Result<(), AmbulanceError> {
        let mut patch = json!({ "status": status });
        if let Some(eta) = eta_minutes {
            patch["eta_minutes"] = json!(eta);
        }
        if status == STATUS_COMPLETED {
            patch["completed_at"] = json!(Utc::now());
        }

        self.patch_trip(booking_id, patch).await?;
        self.append_event(booking_id, status, eta_minutes, None).await
    }

    pub async fn record_cancellation(&self, booking_id: &str) -> Result<(), AmbulanceError> {
        let patch = json!({
            "status": STATUS_CANCELLED,
            "cancelled_at": Utc::now(),
        });
        self.patch_trip(booking_id, patch).await?;
        self.append_event(booking_id, STATUS_CANCELLED, None, None).await
    }

    /// Fetch the trip row with its embedded event log, oldest event first.
    pub async fn fetch_trip(&self, booking_id: &str) -> Result<Option<TripRecord>, AmbulanceError> {
        let path = format!(
            "/rest/v1/ambulance_trips?booking_id=eq.{}&select=*,events:ambulance_trip_events(status,eta_minutes,note,at)&events.order=at.asc",
            booking_id
        );

        let rows: Vec<TripRecord> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AmbulanceError::Persistence(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    async fn patch_trip(&self, booking_id: &str, patch: Value) -> Result<(), AmbulanceError> {
        let path = format!("/rest/v1/ambulance_trips?booking_id=eq.{}", booking_id);
        self.supabase
            .execute(Method::PATCH, &path, patch)
            .await
            .map_err(|e| AmbulanceError::Persistence(e.to_string()))
    }

    async fn append_event(
        &self,
        booking_id: &str,
        status: &str,
        eta_minutes: Option<u32>,
        note: Option<&str>,
    ) -> Result<(), AmbulanceError> {
        debug!("Appending trip event {} for booking {}", status, booking_id);

        let mut row = json!({
            "booking_id": booking_id,
            "status": status,
            "at": Utc::now(),
        });
        if let Some(eta) = eta_minutes {
            row["eta_minutes"] = json!(eta);
        }
        if let Some(note) = note {
            row["note"] = json!(note);
        }

        self.supabase
            .execute(Method::POST, "/rest/v1/ambulance_trip_events", row)
            .await
            .map_err(|e| AmbulanceError::Persistence(e.to_string()))
    }
}
