use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known booking statuses. The status field itself is an open string
/// set: drivers may report any status ("en-route", "arrived", ...) and the
/// coordinator stores whatever it is given.
pub const STATUS_REQUESTED: &str = "requested";
pub const STATUS_ASSIGNED: &str = "assigned";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Event names emitted on the notification channel.
pub mod events {
    pub const REQUEST: &str = "ambulance:request";
    pub const ASSIGNED: &str = "ambulance:assigned";
    pub const STATUS: &str = "ambulance:status";
    pub const CANCELLED: &str = "ambulance:cancelled";
    pub const JOINED_ZONE: &str = "joined-zone";
    pub const JOINED_BOOKING: &str = "joined-booking";
}

pub const DEFAULT_ZONE: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbulanceInfo {
    pub id: String,
    pub driver_name: String,
    pub vehicle_no: String,
}

/// A live dispatch booking as held in the in-process cache and returned on
/// the REST surface. Never deleted; lost on process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: String,
    pub user_id: String,
    pub zone: String,
    pub location: GeoPoint,
    pub notes: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambulance: Option<AmbulanceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// One entry of a trip's append-only event log (`ambulance_trip_events`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripEvent {
    pub status: String,
    pub eta_minutes: Option<u32>,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// Durable trip record (`ambulance_trips` row plus embedded events).
/// Field names follow the table columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRecord {
    pub booking_id: String,
    pub user_id: Option<String>,
    pub zone: Option<String>,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub initial_report: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub status: String,
    pub eta_minutes: Option<u32>,
    pub ambulance: Option<AmbulanceInfo>,
    #[serde(default)]
    pub events: Vec<TripEvent>,
}

/// Payload for `POST /request` and `POST /trigger`. Coordinates are
/// caller-supplied and not range-validated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_zone")]
    pub zone: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequest {
    pub booking_id: String,
    #[serde(default = "default_ambulance_id")]
    pub ambulance_id: String,
    #[serde(default = "default_driver_name")]
    pub driver_name: String,
    #[serde(default = "default_vehicle_no")]
    pub vehicle_no: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub booking_id: String,
    pub status: Option<String>,
    pub eta_minutes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub booking_id: String,
}

/// Broadcast-only emergency payload used by the legacy `/trigger` path.
/// No booking is created and nothing is persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAlert {
    pub user_id: String,
    pub location: GeoPoint,
    pub zone: String,
    pub notes: String,
    pub requested_at: DateTime<Utc>,
    pub status: String,
}

/// Control messages a WebSocket client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinZone {
        #[serde(default)]
        zone: String,
    },
    JoinBooking {
        #[serde(rename = "bookingId", default)]
        booking_id: String,
    },
}

fn default_user_id() -> String {
    "unknown".to_string()
}

fn default_zone() -> String {
    DEFAULT_ZONE.to_string()
}

fn default_ambulance_id() -> String {
    "amb-001".to_string()
}

fn default_driver_name() -> String {
    "On-call Driver".to_string()
}

fn default_vehicle_no() -> String {
    "UP14 XX 1234".to_string()
}
