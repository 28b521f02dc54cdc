use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AmbulanceError;
use crate::models::{
    events, AcceptRequest, AmbulanceInfo, Booking, BookingRequest, EmergencyAlert, GeoPoint,
    StatusUpdateRequest, TripRecord, STATUS_REQUESTED,
};
use crate::services::cache::LiveBookingCache;
use crate::services::ledger::TripLedgerService;
use crate::services::notifications::{
    booking_topic, zone_topic, AmbulanceNotificationService, DRIVERS_TOPIC,
};

/// The dispatch state machine. Owns all writes to the live cache and the
/// trip ledger for a booking, and triggers notification fan-out.
///
/// Cache and ledger are eventually consistent: the cache mutation always
/// lands first, and a ledger failure is logged without rolling it back or
/// surfacing to the caller.
pub struct DispatchCoordinator {
    cache: LiveBookingCache,
    ledger: TripLedgerService,
    notifications: AmbulanceNotificationService,
}

impl DispatchCoordinator {
    pub fn new(
        cache: LiveBookingCache,
        ledger: TripLedgerService,
        notifications: AmbulanceNotificationService,
    ) -> Self {
        Self {
            cache,
            ledger,
            notifications,
        }
    }

    /// Create a booking in `requested`, persist the initial trip record and
    /// broadcast it to the zone and the global driver pool. Never fails on
    /// valid input.
    pub async fn create_booking(&self, request: BookingRequest) -> Booking {
        let booking = Booking {
            booking_id: Uuid::new_v4().to_string(),
            user_id: request.user_id,
            zone: request.zone,
            location: GeoPoint {
                lat: request.lat,
                lng: request.lng,
            },
            notes: request.notes,
            status: STATUS_REQUESTED.to_string(),
            ambulance: None,
            eta_minutes: None,
            created_at: Utc::now(),
        };

        info!(
            "New ambulance booking {} for user {} in zone {}",
            booking.booking_id, booking.user_id, booking.zone
        );

        self.cache.insert(booking.clone()).await;

        if let Err(e) = self.ledger.create_trip(&booking).await {
            error!("Failed to persist trip {}: {}", booking.booking_id, e);
        }

        match serde_json::to_value(&booking) {
            Ok(payload) => {
                self.notifications
                    .publish(&zone_topic(&booking.zone), events::REQUEST, payload.clone())
                    .await;
                self.notifications
                    .publish(DRIVERS_TOPIC, events::REQUEST, payload)
                    .await;
            }
            Err(e) => error!("Failed to serialize booking {}: {}", booking.booking_id, e),
        }

        booking
    }

    /// Driver accepts a booking. Exactly one accept can succeed; a booking
    /// that is no longer `requested` yields `AlreadyHandled` and keeps the
    /// descriptor set by the winning accept.
    pub async fn accept_booking(&self, request: AcceptRequest) -> Result<Booking, AmbulanceError> {
        let ambulance = AmbulanceInfo {
            id: request.ambulance_id,
            driver_name: request.driver_name,
            vehicle_no: request.vehicle_no,
        };

        let booking = self
            .cache
            .try_assign(&request.booking_id, ambulance.clone())
            .await?;

        info!(
            "Booking {} accepted by ambulance {}",
            booking.booking_id, ambulance.id
        );

        if let Err(e) = self
            .ledger
            .record_acceptance(&booking.booking_id, &ambulance)
            .await
        {
            error!("Failed to persist acceptance for {}: {}", booking.booking_id, e);
        }

        // Assignment goes to the booking topic only; zone and driver-pool
        // subscribers do not get a second broadcast.
        match serde_json::to_value(&booking) {
            Ok(payload) => {
                self.notifications
                    .publish(&booking_topic(&booking.booking_id), events::ASSIGNED, payload)
                    .await;
            }
            Err(e) => error!("Failed to serialize booking {}: {}", booking.booking_id, e),
        }

        Ok(booking)
    }

    /// Overwrite the live status with whatever the driver reports. Any
    /// string over any prior status; only existence is checked.
    pub async fn update_status(
        &self,
        request: StatusUpdateRequest,
    ) -> Result<Booking, AmbulanceError> {
        let booking = self
            .cache
            .update_status(
                &request.booking_id,
                request.status.as_deref(),
                request.eta_minutes,
            )
            .await
            .ok_or_else(|| AmbulanceError::NotFound(request.booking_id.clone()))?;

        if let Err(e) = self
            .ledger
            .record_status(&booking.booking_id, &booking.status, request.eta_minutes)
            .await
        {
            error!("Failed to persist status for {}: {}", booking.booking_id, e);
        }

        self.notifications
            .publish(
                &booking_topic(&booking.booking_id),
                events::STATUS,
                json!({
                    "bookingId": booking.booking_id,
                    "status": booking.status,
                    "etaMinutes": booking.eta_minutes,
                }),
            )
            .await;

        Ok(booking)
    }

    /// Unconditional cancellation; completed bookings are overwritten too.
    pub async fn cancel_booking(&self, booking_id: &str) -> Result<(), AmbulanceError> {
        let booking = self
            .cache
            .cancel(booking_id)
            .await
            .ok_or_else(|| AmbulanceError::NotFound(booking_id.to_string()))?;

        info!("Booking {} cancelled", booking.booking_id);

        // Subscribers hear the cancellation before the ledger settles.
        self.notifications
            .publish(
                &booking_topic(booking_id),
                events::CANCELLED,
                json!({ "bookingId": booking_id }),
            )
            .await;

        if let Err(e) = self.ledger.record_cancellation(booking_id).await {
            error!("Failed to persist cancellation for {}: {}", booking_id, e);
        }

        Ok(())
    }

    /// Return the live entry and the ledger record independently; after a
    /// restart the cache side is empty while the ledger persists. A ledger
    /// read failure degrades to `None`.
    pub async fn get_booking(&self, booking_id: &str) -> (Option<Booking>, Option<TripRecord>) {
        let live = self.cache.get(booking_id).await;

        let trip = match self.ledger.fetch_trip(booking_id).await {
            Ok(trip) => trip,
            Err(e) => {
                warn!("Failed to read trip {}: {}", booking_id, e);
                None
            }
        };

        (live, trip)
    }

    /// Legacy broadcast-only path: fan out an alert without creating a
    /// booking or touching the ledger.
    pub async fn broadcast_emergency(&self, request: BookingRequest) -> EmergencyAlert {
        let alert = EmergencyAlert {
            user_id: request.user_id,
            location: GeoPoint {
                lat: request.lat,
                lng: request.lng,
            },
            zone: request.zone,
            notes: request.notes,
            requested_at: Utc::now(),
            status: STATUS_REQUESTED.to_string(),
        };

        info!("Emergency broadcast for zone {}", alert.zone);

        match serde_json::to_value(&alert) {
            Ok(payload) => {
                self.notifications
                    .publish(&zone_topic(&alert.zone), events::REQUEST, payload.clone())
                    .await;
                self.notifications
                    .publish(DRIVERS_TOPIC, events::REQUEST, payload)
                    .await;
            }
            Err(e) => error!("Failed to serialize emergency alert: {}", e),
        }

        alert
    }

    pub fn notifications(&self) -> &AmbulanceNotificationService {
        &self.notifications
    }
}
