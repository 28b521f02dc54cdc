use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AmbulanceError;
use crate::models::{AmbulanceInfo, Booking, STATUS_ASSIGNED, STATUS_CANCELLED, STATUS_REQUESTED};

/// Process-wide map of live bookings, created once at startup and handed to
/// the coordinator. No eviction; entries live for the process lifetime and
/// are lost on restart (callers fall back to the trip ledger).
///
/// Every mutation is a single read-modify-write section under the write
/// lock, so the `try_assign` status guard is atomic across the runtime's
/// worker threads.
pub struct LiveBookingCache {
    bookings: Arc<RwLock<HashMap<String, Booking>>>,
}

impl LiveBookingCache {
    pub fn new() -> Self {
        Self {
            bookings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, booking: Booking) {
        let mut bookings = self.bookings.write().await;
        debug!("Caching live booking {}", booking.booking_id);
        bookings.insert(booking.booking_id.clone(), booking);
    }

    pub async fn get(&self, booking_id: &str) -> Option<Booking> {
        let bookings = self.bookings.read().await;
        bookings.get(booking_id).cloned()
    }

    /// First acceptance wins: fails `AlreadyHandled` unless the booking is
    /// still exactly `requested`. Returns the updated booking on success.
    pub async fn try_assign(
        &self,
        booking_id: &str,
        ambulance: AmbulanceInfo,
    ) -> Result<Booking, AmbulanceError> {
        let mut bookings = self.bookings.write().await;
        let record = bookings
            .get_mut(booking_id)
            .ok_or_else(|| AmbulanceError::NotFound(booking_id.to_string()))?;

        if record.status != STATUS_REQUESTED {
            return Err(AmbulanceError::AlreadyHandled);
        }

        record.status = STATUS_ASSIGNED.to_string();
        record.ambulance = Some(ambulance);
        Ok(record.clone())
    }

    /// Overwrites the status with whatever the caller supplied; a missing
    /// status keeps the current one. No transition table is enforced.
    pub async fn update_status(
        &self,
        booking_id: &str,
        status: Option<&str>,
        eta_minutes: Option<u32>,
    ) -> Option<Booking> {
        let mut bookings = self.bookings.write().await;
        let record = bookings.get_mut(booking_id)?;

        if let Some(status) = status {
            record.status = status.to_string();
        }
        if let Some(eta) = eta_minutes {
            record.eta_minutes = Some(eta);
        }
        Some(record.clone())
    }

    /// Unconditional overwrite to `cancelled`, even for completed bookings.
    pub async fn cancel(&self, booking_id: &str) -> Option<Booking> {
        let mut bookings = self.bookings.write().await;
        let record = bookings.get_mut(booking_id)?;
        record.status = STATUS_CANCELLED.to_string();
        Some(record.clone())
    }
}

impl Default for LiveBookingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LiveBookingCache {
    fn clone(&self) -> Self {
        Self {
            bookings: Arc::clone(&self.bookings),
        }
    }
}
