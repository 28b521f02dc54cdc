pub mod cache;
pub mod coordinator;
pub mod ledger;
pub mod notifications;

pub use cache::LiveBookingCache;
pub use coordinator::DispatchCoordinator;
pub use ledger::TripLedgerService;
pub use notifications::{
    booking_topic, zone_topic, AmbulanceNotificationService, TopicReceiver, DRIVERS_TOPIC,
};
