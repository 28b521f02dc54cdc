use std::sync::Arc;
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use ambulance_cell::*;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

async fn mock_supabase() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    server
}

fn create_coordinator(server: &MockServer) -> Arc<DispatchCoordinator> {
    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
    };
    let supabase = Arc::new(SupabaseClient::new(&config));

    Arc::new(DispatchCoordinator::new(
        LiveBookingCache::new(),
        TripLedgerService::new(supabase),
        AmbulanceNotificationService::new(),
    ))
}

fn booking_request(zone: &str) -> BookingRequest {
    BookingRequest {
        user_id: "u1".to_string(),
        lat: 28.6,
        lng: 77.2,
        zone: zone.to_string(),
        notes: "chest pain".to_string(),
    }
}

async fn recv_event(receiver: &mut TopicReceiver) -> Value {
    let message = timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("Should receive an event within the timeout")
        .expect("Channel should stay open");
    serde_json::from_str(&message).expect("Events are JSON envelopes")
}

#[tokio::test]
async fn test_publish_and_subscribe_roundtrip() {
    let service = AmbulanceNotificationService::new();

    let mut receiver = service.subscribe("zone-test").await;
    service
        .publish("zone-test", events::REQUEST, json!({ "bookingId": "b1" }))
        .await;

    let event = recv_event(&mut receiver).await;
    assert_eq!(event["event"], json!("ambulance:request"));
    assert_eq!(event["data"]["bookingId"], json!("b1"));
}

#[tokio::test]
async fn test_publish_without_subscribers_is_fire_and_forget() {
    let service = AmbulanceNotificationService::new();

    // Nothing joined; the publish is silently dropped.
    service
        .publish("zone-empty", events::REQUEST, json!({ "bookingId": "b1" }))
        .await;

    assert!(service.active_topics().await.is_empty());
}

#[tokio::test]
async fn test_cloned_service_shares_topics() {
    let service = AmbulanceNotificationService::new();
    let clone = service.clone();

    let mut receiver = service.subscribe("drivers").await;
    clone
        .publish("drivers", events::REQUEST, json!({ "bookingId": "b1" }))
        .await;

    let event = recv_event(&mut receiver).await;
    assert_eq!(event["data"]["bookingId"], json!("b1"));
    assert_eq!(clone.active_topics().await, vec!["drivers".to_string()]);
}

#[tokio::test]
async fn test_new_request_reaches_zone_and_driver_pool_but_not_other_zones() {
    let server = mock_supabase().await;
    let coordinator = create_coordinator(&server);
    let notifications = coordinator.notifications();

    let mut north = notifications.subscribe(&zone_topic("north")).await;
    let mut drivers = notifications.subscribe(DRIVERS_TOPIC).await;
    let mut south = notifications.subscribe(&zone_topic("south")).await;

    let booking = coordinator.create_booking(booking_request("north")).await;

    let north_event = recv_event(&mut north).await;
    assert_eq!(north_event["event"], json!("ambulance:request"));
    assert_eq!(north_event["data"]["bookingId"], json!(booking.booking_id));
    assert_eq!(north_event["data"]["zone"], json!("north"));

    // The driver pool sees every zone's requests; zone filtering is
    // advisory only.
    let drivers_event = recv_event(&mut drivers).await;
    assert_eq!(drivers_event["data"]["bookingId"], json!(booking.booking_id));

    let south_result = timeout(Duration::from_millis(200), south.recv()).await;
    assert!(south_result.is_err(), "Other zones must not hear the request");
}

#[tokio::test]
async fn test_acceptance_goes_to_the_booking_topic_only() {
    let server = mock_supabase().await;
    let coordinator = create_coordinator(&server);
    let notifications = coordinator.notifications();

    let booking = coordinator.create_booking(booking_request("north")).await;

    let mut booking_sub = notifications.subscribe(&booking_topic(&booking.booking_id)).await;
    let mut zone_sub = notifications.subscribe(&zone_topic("north")).await;
    let mut drivers_sub = notifications.subscribe(DRIVERS_TOPIC).await;

    coordinator
        .accept_booking(AcceptRequest {
            booking_id: booking.booking_id.clone(),
            ambulance_id: "amb-9".to_string(),
            driver_name: "Test Driver".to_string(),
            vehicle_no: "UP14 XX 1234".to_string(),
        })
        .await
        .unwrap();

    let event = recv_event(&mut booking_sub).await;
    assert_eq!(event["event"], json!("ambulance:assigned"));
    assert_eq!(event["data"]["ambulance"]["id"], json!("amb-9"));

    // No second broadcast for acceptance on the wide topics.
    assert!(timeout(Duration::from_millis(200), zone_sub.recv()).await.is_err());
    assert!(timeout(Duration::from_millis(200), drivers_sub.recv()).await.is_err());
}

#[tokio::test]
async fn test_status_and_cancellation_events_on_the_booking_topic() {
    let server = mock_supabase().await;
    let coordinator = create_coordinator(&server);
    let notifications = coordinator.notifications();

    let booking = coordinator.create_booking(booking_request("north")).await;
    let mut booking_sub = notifications.subscribe(&booking_topic(&booking.booking_id)).await;

    coordinator
        .update_status(StatusUpdateRequest {
            booking_id: booking.booking_id.clone(),
            status: Some("en-route".to_string()),
            eta_minutes: Some(12),
        })
        .await
        .unwrap();

    let status_event = recv_event(&mut booking_sub).await;
    assert_eq!(status_event["event"], json!("ambulance:status"));
    assert_eq!(status_event["data"]["status"], json!("en-route"));
    assert_eq!(status_event["data"]["etaMinutes"], json!(12));

    coordinator.cancel_booking(&booking.booking_id).await.unwrap();

    let cancel_event = recv_event(&mut booking_sub).await;
    assert_eq!(cancel_event["event"], json!("ambulance:cancelled"));
    assert_eq!(cancel_event["data"]["bookingId"], json!(booking.booking_id));
}

#[tokio::test]
async fn test_trigger_broadcasts_without_creating_a_booking() {
    let server = mock_supabase().await;
    let coordinator = create_coordinator(&server);
    let notifications = coordinator.notifications();

    let mut zone_sub = notifications.subscribe(&zone_topic("general")).await;
    let mut drivers_sub = notifications.subscribe(DRIVERS_TOPIC).await;

    let alert = coordinator
        .broadcast_emergency(BookingRequest {
            user_id: "u2".to_string(),
            lat: 19.0,
            lng: 72.8,
            zone: "general".to_string(),
            notes: String::new(),
        })
        .await;
    assert_eq!(alert.status, STATUS_REQUESTED);

    let zone_event = recv_event(&mut zone_sub).await;
    assert_eq!(zone_event["event"], json!("ambulance:request"));
    assert_eq!(zone_event["data"]["userId"], json!("u2"));
    // Alert payloads have no booking identifier.
    assert!(zone_event["data"].get("bookingId").is_none());

    let drivers_event = recv_event(&mut drivers_sub).await;
    assert_eq!(drivers_event["data"]["userId"], json!("u2"));

    // Nothing was persisted.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty(), "Trigger must not touch the ledger");
}

#[tokio::test]
async fn test_slow_subscriber_drops_events_without_blocking_publishers() {
    let service = AmbulanceNotificationService::new();

    let mut receiver = service.subscribe("zone-busy").await;

    // Overrun the channel capacity; the publisher never blocks and the
    // subscriber simply observes a lag.
    for i in 0..150 {
        service
            .publish("zone-busy", events::STATUS, json!({ "seq": i }))
            .await;
    }

    let result = receiver.recv().await;
    assert!(
        matches!(result, Err(tokio::sync::broadcast::error::RecvError::Lagged(_))),
        "Overrun subscriber should observe lag, got {:?}",
        result
    );
}
