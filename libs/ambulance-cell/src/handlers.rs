use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{Json, Response},
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use shared_models::error::AppError;

use crate::models::{
    events, AcceptRequest, BookingRequest, CancelRequest, ClientMessage, StatusUpdateRequest,
    DEFAULT_ZONE,
};
use crate::router::AmbulanceState;
use crate::services::notifications::{booking_topic, zone_topic, TopicReceiver};
use crate::AmbulanceError;

/// Legacy broadcast endpoint: fan out an alert without creating a booking.
pub async fn trigger_emergency(
    State(state): State<AmbulanceState>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let payload = state.coordinator.broadcast_emergency(request).await;

    Ok(Json(json!({
        "success": true,
        "message": "Emergency dispatched",
        "payload": payload
    })))
}

/// Create a booking and notify zone listeners plus the driver pool.
pub async fn request_booking(
    State(state): State<AmbulanceState>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = state.coordinator.create_booking(request).await;

    Ok(Json(json!({
        "success": true,
        "booking": booking
    })))
}

/// Driver accepts a booking. Losing the accept race is an expected outcome
/// and answers 200 with `success: false`, not an error status.
pub async fn accept_booking(
    State(state): State<AmbulanceState>,
    Json(request): Json<AcceptRequest>,
) -> Result<Json<Value>, AppError> {
    match state.coordinator.accept_booking(request).await {
        Ok(booking) => Ok(Json(json!({
            "success": true,
            "booking": booking
        }))),
        Err(AmbulanceError::AlreadyHandled) => Ok(Json(json!({
            "success": false,
            "message": "Already accepted"
        }))),
        Err(AmbulanceError::NotFound(_)) => {
            Err(AppError::NotFound("Booking not found".to_string()))
        }
        Err(e) => {
            error!("Failed to accept booking: {}", e);
            Err(AppError::Internal("Operation failed".to_string()))
        }
    }
}

/// Update the live status (driver en-route, arrived, completed, ...).
pub async fn update_status(
    State(state): State<AmbulanceState>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    match state.coordinator.update_status(request).await {
        Ok(booking) => Ok(Json(json!({
            "success": true,
            "booking": booking
        }))),
        Err(AmbulanceError::NotFound(_)) => {
            Err(AppError::NotFound("Booking not found".to_string()))
        }
        Err(e) => {
            error!("Failed to update status: {}", e);
            Err(AppError::Internal("Operation failed".to_string()))
        }
    }
}

pub async fn cancel_booking(
    State(state): State<AmbulanceState>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    match state.coordinator.cancel_booking(&request.booking_id).await {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(AmbulanceError::NotFound(_)) => {
            Err(AppError::NotFound("Booking not found".to_string()))
        }
        Err(e) => {
            error!("Failed to cancel booking: {}", e);
            Err(AppError::Internal("Operation failed".to_string()))
        }
    }
}

/// Return the live booking and the durable trip record independently; a
/// caller must tolerate either side being null (e.g. after a restart the
/// cache is empty while the ledger persists).
pub async fn get_booking(
    State(state): State<AmbulanceState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let (live, trip) = state.coordinator.get_booking(&id).await;

    if live.is_none() && trip.is_none() {
        return Err(AppError::NotFound("Booking not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "booking": live,
        "trip": trip
    })))
}

/// Upgrade to the notification channel. Clients join topics with
/// `join-zone` / `join-booking` control messages and receive dispatch
/// events as `{"event": ..., "data": ...}` envelopes.
pub async fn ambulance_ws(
    ws: WebSocketUpgrade,
    State(state): State<AmbulanceState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AmbulanceState) {
    info!("Client connected to ambulance notifications");

    let (mut sink, mut stream) = socket.split();

    // All outbound traffic for this connection funnels through one writer.
    let (tx, mut rx) = mpsc::channel::<String>(100);

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(Message::Text(message.into())).await.is_err() {
                break;
            }
        }
    });

    let notifications = state.coordinator.notifications().clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::JoinZone { zone }) => {
                    let zone = if zone.is_empty() {
                        DEFAULT_ZONE.to_string()
                    } else {
                        zone
                    };

                    let receiver = notifications.subscribe(&zone_topic(&zone)).await;
                    spawn_forwarder(receiver, tx.clone());

                    let ack = json!({
                        "event": events::JOINED_ZONE,
                        "data": { "zone": zone }
                    });
                    if tx.send(ack.to_string()).await.is_err() {
                        break;
                    }
                }
                Ok(ClientMessage::JoinBooking { booking_id }) => {
                    if booking_id.is_empty() {
                        continue;
                    }

                    let receiver = notifications.subscribe(&booking_topic(&booking_id)).await;
                    spawn_forwarder(receiver, tx.clone());

                    let ack = json!({
                        "event": events::JOINED_BOOKING,
                        "data": { "bookingId": booking_id }
                    });
                    if tx.send(ack.to_string()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Ignoring unparseable client message: {}", e);
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Client disconnected from ambulance notifications");
}

/// Forward one topic subscription into the connection's writer. The task
/// ends when the connection goes away or the topic channel closes; lagged
/// events are dropped for this subscriber only.
fn spawn_forwarder(mut receiver: TopicReceiver, tx: mpsc::Sender<String>) {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagging, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
