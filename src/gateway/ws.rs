//! WebSocket Connection Handling
//!
//! One task per connection: a write loop fed by an unbounded channel, and a
//! read loop that dispatches JSON event frames. Disconnects clean up the
//! client registry and any courier locations reported on that socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::GatewayState;
use super::events::{ClientEvent, error_frame, frame};
use crate::error::RelayError;
use crate::jobs::JobStatus;
use crate::router::{DeliveryStatus, OutboundRouted, SenderRole};

/// Handle a single WebSocket connection through its full lifecycle:
/// register → event loop → cleanup.
pub(crate) async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let conn_id = Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    // Write loop: forwards frames from the channel to the socket.
    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(text) = client_rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!("gateway: write loop closed for {}", write_conn_id);
                break;
            }
        }
    });

    state.register_client(&conn_id, client_tx.clone()).await;

    // Read loop.
    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("gateway: read error on {}: {}", conn_id, e);
                break;
            }
        };

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("gateway: invalid frame from {}: {}", conn_id, e);
                let _ = client_tx.send(error_frame("frame", "invalid event frame"));
                continue;
            }
        };

        handle_event(&state, &conn_id, &client_tx, event).await;
    }

    // Cleanup.
    state.remove_client(&conn_id).await;
    let removed = state.tracker.remove_by_conn(&conn_id).await;
    if !removed.is_empty() {
        tracing::info!(
            "gateway: cleared location(s) for courier(s) {:?} after disconnect",
            removed
        );
    }
    write_handle.abort();
}

/// Dispatch one client event. Replies go to the requesting socket via
/// `reply`; everything observable by other clients is broadcast.
pub(crate) async fn handle_event(
    state: &Arc<GatewayState>,
    conn_id: &str,
    reply: &mpsc::UnboundedSender<String>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::ClientMessage { from_phone, body } => {
            if let Some((job_id, message)) = state.router.route_inbound(&from_phone, &body).await {
                state
                    .broadcast(
                        "new_message",
                        serde_json::json!({ "job_id": job_id, "message": message }),
                    )
                    .await;
            }
            // Unroutable inbound traffic is logged and dropped by the router;
            // nobody is waiting on it.
        }

        ClientEvent::SendMessage {
            job_id,
            body,
            sender_role,
        } => {
            let sender = sender_role.unwrap_or(SenderRole::Customer);
            let routed = match state.router.route_outbound(&job_id, &body, sender).await {
                Ok(routed) => routed,
                Err(e) => {
                    tracing::warn!("gateway: send_message for job {} failed: {}", job_id, e);
                    let _ = reply.send(error_frame("send_message", &e));
                    return;
                }
            };
            let OutboundRouted {
                message,
                instruction,
            } = routed;
            let message_id = message.id;

            // Delivery happens here, outside the router lock.
            let report = state.transport.deliver(&instruction).await;
            let status = match &report {
                Ok(()) => DeliveryStatus::Delivered,
                Err(RelayError::NotConnected) => DeliveryStatus::Unsent,
                Err(_) => DeliveryStatus::Failed,
            };
            if let Err(e) = &report {
                tracing::warn!("gateway: delivery for job {} failed: {}", job_id, e);
                let _ = reply.send(error_frame("send_message", e));
            }

            let message = state
                .router
                .mark_delivery(&job_id, message_id, status)
                .await
                .unwrap_or_else(|| {
                    let mut m = message;
                    m.delivery = Some(status);
                    m
                });

            state
                .broadcast(
                    "message_sent",
                    serde_json::json!({ "job_id": job_id, "message": message }),
                )
                .await;
        }

        ClientEvent::AcceptJob { job_id } => {
            job_transition(state, reply, "accept_job", &job_id, JobStatus::Accepted).await;
        }
        ClientEvent::CompleteJob { job_id } => {
            job_transition(state, reply, "complete_job", &job_id, JobStatus::Completed).await;
        }
        ClientEvent::CancelJob { job_id } => {
            job_transition(state, reply, "cancel_job", &job_id, JobStatus::Cancelled).await;
        }

        ClientEvent::LocationUpdate {
            courier_id,
            location,
            timestamp,
        } => {
            let entry = state
                .tracker
                .update(&courier_id, location, timestamp, conn_id)
                .await;
            state
                .broadcast(
                    "courier_location_updated",
                    serde_json::json!({
                        "courier_id": entry.courier_id,
                        "location": entry.location,
                        "timestamp": entry.timestamp,
                    }),
                )
                .await;
        }

        ClientEvent::GetCourierLocation { courier_id } => {
            let payload = match state.tracker.get(&courier_id).await {
                Some(loc) => serde_json::json!({
                    "courier_id": courier_id,
                    "location": loc.location,
                    "timestamp": loc.timestamp,
                    "success": true,
                }),
                None => serde_json::json!({
                    "courier_id": courier_id,
                    "success": false,
                }),
            };
            let _ = reply.send(frame("courier_location", payload));
        }
    }
}

async fn job_transition(
    state: &Arc<GatewayState>,
    reply: &mpsc::UnboundedSender<String>,
    context: &str,
    job_id: &str,
    next: JobStatus,
) {
    match state.jobs.set_status(job_id, next).await {
        Ok(job) => {
            state
                .broadcast("job_updated", serde_json::json!({ "job": job }))
                .await;
        }
        Err(e) => {
            tracing::warn!("gateway: {} for job {} failed: {}", context, job_id, e);
            let _ = reply.send(error_frame(context, &e));
        }
    }
}
