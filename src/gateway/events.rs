//! Gateway Event Protocol
//!
//! JSON frames over the WebSocket, tagged by an `event` field. Inbound
//! frames deserialize into [`ClientEvent`]; outbound frames are built with
//! [`frame`] so every broadcast carries the same shape.

use serde::Deserialize;

use crate::router::SenderRole;

/// Frames a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// An inbound chat message from a contact phone (relayed by the
    /// messaging side of the bridge).
    ClientMessage { from_phone: String, body: String },

    /// Ask the relay to send a message to the contact bound to a job.
    SendMessage {
        job_id: String,
        body: String,
        #[serde(default)]
        sender_role: Option<SenderRole>,
    },

    /// Job lifecycle transitions.
    AcceptJob { job_id: String },
    CompleteJob { job_id: String },
    CancelJob { job_id: String },

    /// Courier GPS position report.
    LocationUpdate {
        courier_id: String,
        location: serde_json::Value,
        #[serde(default)]
        timestamp: Option<i64>,
    },

    /// Ask for a courier's last known position (replied to the requesting
    /// socket only).
    GetCourierLocation { courier_id: String },
}

/// Serialize an outbound frame: the payload object with `event` injected.
pub fn frame(event: &str, mut payload: serde_json::Value) -> String {
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("event".to_string(), serde_json::Value::String(event.to_string()));
    }
    payload.to_string()
}

/// An `error` frame addressed to the requesting client.
pub fn error_frame(context: &str, message: impl std::fmt::Display) -> String {
    frame(
        "error",
        serde_json::json!({
            "context": context,
            "message": message.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_client_message() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "client_message", "from_phone": "+62 812-1", "body": "otw"}"#,
        )
        .unwrap();
        match event {
            ClientEvent::ClientMessage { from_phone, body } => {
                assert_eq!(from_phone, "+62 812-1");
                assert_eq!(body, "otw");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_send_message_with_default_role() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "send_message", "job_id": "ORD1", "body": "where are you?"}"#,
        )
        .unwrap();
        match event {
            ClientEvent::SendMessage { sender_role, .. } => assert!(sender_role.is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_location_update() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event": "location_update", "courier_id": "kurir-1",
                "location": {"lat": -6.2, "lng": 106.8}, "timestamp": 1700000000000}"#,
        )
        .unwrap();
        match event {
            ClientEvent::LocationUpdate {
                courier_id,
                timestamp,
                ..
            } => {
                assert_eq!(courier_id, "kurir-1");
                assert_eq!(timestamp, Some(1_700_000_000_000));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_fails() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"event": "reboot_server"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_injects_event_field() {
        let text = frame("new_message", json!({"job_id": "ORD1"}));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "new_message");
        assert_eq!(value["job_id"], "ORD1");
    }

    #[test]
    fn test_error_frame_shape() {
        let text = error_frame("send_message", "no contact available for job ORD1");
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "error");
        assert_eq!(value["context"], "send_message");
        assert!(value["message"].as_str().unwrap().contains("ORD1"));
    }
}
