//! Router Data Types
//!
//! Message, binding, and delivery-instruction types shared by the router,
//! gateway, and transport layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Courier,
    Customer,
    System,
}

/// Whether a message left the relay or arrived at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// Outcome of a delivery attempt, as reported by the transport collaborator.
///
/// History is a log of attempts, not only successes: a sent message is
/// appended as `Pending` and this field is updated once the transport
/// reports back. `Unsent` means no transport was connected at send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Unsent,
    Failed,
}

/// One entry in a job's chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub job_id: String,
    pub sender: SenderRole,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    /// Delivery outcome for sent messages; `None` for received ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryStatus>,
}

impl ChatMessage {
    /// A message leaving the relay toward a contact phone.
    pub fn sent(job_id: &str, sender: SenderRole, body: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job_id.to_string(),
            sender,
            body: body.to_string(),
            timestamp: Utc::now(),
            direction: Direction::Sent,
            delivery: Some(DeliveryStatus::Pending),
        }
    }

    /// A message received from a contact phone.
    pub fn received(job_id: &str, sender: SenderRole, body: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job_id.to_string(),
            sender,
            body: body.to_string(),
            timestamp: Utc::now(),
            direction: Direction::Received,
            delivery: None,
        }
    }
}

/// A single job↔phone pair from the current binding snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactBinding {
    pub job_id: String,
    pub phone: String,
}

/// Request handed to the messaging transport collaborator. The router never
/// performs delivery itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryInstruction {
    pub destination_phone: String,
    pub body: String,
}

/// Result of routing an outbound message: the appended history entry plus the
/// instruction for the transport layer.
#[derive(Debug, Clone)]
pub struct OutboundRouted {
    pub message: ChatMessage,
    pub instruction: DeliveryInstruction,
}
