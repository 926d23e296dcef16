//! Log Transport
//!
//! Development/demo transport: deliveries are logged instead of sent.
//! Stands in for the external messaging hop in local setups and tests.

use async_trait::async_trait;

use super::MessageTransport;
use crate::error::Result;
use crate::router::DeliveryInstruction;

pub struct LogTransport;

#[async_trait]
impl MessageTransport for LogTransport {
    async fn deliver(&self, instruction: &DeliveryInstruction) -> Result<()> {
        tracing::info!(
            "transport: [log] deliver to {}: {}",
            instruction.destination_phone,
            preview(&instruction.body, 80),
        );
        Ok(())
    }

    fn describe(&self) -> &str {
        "log transport"
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a
/// UTF-8 char.
fn preview(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
