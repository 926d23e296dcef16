//! Courier Location Tracking
//!
//! Latest known GPS position per courier, fed by `location_update` socket
//! events. Positions are tied to the reporting connection so a courier's
//! entry disappears when their socket drops.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;

/// Latest reported position for one courier. The location payload
/// (lat/lng/accuracy/heading) is opaque to the relay.
#[derive(Debug, Clone, Serialize)]
pub struct CourierLocation {
    pub courier_id: String,
    pub location: serde_json::Value,
    /// Client-reported timestamp (ms since epoch); server time when absent.
    pub timestamp: i64,
    #[serde(skip)]
    pub conn_id: String,
}

/// In-memory map of courier positions.
#[derive(Default)]
pub struct LocationTracker {
    inner: RwLock<HashMap<String, CourierLocation>>,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a courier's position, replacing any previous entry. Returns the
    /// stored record for broadcasting.
    pub async fn update(
        &self,
        courier_id: &str,
        location: serde_json::Value,
        timestamp: Option<i64>,
        conn_id: &str,
    ) -> CourierLocation {
        let entry = CourierLocation {
            courier_id: courier_id.to_string(),
            location,
            timestamp: timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
            conn_id: conn_id.to_string(),
        };
        self.inner
            .write()
            .await
            .insert(courier_id.to_string(), entry.clone());
        tracing::debug!("tracking: location update from courier {}", courier_id);
        entry
    }

    pub async fn get(&self, courier_id: &str) -> Option<CourierLocation> {
        self.inner.read().await.get(courier_id).cloned()
    }

    /// Drop every courier whose position came from the given connection.
    /// Returns the removed courier ids.
    pub async fn remove_by_conn(&self, conn_id: &str) -> Vec<String> {
        let mut map = self.inner.write().await;
        let removed: Vec<String> = map
            .iter()
            .filter(|(_, loc)| loc.conn_id == conn_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &removed {
            map.remove(id);
            tracing::debug!("tracking: removed courier {} after disconnect", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_and_get() {
        let tracker = LocationTracker::new();
        tracker
            .update("kurir-1", json!({"lat": -6.2, "lng": 106.8}), Some(1000), "conn-a")
            .await;

        let loc = tracker.get("kurir-1").await.unwrap();
        assert_eq!(loc.timestamp, 1000);
        assert_eq!(loc.location["lat"], -6.2);
        assert!(tracker.get("kurir-2").await.is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_previous() {
        let tracker = LocationTracker::new();
        tracker.update("kurir-1", json!({"lat": 1.0}), Some(1), "a").await;
        tracker.update("kurir-1", json!({"lat": 2.0}), Some(2), "b").await;

        let loc = tracker.get("kurir-1").await.unwrap();
        assert_eq!(loc.location["lat"], 2.0);
        assert_eq!(tracker.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_timestamp_uses_server_time() {
        let tracker = LocationTracker::new();
        let loc = tracker.update("kurir-1", json!({}), None, "a").await;
        assert!(loc.timestamp > 0);
    }

    #[tokio::test]
    async fn test_remove_by_conn() {
        let tracker = LocationTracker::new();
        tracker.update("kurir-1", json!({}), Some(1), "conn-a").await;
        tracker.update("kurir-2", json!({}), Some(1), "conn-a").await;
        tracker.update("kurir-3", json!({}), Some(1), "conn-b").await;

        let mut removed = tracker.remove_by_conn("conn-a").await;
        removed.sort();
        assert_eq!(removed, vec!["kurir-1".to_string(), "kurir-2".to_string()]);
        assert_eq!(tracker.len().await, 1);
        assert!(tracker.get("kurir-3").await.is_some());
    }
}
