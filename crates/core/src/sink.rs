//! Notification sink seam.
//!
//! Fire-and-forget: the engine never learns whether an event was delivered,
//! and a slow or absent observer must never block pipeline execution.

/// Receives lifecycle events for observers.
///
/// `channel` is a routing key (see [`crate::events::project_channel`]),
/// `event` one of the [`crate::events`] constants, and `payload` the
/// event-specific JSON body.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, channel: &str, event: &str, payload: serde_json::Value);
}
