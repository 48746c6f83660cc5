use chainflow_core::audit::{AuditEvent, AuditSink};
use chainflow_db::notification::{Notification, NotificationDispatcher, NotificationError};
use tracing::info;

/// Writes audit events to the structured log.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = "audit.event",
            audit_event = %event.event_type,
            correlation_id = %event.correlation_id,
            item_id = event.item_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            actor = %event.actor,
            category = ?event.category,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "audit event recorded"
        );
    }
}

/// Logs notifications instead of delivering them.
pub struct TracingNotificationDispatcher;

#[async_trait::async_trait]
impl NotificationDispatcher for TracingNotificationDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(&notification)
            .map_err(|error| NotificationError::Delivery(error.to_string()))?;
        info!(
            event_name = notification.event_name(),
            recipient = %notification.recipient().email,
            payload = %payload,
            "notification queued"
        );
        Ok(())
    }
}
