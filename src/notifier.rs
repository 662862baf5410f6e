//! Fire-and-forget broadcast of filtering state transitions.
//!
//! Subscribers only see events published after they subscribed; a late
//! subscriber must read `FilterStateStore::state()` to catch up.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// Event name used on the dashboard channel.
pub const FILTERING_STATUS_CHANGED: &str = "filtering_status_changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilteringStatusChanged {
    pub is_enabled: bool,
}

impl FilteringStatusChanged {
    pub fn event_name(&self) -> &'static str {
        FILTERING_STATUS_CHANGED
    }
}

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<FilteringStatusChanged>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: FilteringStatusChanged) {
        // No subscribers is not an error; the event is simply dropped.
        match self.tx.send(event) {
            Ok(n) => debug!(
                "Published {} (enabled={}) to {} subscriber(s)",
                FILTERING_STATUS_CHANGED, event.is_enabled, n
            ),
            Err(_) => debug!("Dropped {}: no subscribers", FILTERING_STATUS_CHANGED),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FilteringStatusChanged> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let notifier = ChangeNotifier::new();
        notifier.publish(FilteringStatusChanged { is_enabled: false });
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_late_subscriber_sees_no_backlog() {
        let notifier = ChangeNotifier::new();
        let mut early = notifier.subscribe();
        notifier.publish(FilteringStatusChanged { is_enabled: false });
        let mut late = notifier.subscribe();

        assert_eq!(
            early.try_recv().unwrap(),
            FilteringStatusChanged { is_enabled: false }
        );
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_event_payload_shape() {
        let event = FilteringStatusChanged { is_enabled: true };
        assert_eq!(event.event_name(), "filtering_status_changed");
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"is_enabled":true}"#
        );
    }
}
