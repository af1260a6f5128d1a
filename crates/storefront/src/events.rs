//! Typed application event bus.
//!
//! Authentication and consent changes fan out to every connected browsing
//! context (tabs subscribe via the SSE endpoint), replacing ambient globals
//! with an explicit channel. Events are fire-and-forget: a slow subscriber
//! that lags simply misses old events and resynchronizes from server state.

use tokio::sync::broadcast;

use atelier_core::{ConsentCategory, UserId};

/// Buffered events per subscriber before lagging drops the oldest.
const BUS_CAPACITY: usize = 64;

/// Application-wide events broadcast to all browsing contexts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A user logged in or their identity changed.
    AuthChanged { user_id: UserId },
    /// A session token refresh began; contexts should hold writes.
    RefreshStarted,
    /// The refresh finished; contexts may resume.
    RefreshComplete,
    /// The user logged out everywhere.
    LogoutBroadcast,
    /// Consent preferences changed; carries the granted categories.
    ConsentChanged { granted: Vec<ConsentCategory> },
}

/// Cloneable handle to the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a new bus.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers that will observe it. Zero is not
    /// an error - events are advisory and state is always refetchable.
    pub fn publish(&self, event: AppEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let delivered = bus.publish(AppEvent::LogoutBroadcast);
        assert_eq!(delivered, 1);
        assert_eq!(rx.recv().await.unwrap(), AppEvent::LogoutBroadcast);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(AppEvent::RefreshStarted), 0);
    }

    #[tokio::test]
    async fn test_all_subscribers_observe_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let event = AppEvent::ConsentChanged {
            granted: vec![ConsentCategory::Necessary, ConsentCategory::Targeting],
        };
        assert_eq!(bus.publish(event.clone()), 2);

        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_auth_change_carries_user() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(AppEvent::AuthChanged {
            user_id: UserId::new(7),
        });

        match rx.recv().await.unwrap() {
            AppEvent::AuthChanged { user_id } => assert_eq!(user_id, UserId::new(7)),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
