//! Real-time push transport: one outbound channel per connected identity.
//!
//! Delivery is fire-and-forget. A send failure (receiver dropped mid
//! disconnect) is logged and swallowed; it never propagates to the caller.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::alerts::model::Alert;

/// Fire-and-forget push to a single subscriber.
pub trait Notifier: Send + Sync {
    fn deliver(&self, identity: &str, alert: &Alert);
}

#[derive(Default)]
pub struct LiveHub {
    subscribers: RwLock<HashMap<String, mpsc::UnboundedSender<Alert>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `identity`, returning both channel halves.
    /// A reconnect replaces the previous channel; the stale sender is
    /// dropped and its socket task winds down on the closed receiver. The
    /// returned sender identifies this connection's entry to
    /// [`unsubscribe`].
    ///
    /// [`unsubscribe`]: LiveHub::unsubscribe
    pub fn subscribe(
        &self,
        identity: &str,
    ) -> (mpsc::UnboundedSender<Alert>, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .expect("live hub lock poisoned")
            .insert(identity.to_string(), tx.clone());
        (tx, rx)
    }

    /// Remove `identity`'s entry only while it still belongs to `channel`.
    /// When a reconnect has already replaced the entry, the old
    /// connection's teardown must leave the replacement in place.
    pub fn unsubscribe(&self, identity: &str, channel: &mpsc::UnboundedSender<Alert>) {
        let mut subscribers = self.subscribers.write().expect("live hub lock poisoned");
        if subscribers
            .get(identity)
            .is_some_and(|stored| stored.same_channel(channel))
        {
            subscribers.remove(identity);
        }
    }

    pub fn connected_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("live hub lock poisoned")
            .len()
    }
}

impl Notifier for LiveHub {
    fn deliver(&self, identity: &str, alert: &Alert) {
        let subscribers = self.subscribers.read().expect("live hub lock poisoned");
        match subscribers.get(identity) {
            Some(tx) => {
                if tx.send(alert.clone()).is_err() {
                    warn!("dropping alert {} for {}: channel closed", alert.id, identity);
                } else {
                    metrics::counter!("beacon_notifications_delivered_total").increment(1);
                }
            }
            None => debug!("no live channel for {}, skipping alert {}", identity, alert.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::model::{AlertStatus, AlertType, Severity};
    use crate::geo::GeoPoint;
    use uuid::Uuid;

    fn sample_alert() -> Alert {
        let now = chrono::Utc::now().naive_utc();
        Alert {
            id: Uuid::new_v4(),
            title: "Flooded underpass".to_string(),
            description: "Avoid 3rd street".to_string(),
            alert_type: AlertType::Hazard,
            severity: Severity::Medium,
            status: AlertStatus::Active,
            location: GeoPoint::new(40.7128, -74.0060).unwrap(),
            owner_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn delivers_to_a_subscribed_identity() {
        let hub = LiveHub::new();
        let (_tx, mut rx) = hub.subscribe("alice@example.com");

        let alert = sample_alert();
        hub.deliver("alice@example.com", &alert);

        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.id, alert.id);
    }

    #[tokio::test]
    async fn delivery_to_unknown_identity_is_a_no_op() {
        let hub = LiveHub::new();
        hub.deliver("nobody@example.com", &sample_alert());
        assert_eq!(hub.connected_count(), 0);
    }

    #[tokio::test]
    async fn delivery_after_receiver_dropped_does_not_panic() {
        let hub = LiveHub::new();
        let (_tx, rx) = hub.subscribe("alice@example.com");
        drop(rx);
        hub.deliver("alice@example.com", &sample_alert());
    }

    #[tokio::test]
    async fn resubscribe_replaces_the_previous_channel() {
        let hub = LiveHub::new();
        let (_old_tx, mut old_rx) = hub.subscribe("alice@example.com");
        let (_new_tx, mut new_rx) = hub.subscribe("alice@example.com");
        assert_eq!(hub.connected_count(), 1);

        hub.deliver("alice@example.com", &sample_alert());
        assert!(new_rx.recv().await.is_some());
        assert!(old_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_removes_the_channel() {
        let hub = LiveHub::new();
        let (tx, _rx) = hub.subscribe("alice@example.com");
        hub.unsubscribe("alice@example.com", &tx);
        assert_eq!(hub.connected_count(), 0);
    }

    // An old connection tearing down after its identity reconnected must
    // not take out the replacement channel.
    #[tokio::test]
    async fn unsubscribe_with_stale_channel_keeps_the_replacement() {
        let hub = LiveHub::new();
        let (old_tx, _old_rx) = hub.subscribe("alice@example.com");
        let (_new_tx, mut new_rx) = hub.subscribe("alice@example.com");

        hub.unsubscribe("alice@example.com", &old_tx);
        assert_eq!(hub.connected_count(), 1);

        hub.deliver("alice@example.com", &sample_alert());
        assert!(new_rx.recv().await.is_some());
    }
}
