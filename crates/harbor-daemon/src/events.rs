//! Live event fan-out.
//!
//! Committed vault and token events are persisted first, then published
//! here. A subscriber that falls more than the buffer behind sees
//! `RecvError::Lagged` and skips ahead; the node never waits on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use harbor_types::{Event, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default subscriber buffer.
pub const EVENT_BUFFER: usize = 1000;

/// Filter for event queries and subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Event names to keep, e.g. "Deposit". `None` keeps all.
    #[serde(default)]
    pub names: Option<Vec<String>>,
    /// Drop events recorded before this time.
    #[serde(default)]
    pub since: Option<Timestamp>,
}

/// Fan-out of committed events to live subscribers.
///
/// Cloning shares the channel and the published count.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    published: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish `events` in order. Returns how many subscribers were listening.
    pub fn publish(&self, events: impl IntoIterator<Item = Event>) -> usize {
        let mut listeners = 0;
        for event in events {
            self.published.fetch_add(1, Ordering::Relaxed);
            // Err only means nobody is subscribed right now.
            listeners = self.tx.send(event).unwrap_or(0);
        }
        listeners
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Events published since start.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl EventFilter {
    /// True if `event` passes both the name and the time filter.
    pub fn matches(&self, event: &Event) -> bool {
        let name_ok = self
            .names
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == event.kind.name()));
        let time_ok = self.since.map_or(true, |since| event.timestamp >= since);
        name_ok && time_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_types::{Address, EventKind};

    fn deposit(timestamp: Timestamp) -> Event {
        Event {
            timestamp,
            kind: EventKind::Deposit {
                account: Address::derive("alice"),
                amount: 10,
            },
        }
    }

    #[test]
    fn test_publish_reaches_subscribers_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let delivered = bus.publish([deposit(1000), deposit(1001)]);
        assert_eq!(delivered, 1);
        assert_eq!(rx.try_recv().expect("first").timestamp, 1000);
        assert_eq!(rx.try_recv().expect("second").timestamp, 1001);
        assert_eq!(bus.published(), 2);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish([deposit(1000)]), 0);
        assert_eq!(bus.published(), 1);
    }

    #[test]
    fn test_event_filter_names() {
        let filter = EventFilter {
            names: Some(vec!["Withdrawal".to_string()]),
            since: None,
        };
        assert!(!filter.matches(&deposit(1000)));

        let filter = EventFilter {
            names: Some(vec!["Deposit".to_string()]),
            since: None,
        };
        assert!(filter.matches(&deposit(1000)));
    }

    #[test]
    fn test_event_filter_since() {
        let filter = EventFilter {
            names: None,
            since: Some(2000),
        };
        assert!(!filter.matches(&deposit(1999)));
        assert!(filter.matches(&deposit(2000)));
        assert!(EventFilter::default().matches(&deposit(0)));
    }
}
