//! Configuration change event bus
//!
//! Typed pub/sub channel: per-component subscribers plus wildcard
//! subscribers, each backed by its own bounded mpsc channel. Emission never
//! blocks the emitter, and a saturated or dropped subscriber cannot affect
//! delivery to the others. Per-component emission order is preserved by the
//! channel.

use crate::event::ConfigChangeEvent;
use card_config::ComponentId;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Per-subscriber channel capacity. A panel that stops draining loses its
/// own events (logged), not anyone else's.
const SUBSCRIBER_CAPACITY: usize = 256;

/// Subscription identifier, for targeted unsubscribe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    fn new(scope: &str) -> Self {
        Self(format!("sub_{}_{}", scope, uuid::Uuid::new_v4()))
    }

    /// The id as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::Sender<ConfigChangeEvent>,
}

/// Delivery statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Events passed to `emit`
    pub total_emitted: u64,
    /// Successful subscriber deliveries
    pub total_delivered: u64,
    /// Deliveries dropped (full or closed channel)
    pub dropped: u64,
}

/// The configuration change bus
#[derive(Debug, Default)]
pub struct ConfigEventBus {
    /// Component id → subscriber list
    subscribers: DashMap<ComponentId, Vec<Subscriber>>,
    /// Subscribers receiving every component's events
    wildcard: RwLock<Vec<Subscriber>>,
    stats: Mutex<BusStats>,
}

impl ConfigEventBus {
    /// Create an empty bus
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one component's change events
    ///
    /// Returns the subscription id and the receiving end of the channel.
    #[must_use]
    pub fn subscribe(
        &self,
        component_id: &ComponentId,
    ) -> (SubscriptionId, mpsc::Receiver<ConfigChangeEvent>) {
        let id = SubscriptionId::new(component_id.as_str());
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers
            .entry(component_id.clone())
            .or_default()
            .push(Subscriber {
                id: id.clone(),
                sender: tx,
            });
        debug!(component = %component_id, subscription = id.as_str(), "bus subscription created");
        (id, rx)
    }

    /// Subscribe to every component's change events
    #[must_use]
    pub fn subscribe_all(&self) -> (SubscriptionId, mpsc::Receiver<ConfigChangeEvent>) {
        let id = SubscriptionId::new("all");
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.wildcard.write().push(Subscriber {
            id: id.clone(),
            sender: tx,
        });
        debug!(subscription = id.as_str(), "wildcard bus subscription created");
        (id, rx)
    }

    /// Remove a subscription (per-component or wildcard)
    pub fn unsubscribe(&self, subscription: &SubscriptionId) {
        for mut entry in self.subscribers.iter_mut() {
            entry.value_mut().retain(|s| s.id != *subscription);
        }
        self.wildcard.write().retain(|s| s.id != *subscription);
    }

    /// Drop all subscriptions scoped to one component
    ///
    /// Called when the widget is removed from the canvas.
    pub fn remove_component(&self, component_id: &ComponentId) {
        self.subscribers.remove(component_id);
    }

    /// Deliver an event to the component's subscribers and all wildcard
    /// subscribers
    ///
    /// Never blocks: each delivery is a `try_send`; a full or closed
    /// channel drops that one delivery with a warning. Closed subscribers
    /// are pruned as they are encountered.
    pub fn emit(&self, event: &ConfigChangeEvent) {
        let mut delivered: u64 = 0;
        let mut dropped: u64 = 0;

        if let Some(mut subs) = self.subscribers.get_mut(&event.component_id) {
            Self::deliver(subs.value_mut(), event, &mut delivered, &mut dropped);
        }
        Self::deliver(&mut self.wildcard.write(), event, &mut delivered, &mut dropped);

        let mut stats = self.stats.lock();
        stats.total_emitted += 1;
        stats.total_delivered += delivered;
        stats.dropped += dropped;
    }

    fn deliver(
        subscribers: &mut Vec<Subscriber>,
        event: &ConfigChangeEvent,
        delivered: &mut u64,
        dropped: &mut u64,
    ) {
        subscribers.retain(|sub| match sub.sender.try_send(event.clone()) {
            Ok(()) => {
                *delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    subscription = sub.id.as_str(),
                    component = %event.component_id,
                    "subscriber channel full, dropping event"
                );
                *dropped += 1;
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    subscription = sub.id.as_str(),
                    "subscriber gone, pruning subscription"
                );
                *dropped += 1;
                false
            }
        });
    }

    /// Current delivery statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> BusStats {
        *self.stats.lock()
    }

    /// Number of live subscriptions (component-scoped plus wildcard)
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        let scoped: usize = self.subscribers.iter().map(|e| e.value().len()).sum();
        scoped + self.wildcard.read().len()
    }
}
