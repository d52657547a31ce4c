//! Subscriber registry and fan-out

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::events::event::{EventPayload, EventType, Frame, ALL_PROJECTS};
use crate::events::sink::EventSink;

/// Event bus options
#[derive(Debug, Clone)]
pub struct BusOptions {
    /// Interval between `ping` frames sent to each subscriber
    pub keep_alive_interval: Duration,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            keep_alive_interval: Duration::from_secs(15),
        }
    }
}

struct SubscriberEntry {
    filter: Option<String>,
    sink: Arc<dyn EventSink>,
    keep_alive: Option<JoinHandle<()>>,
}

impl SubscriberEntry {
    fn accepts(&self, project: &str) -> bool {
        self.filter.as_deref().is_none_or(|filter| filter == project)
    }
}

struct Registry {
    subscribers: RwLock<HashMap<u64, SubscriberEntry>>,
    next_id: AtomicU64,
}

impl Registry {
    fn insert(&self, id: u64, entry: SubscriberEntry) -> usize {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers.insert(id, entry);
        subscribers.len()
    }

    fn remove(&self, id: u64) -> bool {
        let (entry, remaining) = {
            let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            let entry = subscribers.remove(&id);
            (entry, subscribers.len())
        };

        match entry {
            Some(entry) => {
                if let Some(keep_alive) = entry.keep_alive {
                    keep_alive.abort();
                }
                info!("Client {} disconnected. Total clients: {}", id, remaining);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Sinks of every subscriber interested in `project`
    fn snapshot(&self, project: &str) -> (Vec<(u64, Arc<dyn EventSink>)>, usize) {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        let targets = subscribers
            .iter()
            .filter(|(_, entry)| entry.accepts(project))
            .map(|(id, entry)| (*id, entry.sink.clone()))
            .collect();
        (targets, subscribers.len())
    }
}

/// Fans out events to live subscribers
///
/// Cloning is cheap; all clones share one registry.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
    options: BusOptions,
}

impl EventBus {
    /// Create a bus with no subscribers
    pub fn new(options: BusOptions) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
            options,
        }
    }

    /// Register a subscriber
    ///
    /// Sends the `connection` frame right away and pings the sink every
    /// keep-alive interval until the subscriber is removed. Must be called
    /// from within a tokio runtime.
    pub fn subscribe(&self, filter: Option<String>, sink: Arc<dyn EventSink>) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
        let scope = filter.clone().unwrap_or_else(|| ALL_PROJECTS.to_string());

        let connection = EventPayload::new(scope.clone()).with_message("SSE connection established");
        match Frame::encode(EventType::Connection, &connection) {
            Ok(frame) => {
                if sink.deliver(&frame).is_err() {
                    debug!("Client {} closed before the connection event", id);
                }
            }
            Err(e) => error!("Failed to encode connection event: {}", e),
        }

        let keep_alive = tokio::spawn(keep_alive(
            id,
            scope,
            sink.clone(),
            Arc::downgrade(&self.registry),
            self.options.keep_alive_interval,
        ));

        let total = self.registry.insert(
            id,
            SubscriberEntry {
                filter: filter.clone(),
                sink,
                keep_alive: Some(keep_alive),
            },
        );
        match &filter {
            Some(project) => info!("Client {} connected for project {}. Total clients: {}", id, project, total),
            None => info!("Client {} connected (all projects). Total clients: {}", id, total),
        }

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every subscriber whose filter matches `payload.project`
    ///
    /// Delivery happens on the caller's task, in registry snapshot order.
    /// Subscribers whose sink is closed or rejects the frame are removed and
    /// never surface an error here. Returns the number of frames delivered.
    pub fn publish(&self, event: EventType, payload: &EventPayload) -> usize {
        let frame = match Frame::encode(event, payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode {} event: {}", event, e);
                return 0;
            }
        };

        let (targets, total) = self.registry.snapshot(&payload.project);
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, sink) in targets {
            if sink.is_closed() {
                dead.push(id);
                continue;
            }
            match sink.deliver(&frame) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(id),
            }
        }

        for id in dead {
            self.registry.remove(id);
        }

        debug!(
            "Event {} sent to {}/{} clients for project {}",
            event, delivered, total, payload.project
        );
        delivered
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusOptions::default())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("options", &self.options)
            .finish()
    }
}

async fn keep_alive(
    id: u64,
    scope: String,
    sink: Arc<dyn EventSink>,
    registry: Weak<Registry>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let alive = match Frame::encode(EventType::Ping, &EventPayload::new(scope.clone())) {
            Ok(frame) => !sink.is_closed() && sink.deliver(&frame).is_ok(),
            Err(e) => {
                error!("Failed to encode ping event: {}", e);
                true
            }
        };

        if !alive {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
            return;
        }
    }
}

/// Handle to a registered subscriber
///
/// Dropping it removes the subscriber and stops its keep-alive.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Connection ID assigned at subscribe time
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
