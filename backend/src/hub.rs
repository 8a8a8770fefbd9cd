//! Broadcast hub: a single task owning the subscriber registry.
//!
//! Everything that touches the registry goes through one bounded mailbox and
//! is handled in arrival order by [`Hub::run`]. Subscribers get a bounded
//! outbound queue whose only sender lives inside the registry, so removing a
//! subscriber from the registry is what closes its queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use shared::models::Poll;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

pub type SubscriberId = u64;

/// Serialized poll snapshot, shared between every queue it is pushed onto.
pub type Payload = Arc<str>;

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub queue_capacity: usize,
    pub mailbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HubError {
    #[error("Broadcast hub has stopped")]
    Stopped,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    queue: mpsc::Sender<Payload>,
}

#[derive(Debug)]
enum HubEvent {
    Register {
        poll_id: String,
        subscriber: Subscriber,
    },
    Unregister {
        poll_id: String,
        id: SubscriberId,
    },
    Broadcast(Poll),
    Count {
        poll_id: String,
        reply: oneshot::Sender<usize>,
    },
}

/// Receiving side handed to a newly registered subscriber.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub poll_id: String,
    pub queue: mpsc::Receiver<Payload>,
}

/// Cloneable front door to the hub task.
#[derive(Debug, Clone)]
pub struct HubHandle {
    mailbox: mpsc::Sender<HubEvent>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

pub struct Hub {
    subscribers: HashMap<String, Vec<Subscriber>>,
    mailbox: mpsc::Receiver<HubEvent>,
}

impl Hub {
    pub fn new(config: HubConfig) -> (Hub, HubHandle) {
        let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let hub = Hub {
            subscribers: HashMap::new(),
            mailbox: rx,
        };
        let handle = HubHandle {
            mailbox: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: config.queue_capacity.max(1),
        };
        (hub, handle)
    }

    /// Starts the hub on the current tokio runtime.
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (hub, handle) = Hub::new(config);
        tokio::spawn(hub.run());
        handle
    }

    /// Processes events until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("Broadcast hub started");
        while let Some(event) = self.mailbox.recv().await {
            self.handle(event);
        }
        info!("Broadcast hub stopped");
    }

    fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register { poll_id, subscriber } => {
                debug!(%poll_id, subscriber = subscriber.id, "registered subscriber");
                self.subscribers.entry(poll_id).or_default().push(subscriber);
            }
            HubEvent::Unregister { poll_id, id } => self.remove(&poll_id, id),
            HubEvent::Broadcast(poll) => self.broadcast(&poll),
            HubEvent::Count { poll_id, reply } => {
                let count = self.subscribers.get(&poll_id).map_or(0, Vec::len);
                let _ = reply.send(count);
            }
        }
    }

    fn remove(&mut self, poll_id: &str, id: SubscriberId) {
        let Some(list) = self.subscribers.get_mut(poll_id) else {
            return;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        if list.len() != before {
            debug!(poll_id, subscriber = id, "unregistered subscriber");
        }
        if list.is_empty() {
            self.subscribers.remove(poll_id);
        }
    }

    fn broadcast(&mut self, poll: &Poll) {
        let Some(list) = self.subscribers.get_mut(&poll.id) else {
            return;
        };

        let payload: Payload = match serde_json::to_string(poll) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(poll_id = %poll.id, "Could not serialize poll for broadcast: {}", e);
                return;
            }
        };

        list.retain(|subscriber| match subscriber.queue.try_send(Arc::clone(&payload)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(poll_id = %poll.id, subscriber = subscriber.id, "outbound queue full, dropping subscriber");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(poll_id = %poll.id, subscriber = subscriber.id, "subscriber went away");
                false
            }
        });

        if list.is_empty() {
            self.subscribers.remove(&poll.id);
        }
    }
}

impl HubHandle {
    pub async fn register(&self, poll_id: &str) -> Result<Subscription, HubError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.send(HubEvent::Register {
            poll_id: poll_id.to_string(),
            subscriber: Subscriber { id, queue: tx },
        })
        .await?;

        Ok(Subscription {
            id,
            poll_id: poll_id.to_string(),
            queue: rx,
        })
    }

    /// Removes the subscriber and closes its queue. Safe to call twice.
    pub async fn unregister(&self, poll_id: &str, id: SubscriberId) -> Result<(), HubError> {
        self.send(HubEvent::Unregister {
            poll_id: poll_id.to_string(),
            id,
        })
        .await
    }

    /// Queues `poll` for delivery to its subscribers. Waits only for mailbox
    /// space, never for subscribers.
    pub async fn broadcast(&self, poll: Poll) -> Result<(), HubError> {
        self.send(HubEvent::Broadcast(poll)).await
    }

    pub async fn subscriber_count(&self, poll_id: &str) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::Count {
            poll_id: poll_id.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    async fn send(&self, event: HubEvent) -> Result<(), HubError> {
        self.mailbox.send(event).await.map_err(|_| HubError::Stopped)
    }
}
