use crate::ProgressEvent;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Default number of events a lagging [`broadcast`] receiver can fall behind
/// before it starts missing them.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Something that wants to hear about progress.
///
/// Listeners are called synchronously from [`ProgressBus::publish`] and must
/// not block. Anything slow belongs on the other end of a
/// [`ProgressBus::receiver`].
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}
impl<F> Listener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Handle returned by [`ProgressBus::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Inner {
    listeners: RwLock<Vec<(Subscription, Arc<dyn Listener>)>>,
    channel: broadcast::Sender<ProgressEvent>,
    next_id: AtomicU64,
}

/// Fire-and-forget fan-out of [`ProgressEvent`]s.
///
/// Cloning the bus is cheap and every clone publishes to the same set of
/// listeners. There is no buffering or replay: a listener that subscribes
/// after an event was published never sees it.
///
/// Two kinds of consumers are supported:
/// - callback [`Listener`]s, invoked in-line on the publishing task, and
/// - [`broadcast::Receiver`]s for consumers living on another task or thread.
///   A receiver that falls too far behind gets [`RecvError::Lagged`](broadcast::error::RecvError::Lagged)
///   instead of slowing the pipeline down.
///
/// # Examples
///
/// ```
/// use assetsync_progress::{ProgressBus, ProgressEvent};
///
/// let bus = ProgressBus::default();
/// let subscription = bus.subscribe(|event: &ProgressEvent| println!("{}", event.kind()));
/// bus.publish(ProgressEvent::start("valve.zip", 0));
/// assert!(bus.unsubscribe(subscription));
/// ```
#[derive(Clone)]
pub struct ProgressBus {
    inner: Arc<Inner>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (channel, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                listeners: RwLock::new(Vec::new()),
                channel,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self, listener: impl Listener + 'static) -> Subscription {
        let id = Subscription(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.inner.listeners.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if the subscription was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.inner.listeners.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    /// Open a channel receiver that sees every event published from now on.
    pub fn receiver(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.channel.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        let listeners = self.inner.listeners.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.len() + self.inner.channel.receiver_count()
    }

    /// Deliver an event to every listener and receiver.
    ///
    /// Never blocks and never panics. A panicking listener is discarded for
    /// this event only; the remaining listeners still get it.
    pub fn publish(&self, event: ProgressEvent) {
        // Snapshot so that listeners may (un)subscribe from inside a callback
        // without deadlocking on the lock.
        let listeners: Vec<_> = {
            let guard = self.inner.listeners.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.iter().map(|(id, listener)| (*id, Arc::clone(listener))).collect()
        };
        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))).is_err() {
                tracing::trace!(subscription = id.0, kind = event.kind(), "Progress listener panicked; discarding");
            }
        }
        // Only fails when nobody is listening on the channel.
        _ = self.inner.channel.send(event);
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBus").field("listeners", &self.listener_count()).finish()
    }
}
