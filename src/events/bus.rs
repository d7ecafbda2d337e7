//! Concurrent publish/subscribe registry keyed by session id.
//!
//! Subscriber lists are immutable snapshots (`Arc<Vec<_>>`) stored in a
//! `DashMap`. Subscribing or unsubscribing replaces a session's snapshot under
//! that key's shard lock; publishing clones the current snapshot and releases
//! the lock before invoking any callback. Sessions never contend with each
//! other beyond sharing a shard, and a callback can subscribe or unsubscribe
//! from inside `publish` without deadlocking.
//!
//! A publish that races with an unsubscribe may still deliver to the callback
//! being removed. Events are best-effort progress notifications, so this is
//! accepted.

use dashmap::DashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::mpsc;
use tracing::warn;

use scribe_common::ProgressEvent;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Subscriber<E> {
    id: u64,
    callback: Callback<E>,
}

impl<E> Clone for Subscriber<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Type-erased removal, so `Subscription` doesn't carry the event type.
trait Registry: Send + Sync {
    fn remove(&self, key: &str, id: u64);
}

pub struct EventBus<E> {
    subscribers: DashMap<String, Arc<Vec<Subscriber<E>>>>,
    next_id: AtomicU64,
}

/// The bus the orchestrator publishes progress on.
pub type ProgressBus = EventBus<ProgressEvent>;

static GLOBAL_PROGRESS_BUS: OnceLock<Arc<ProgressBus>> = OnceLock::new();

/// Process-wide progress bus.
pub fn global_progress_bus() -> Arc<ProgressBus> {
    Arc::clone(GLOBAL_PROGRESS_BUS.get_or_init(|| Arc::new(ProgressBus::new())))
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E: Send + Sync + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events published under `session_id`.
    ///
    /// The callback stays registered until the returned handle is
    /// unsubscribed or dropped.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(self: &Arc<Self>, session_id: &str, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let subscriber = Subscriber {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            callback: Arc::new(callback),
        };
        let id = subscriber.id;

        self.subscribers
            .entry(session_id.to_string())
            .and_modify(|list| {
                let mut next = Vec::with_capacity(list.len() + 1);
                next.extend(list.iter().cloned());
                next.push(subscriber.clone());
                *list = Arc::new(next);
            })
            .or_insert_with(|| Arc::new(vec![subscriber.clone()]));

        let registry: Weak<dyn Registry> = Arc::downgrade(self) as Weak<dyn Registry>;
        Subscription {
            registry,
            key: session_id.to_string(),
            id,
            removed: AtomicBool::new(false),
        }
    }

    /// Deliver `event` to every callback currently registered for `session_id`.
    ///
    /// A panicking callback is logged and skipped; delivery to the rest
    /// continues and the panic never reaches the publisher. Returns the number
    /// of callbacks that completed normally.
    pub fn publish(&self, session_id: &str, event: &E) -> usize {
        let snapshot = match self.subscribers.get(session_id) {
            Some(list) => Arc::clone(list.value()),
            None => return 0,
        };

        let mut delivered = 0;
        for subscriber in snapshot.iter() {
            let callback = &subscriber.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(
                    session_id,
                    subscriber = subscriber.id,
                    "progress subscriber panicked; continuing delivery"
                ),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.subscribers
            .get(session_id)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    /// Number of session ids with at least one subscriber.
    pub fn session_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<E: Clone + Send + Sync + 'static> EventBus<E> {
    /// Subscribe through an unbounded channel, for async observers.
    pub fn subscribe_channel(
        self: &Arc<Self>,
        session_id: &str,
    ) -> (Subscription, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(session_id, move |event: &E| {
            // receiver gone means the observer stopped listening
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }
}

impl<E: Send + Sync + 'static> Registry for EventBus<E> {
    fn remove(&self, key: &str, id: u64) {
        if let Some(mut list) = self.subscribers.get_mut(key)
            && list.iter().any(|s| s.id == id)
        {
            let next: Vec<_> = list.iter().filter(|s| s.id != id).cloned().collect();
            *list = Arc::new(next);
        }
        self.subscribers.remove_if(key, |_, list| list.is_empty());
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Unsubscribing is idempotent and safe to race with `publish`; the
/// subscription is removed at most once. Dropping the handle unsubscribes.
pub struct Subscription {
    registry: Weak<dyn Registry>,
    key: String,
    id: u64,
    removed: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if self.removed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.key, self.id);
        }
    }

    pub fn session_id(&self) -> &str {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        !self.removed.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("session_id", &self.key)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting(count: &Arc<AtomicUsize>) -> impl Fn(&String) + Send + Sync + 'static {
        let count = Arc::clone(count);
        move |_: &String| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_publish_is_isolated_per_session() {
        let bus = Arc::new(EventBus::<String>::new());
        let (a1, a2, b) = (counter(), counter(), counter());

        let sub_a1 = bus.subscribe("A", counting(&a1));
        let _sub_a2 = bus.subscribe("A", counting(&a2));
        let _sub_b = bus.subscribe("B", counting(&b));

        assert_eq!(bus.publish("A", &"first".to_string()), 2);
        assert_eq!(a1.load(Ordering::SeqCst), 1);
        assert_eq!(a2.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 0);

        sub_a1.unsubscribe();
        bus.publish("A", &"second".to_string());
        assert_eq!(a1.load(Ordering::SeqCst), 1);
        assert_eq!(a2.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = Arc::new(EventBus::<String>::new());
        assert_eq!(bus.publish("nobody", &"x".to_string()), 0);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_delivery() {
        let bus = Arc::new(EventBus::<String>::new());
        let after = counter();
        let _bad = bus.subscribe("A", |_: &String| panic!("observer bug"));
        let _good = bus.subscribe("A", counting(&after));

        let delivered = bus.publish("A", &"event".to_string());
        assert_eq!(delivered, 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_twice_is_noop() {
        let bus = Arc::new(EventBus::<String>::new());
        let count = counter();
        let sub = bus.subscribe("A", counting(&count));
        let _other = bus.subscribe("A", counting(&count));

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(bus.subscriber_count("A"), 1);
    }

    #[test]
    fn test_drop_unsubscribes_and_prunes_empty_sessions() {
        let bus = Arc::new(EventBus::<String>::new());
        {
            let _sub = bus.subscribe("A", |_: &String| {});
            assert_eq!(bus.session_count(), 1);
        }
        assert_eq!(bus.subscriber_count("A"), 0);
        assert_eq!(bus.session_count(), 0);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = Arc::new(EventBus::<String>::new());
        let sub = bus.subscribe("A", |_: &String| {});
        drop(bus);
        sub.unsubscribe();
    }

    #[test]
    fn test_callback_may_unsubscribe_during_publish() {
        let bus = Arc::new(EventBus::<String>::new());
        let slot: Arc<std::sync::Mutex<Option<Subscription>>> = Arc::default();
        let slot_clone = Arc::clone(&slot);
        let sub = bus.subscribe("A", move |_: &String| {
            if let Some(sub) = slot_clone.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(bus.publish("A", &"x".to_string()), 1);
        assert_eq!(bus.subscriber_count("A"), 0);
    }

    #[test]
    fn test_concurrent_subscribe_publish_unsubscribe() {
        let bus = Arc::new(EventBus::<String>::new());
        let total = counter();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let bus = Arc::clone(&bus);
                let total = Arc::clone(&total);
                scope.spawn(move || {
                    let session = format!("session-{}", t % 2);
                    for _ in 0..200 {
                        let sub = bus.subscribe(&session, counting(&total));
                        bus.publish(&session, &"tick".to_string());
                        sub.unsubscribe();
                    }
                });
            }
        });

        // every publish saw at least its own subscriber
        assert!(total.load(Ordering::SeqCst) >= 8 * 200);
        assert_eq!(bus.session_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_channel_receives_events() {
        let bus = Arc::new(EventBus::<String>::new());
        let (sub, mut rx) = bus.subscribe_channel("A");
        bus.publish("A", &"one".to_string());
        bus.publish("A", &"two".to_string());
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(rx.recv().await.as_deref(), Some("two"));
        drop(sub);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_global_bus_is_shared() {
        let a = global_progress_bus();
        let b = global_progress_bus();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
