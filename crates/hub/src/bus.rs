//! Publish/subscribe with per-platform debouncing.
//!
//! Dispatch is synchronous and FIFO: the ingest path publishes after it has
//! released the state guard, so callbacks are free to call back into the
//! query API. A subscriber that panics is dropped from the set; the rest
//! still get the event.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::{EventKind, HubEvent};

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

pub type SubscriberFn = Box<dyn Fn(&HubEvent) + Send + Sync + 'static>;

pub type SubscriptionId = u64;

struct Subscriber {
    id: SubscriptionId,
    /// `None` subscribes to everything.
    filter: Option<EventKind>,
    once: bool,
    callback: SubscriberFn,
}

#[derive(Default)]
struct BusInner {
    subscribers: Vec<Arc<Subscriber>>,
    next_id: SubscriptionId,
    /// Last emission instant per (fopName, debounce key).
    last_emitted: HashMap<(String, String), Instant>,
}

#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, filter: Option<EventKind>, callback: SubscriberFn) -> SubscriptionId {
        self.add(filter, false, callback)
    }

    /// Delivers the next matching occurrence, then unsubscribes itself.
    pub fn subscribe_once(
        &self,
        filter: Option<EventKind>,
        callback: SubscriberFn,
    ) -> SubscriptionId {
        self.add(filter, true, callback)
    }

    fn add(&self, filter: Option<EventKind>, once: bool, callback: SubscriberFn) -> SubscriptionId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push(Arc::new(Subscriber {
            id,
            filter,
            once,
            callback,
        }));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().subscribers.retain(|s| s.id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Publishes a batch in order. Data events inside the 100 ms window of
    /// the previous emission of the same (fop, key) pair are suppressed;
    /// lifecycle edges always go out.
    pub fn publish(&self, events: Vec<HubEvent>) {
        for event in events {
            self.publish_one(event, Instant::now());
        }
    }

    fn publish_one(&self, event: HubEvent, now: Instant) {
        let targets: Vec<Arc<Subscriber>> = {
            let mut inner = self.inner.lock();

            if !event.kind.is_lifecycle() {
                let key = (
                    event.fop_name.clone().unwrap_or_default(),
                    event.debounce_key(),
                );
                if let Some(last) = inner.last_emitted.get(&key) {
                    if now.duration_since(*last) < DEBOUNCE_WINDOW {
                        tracing::trace!(kind = event.kind.as_wire(), "debounced");
                        return;
                    }
                }
                inner.last_emitted.insert(key, now);
            }

            inner
                .subscribers
                .iter()
                .filter(|s| s.filter.is_none() || s.filter == Some(event.kind))
                .cloned()
                .collect()
        };

        let mut remove: Vec<SubscriptionId> = Vec::new();
        for subscriber in targets {
            let outcome = catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(&event)));
            if outcome.is_err() {
                tracing::warn!(
                    id = subscriber.id,
                    kind = event.kind.as_wire(),
                    "subscriber panicked, removing"
                );
                remove.push(subscriber.id);
            } else if subscriber.once {
                remove.push(subscriber.id);
            }
        }
        if !remove.is_empty() {
            self.inner
                .lock()
                .subscribers
                .retain(|s| !remove.contains(&s.id));
        }
    }

    /// Forgets debounce history. Used on full resets so the first event of
    /// a new connection is never suppressed by the tail of the old one.
    pub fn reset_debounce(&self) {
        self.inner.lock().last_emitted.clear();
    }
}
