//! System bus: cooperative executor with type-generic and keyed
//! subscriptions (spec §4.10). Used for configuration, lifecycle, and
//! command events — anything that isn't on the per-order hot path.
//!
//! `post::<T>(msg)` does not invoke handlers inline: it enqueues a task
//! that, when [`SystemBus::poll`] next runs (on whichever thread owns
//! this bus — typically the network thread's cooperative executor),
//! invokes every type-generic subscriber for `T` plus every keyed
//! subscriber whose key matches `msg`'s routing key. Subscribers can be
//! added and removed by identity at any time.

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by `subscribe`/`subscribe_keyed`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type AnyHandler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

#[derive(Default)]
struct TypeSubscribers {
    generic: Vec<(SubscriberId, AnyHandler)>,
    keyed: DashMap<u64, Vec<(SubscriberId, AnyHandler)>>,
}

/// Types posted on the system bus must be able to name a routing key for
/// keyed subscriptions (e.g. an enum discriminant). Types with no natural
/// key use `()`.
pub trait SystemKey {
    fn system_key(&self) -> u64 {
        0
    }
}

pub struct SystemBus {
    next_id: AtomicU64,
    subscribers: DashMap<TypeId, TypeSubscribers>,
    id_types: DashMap<u64, TypeId>,
    tasks: crate::queues::MpmcQueue<Box<dyn FnOnce() + Send>>,
}

const DEFAULT_TASK_CAPACITY: usize = 4096;

impl Default for SystemBus {
    fn default() -> Self {
        SystemBus {
            next_id: AtomicU64::new(1),
            subscribers: DashMap::new(),
            id_types: DashMap::new(),
            tasks: crate::queues::MpmcQueue::new(DEFAULT_TASK_CAPACITY),
        }
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribes `handler` to every message of type `T`, regardless of key.
    pub fn subscribe<T: Any + 'static>(
        &self,
        handler: impl Fn(&T) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_id();
        let type_id = TypeId::of::<T>();
        let wrapped: AnyHandler = Arc::new(move |any: &dyn Any| {
            if let Some(msg) = any.downcast_ref::<T>() {
                handler(msg);
            }
        });
        self.subscribers
            .entry(type_id)
            .or_default()
            .generic
            .push((id, wrapped));
        self.id_types.insert(id.0, type_id);
        id
    }

    /// Subscribes `handler` to messages of type `T` whose [`SystemKey`]
    /// equals `key`.
    pub fn subscribe_keyed<T: Any + SystemKey + 'static>(
        &self,
        key: u64,
        handler: impl Fn(&T) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_id();
        let type_id = TypeId::of::<T>();
        let wrapped: AnyHandler = Arc::new(move |any: &dyn Any| {
            if let Some(msg) = any.downcast_ref::<T>() {
                handler(msg);
            }
        });
        self.subscribers
            .entry(type_id)
            .or_default()
            .keyed
            .entry(key)
            .or_default()
            .push((id, wrapped));
        self.id_types.insert(id.0, type_id);
        id
    }

    /// Removes a subscriber by identity. A no-op if it was already removed.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let Some((_, type_id)) = self.id_types.remove(&id.0) else {
            return;
        };
        if let Some(mut subs) = self.subscribers.get_mut(&type_id) {
            subs.generic.retain(|(sub_id, _)| *sub_id != id);
            for mut entry in subs.keyed.iter_mut() {
                entry.value_mut().retain(|(sub_id, _)| *sub_id != id);
            }
        }
    }

    /// Enqueues dispatch of `msg` to every matching subscriber. Returns
    /// immediately; delivery happens on the next [`poll`](Self::poll).
    pub fn post<T: Any + SystemKey + Send + 'static>(&self, msg: T) {
        let type_id = TypeId::of::<T>();
        let key = msg.system_key();
        let subs_map = &self.subscribers;
        // Clone the Arc'd handlers we need to call out of the map before
        // queuing, so the task does not need to borrow `self`.
        let generic: Vec<AnyHandler> = subs_map
            .get(&type_id)
            .map(|s| s.generic.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        let keyed: Vec<AnyHandler> = subs_map
            .get(&type_id)
            .and_then(|s| s.keyed.get(&key).map(|v| v.iter().map(|(_, h)| h.clone()).collect()))
            .unwrap_or_default();
        let task: Box<dyn FnOnce() + Send> = Box::new(move || {
            for handler in generic.into_iter().chain(keyed) {
                handler(&msg as &dyn Any);
            }
        });
        if self.tasks.push(task).is_err() {
            tracing::warn!("system bus task queue full, dropping message");
        }
    }

    /// Runs every pending task. Returns the number of tasks run. Called
    /// by the owning thread's cooperative executor loop.
    pub fn poll(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.tasks.pop() {
            task();
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping(u32);
    impl SystemKey for Ping {
        fn system_key(&self) -> u64 {
            self.0 as u64
        }
    }

    #[test]
    fn generic_subscriber_sees_every_message() {
        let bus = SystemBus::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        bus.subscribe::<Ping>(move |p| seen2.lock().unwrap().push(p.0));
        bus.post(Ping(1));
        bus.post(Ping(2));
        assert_eq!(bus.poll(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn keyed_subscriber_only_sees_matching_key() {
        let bus = SystemBus::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        bus.subscribe_keyed::<Ping>(1, move |p| seen2.lock().unwrap().push(p.0));
        bus.post(Ping(1));
        bus.post(Ping(2));
        bus.poll();
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn unsubscribe_stops_further_delivery() {
        let bus = SystemBus::new();
        let count = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let count2 = count.clone();
        let id = bus.subscribe::<Ping>(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.post(Ping(1));
        bus.poll();
        bus.unsubscribe(id);
        bus.post(Ping(2));
        bus.poll();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
