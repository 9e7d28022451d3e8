//! Synchronous listener channels
//!
//! Listeners are cloned out of the registry before delivery so that a
//! handler may subscribe, unsubscribe or read the emitting context without
//! deadlocking.

use super::ContextModified;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

pub type ListenerId = u64;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

struct Listener<E> {
    id: ListenerId,
    predicate: Option<Predicate<E>>,
    handler: Handler<E>,
}

impl<E> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            predicate: self.predicate.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// Ordered registry of event handlers
pub struct Channel<E> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener<E>>>,
}

impl<E> Default for Channel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Channel<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    /// Subscribe a handler that only sees events matching `predicate`
    pub fn subscribe_when<P, F>(&self, predicate: P, handler: F) -> ListenerId
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(Some(Arc::new(predicate)), Arc::new(handler))
    }

    fn register(&self, predicate: Option<Predicate<E>>, handler: Handler<E>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(Listener {
            id,
            predicate,
            handler,
        });
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver `event` to every listener in subscription order
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self.listeners.lock().clone();
        for listener in listeners {
            if let Some(predicate) = &listener.predicate {
                if !predicate(event) {
                    continue;
                }
            }
            (listener.handler)(event);
        }
    }
}

#[derive(Default)]
struct Deferred {
    depth: usize,
    pending: Option<ContextModified>,
}

/// Event channel of a context, with nested deferral
#[derive(Default)]
pub struct ContextEvents {
    channel: Channel<ContextModified>,
    deferred: Mutex<Deferred>,
}

impl ContextEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&ContextModified) + Send + Sync + 'static,
    {
        self.channel.subscribe(handler)
    }

    pub fn subscribe_when<P, F>(&self, predicate: P, handler: F) -> ListenerId
    where
        P: Fn(&ContextModified) -> bool + Send + Sync + 'static,
        F: Fn(&ContextModified) + Send + Sync + 'static,
    {
        self.channel.subscribe_when(predicate, handler)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.channel.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.channel.listener_count()
    }

    /// Post an event, or queue it while deferred; empty events are dropped
    pub fn post(&self, event: ContextModified) {
        if !event.not_empty() {
            return;
        }
        {
            let mut deferred = self.deferred.lock();
            if deferred.depth > 0 {
                match deferred.pending.as_mut() {
                    Some(pending) => pending.merge(&event),
                    None => deferred.pending = Some(event),
                }
                return;
            }
        }
        trace!(?event, "posting context event");
        self.channel.emit(&event);
    }

    pub fn defer(&self) {
        self.deferred.lock().depth += 1;
    }

    /// Leave one level of deferral; at depth zero the merged event is posted
    pub fn flush(&self) {
        let pending = {
            let mut deferred = self.deferred.lock();
            deferred.depth = deferred.depth.saturating_sub(1);
            if deferred.depth == 0 {
                deferred.pending.take()
            } else {
                None
            }
        };
        if let Some(event) = pending {
            self.post(event);
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.lock().depth > 0
    }

    /// Defer until the returned guard is dropped
    pub fn deferring(&self) -> DeferGuard<'_> {
        self.defer();
        DeferGuard { events: self }
    }
}

/// Flushes one level of deferral on drop
pub struct DeferGuard<'a> {
    events: &'a ContextEvents,
}

impl Drop for DeferGuard<'_> {
    fn drop(&mut self) {
        self.events.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(events: &ContextEvents) -> Arc<Mutex<Vec<ContextModified>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        events.subscribe(move |e| sink.lock().push(e.clone()));
        seen
    }

    #[test]
    fn post_delivers_immediately() {
        let events = ContextEvents::new();
        let seen = recorder(&events);
        events.post(ContextModified::added("x"));
        events.post(ContextModified::default());
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn nested_deferral_emits_once() {
        let events = ContextEvents::new();
        let seen = recorder(&events);
        events.defer();
        events.defer();
        events.post(ContextModified::added("x"));
        events.flush();
        events.post(ContextModified::modified("y"));
        assert!(seen.lock().is_empty());
        events.flush();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].added, vec!["x"]);
        assert_eq!(seen[0].modified, vec!["y"]);
    }

    #[test]
    fn deferred_reassignment_reports_added_and_modified() {
        let events = ContextEvents::new();
        let seen = recorder(&events);
        events.defer();
        events.post(ContextModified::added("x"));
        events.post(ContextModified::modified("x"));
        events.flush();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].added, vec!["x"]);
        assert_eq!(seen[0].modified, vec!["x"]);
    }

    #[test]
    fn guard_flushes_on_drop() {
        let events = ContextEvents::new();
        let seen = recorder(&events);
        {
            let _guard = events.deferring();
            events.post(ContextModified::changed("a"));
            assert!(events.is_deferred());
        }
        assert!(!events.is_deferred());
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn predicate_filters_delivery() {
        let events = ContextEvents::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        events.subscribe_when(|e| e.reset, move |_| *sink.lock() += 1);
        events.post(ContextModified::added("x"));
        events.post(ContextModified::reset());
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let events = ContextEvents::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        let id = events.subscribe(move |_| *sink.lock() += 1);
        assert!(events.unsubscribe(id));
        events.post(ContextModified::added("x"));
        assert_eq!(*seen.lock(), 0);
        assert_eq!(events.listener_count(), 0);
    }
}
