//! Subscriptions from a stage to the things it derives from
//!
//! A stage holds its upstream strongly and is itself held only weakly by the
//! subscription closure, so dropping the last handle of a stage tears the
//! subscription down instead of leaking it.

use crate::context::ContextRef;
use crate::event::{ContextModified, ListenerId};
use crate::filter::{Filter, FilterModified};
use std::sync::{Arc, Weak};

/// Strong handle on an upstream context plus the subscription to its events
pub struct Upstream {
    context: ContextRef,
    subscription: ListenerId,
}

impl Upstream {
    pub fn attach<T, F>(context: ContextRef, owner: Weak<T>, on_event: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &ContextModified) + Send + Sync + 'static,
    {
        let subscription = context.events().subscribe(move |event| {
            if let Some(owner) = owner.upgrade() {
                on_event(&owner, event);
            }
        });
        Self {
            context,
            subscription,
        }
    }

    pub fn context(&self) -> &ContextRef {
        &self.context
    }
}

impl Drop for Upstream {
    fn drop(&mut self) {
        self.context.events().unsubscribe(self.subscription);
    }
}

/// Strong handle on a filter plus the subscription to its parameter changes
pub struct FilterLink {
    filter: Arc<dyn Filter>,
    subscription: ListenerId,
}

impl FilterLink {
    pub fn attach<T, F>(filter: Arc<dyn Filter>, owner: Weak<T>, on_modified: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &FilterModified) + Send + Sync + 'static,
    {
        let subscription = filter.modified().subscribe(move |event| {
            if let Some(owner) = owner.upgrade() {
                on_modified(&owner, event);
            }
        });
        Self {
            filter,
            subscription,
        }
    }

    pub fn filter(&self) -> &Arc<dyn Filter> {
        &self.filter
    }
}

impl Drop for FilterLink {
    fn drop(&mut self) {
        self.filter.modified().unsubscribe(self.subscription);
    }
}
