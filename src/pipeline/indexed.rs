//! Stages exposing a subset or a reordering of their upstream
//!
//! [`IndexedContext`] holds the machinery shared by reduction, selection
//! and mapping views. The view is described by a list of upstream
//! positions (the "plan") produced by an [`IndexSource`]. Reads gather the
//! planned positions out of upstream arrays; writes scatter into them.
//! The plan is cached and recomputed when the source's filter changes or
//! when upstream reports a change the source depends on. Whenever the
//! visible positions change the stage posts `reset`.

use super::{FilterLink, Upstream};
use crate::context::{base_of, Context, ContextRef};
use crate::delegate::ContextDelegate;
use crate::error::ContextError;
use crate::event::{ContextEvents, ContextModified};
use crate::filter::Filter;
use crate::item::ContextItem;
use crate::scatter::assign_through;
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Decides which upstream positions a view exposes
pub trait IndexSource: Send + Sync + 'static {
    fn kind(&self) -> &'static str;

    /// Visible upstream positions in view order, or `None` to expose everything
    fn indices(&self, upstream: &dyn Context) -> Option<Vec<usize>>;

    /// Whether a change to `names` upstream may alter the plan
    fn depends_on(&self, upstream: &dyn Context, names: &BTreeSet<String>) -> bool;

    /// Filter whose parameter changes should trigger a recompute
    fn filter(&self) -> Option<Arc<dyn Filter>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Plan {
    pub(crate) indices: Option<Vec<usize>>,
    pub(crate) upstream_len: usize,
}

pub struct IndexedContext<S: IndexSource> {
    upstream: Upstream,
    filter_link: Option<FilterLink>,
    source: S,
    plan: Mutex<Option<Plan>>,
    events: ContextEvents,
}

impl<S: IndexSource> IndexedContext<S> {
    pub fn with_source(upstream: ContextRef, source: S) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<IndexedContext<S>>| {
            let filter_link = source.filter().map(|filter| {
                FilterLink::attach(filter, this.clone(), |stage: &IndexedContext<S>, _| {
                    stage.refresh()
                })
            });
            Self {
                upstream: Upstream::attach(upstream, this.clone(), |stage: &IndexedContext<S>, event| {
                    stage.upstream_changed(event)
                }),
                filter_link,
                source,
                plan: Mutex::new(None),
                events: ContextEvents::new(),
            }
        })
    }

    pub fn upstream(&self) -> &ContextRef {
        self.upstream.context()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.filter_link.as_ref().map(|link| link.filter())
    }

    /// Upstream positions currently visible, in view order
    pub fn indices(&self) -> Vec<usize> {
        let plan = self.plan();
        match plan.indices {
            Some(indices) => indices,
            None => (0..plan.upstream_len).collect(),
        }
    }

    fn compute(&self) -> Plan {
        let upstream = self.upstream();
        let upstream_len = upstream.len();
        let indices = self
            .source
            .indices(upstream.as_ref())
            .map(|indices| indices.into_iter().filter(|&i| i < upstream_len).collect());
        Plan {
            indices,
            upstream_len,
        }
    }

    pub(crate) fn plan(&self) -> Plan {
        let upstream_len = self.upstream().len();
        if let Some(plan) = self.plan.lock().as_ref() {
            if plan.upstream_len == upstream_len {
                return plan.clone();
            }
        }
        let plan = self.compute();
        *self.plan.lock() = Some(plan.clone());
        plan
    }

    /// Recompute the plan and post `reset` if the visible positions moved
    pub(crate) fn refresh(&self) {
        let fresh = self.compute();
        let previous = self.plan.lock().replace(fresh.clone());
        if previous.as_ref() != Some(&fresh) {
            debug!(
                stage = self.source.kind(),
                visible = fresh.indices.as_ref().map_or(fresh.upstream_len, Vec::len),
                "view changed"
            );
            self.events.post(ContextModified::reset());
        }
    }

    fn upstream_changed(&self, event: &ContextModified) {
        if event.reset {
            self.plan.lock().take();
            self.events.post(ContextModified::reset());
            return;
        }

        let length_changed = self
            .plan
            .lock()
            .as_ref()
            .map_or(false, |plan| plan.upstream_len != self.upstream().len());
        let names = event.all_modified();
        if length_changed || self.source.depends_on(self.upstream().as_ref(), &names) {
            let fresh = self.compute();
            let previous = self.plan.lock().replace(fresh.clone());
            if previous.is_some() && previous.as_ref() != Some(&fresh) {
                self.events.post(ContextModified::reset());
                return;
            }
        }
        self.events.post(event.clone());
    }

    fn view(&self, value: Value, plan: &Plan) -> Value {
        match (&value, &plan.indices) {
            (Value::Array(array), Some(indices)) if array.len() == plan.upstream_len => {
                Value::array(array.gather(indices))
            }
            _ => value,
        }
    }
}

impl<S: IndexSource> Context for IndexedContext<S> {
    fn get(&self, name: &str) -> Result<Value, ContextError> {
        let value = self.upstream().get(name)?;
        Ok(self.view(value, &self.plan()))
    }

    fn set(&self, name: &str, value: Value) -> Result<(), ContextError> {
        let plan = self.plan();
        let Some(indices) = plan.indices else {
            return self.upstream().set(name, value);
        };
        let full = assign_through(self.upstream().as_ref(), name, value, &indices)?;
        self.upstream().set(name, full)
    }

    fn delete(&self, name: &str) -> Result<(), ContextError> {
        self.upstream().delete(name)
    }

    fn contains(&self, name: &str) -> bool {
        self.upstream().contains(name)
    }

    fn names(&self) -> Vec<String> {
        self.upstream().names()
    }

    fn len(&self) -> usize {
        let plan = self.plan();
        plan.indices.map_or(plan.upstream_len, |indices| indices.len())
    }

    fn events(&self) -> &ContextEvents {
        &self.events
    }

    fn delegate(&self) -> Arc<dyn ContextDelegate> {
        self.upstream().delegate()
    }

    fn accepts(&self, name: &str, value: &Value) -> bool {
        self.upstream().accepts(name, value)
    }

    fn context_names(&self) -> Vec<String> {
        self.upstream().context_names()
    }

    fn context_base(&self) -> Option<ContextRef> {
        Some(base_of(self.upstream()))
    }

    fn context_items(&self) -> Vec<ContextItem> {
        self.upstream().context_items()
    }

    fn define_item(&self, item: ContextItem) -> Result<(), ContextError> {
        self.upstream().define_item(item)
    }
}
