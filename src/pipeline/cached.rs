use super::Upstream;
use crate::context::{base_of, Context, ContextRef};
use crate::delegate::ContextDelegate;
use crate::error::ContextError;
use crate::event::{ContextEvents, ContextModified};
use crate::item::ContextItem;
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Memoises upstream reads until an event touches the name
pub struct CachedContext {
    upstream: Upstream,
    cache: Mutex<HashMap<String, Value>>,
    events: ContextEvents,
}

impl CachedContext {
    pub fn new(upstream: ContextRef) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<CachedContext>| Self {
            upstream: Upstream::attach(upstream, this.clone(), |stage: &CachedContext, event| {
                stage.upstream_changed(event)
            }),
            cache: Mutex::new(HashMap::new()),
            events: ContextEvents::new(),
        })
    }

    pub fn upstream(&self) -> &ContextRef {
        self.upstream.context()
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.lock().contains_key(name)
    }

    fn upstream_changed(&self, event: &ContextModified) {
        {
            let mut cache = self.cache.lock();
            if event.reset {
                debug!(entries = cache.len(), "clearing cache");
                cache.clear();
            } else {
                for name in event.all_modified() {
                    if cache.remove(&name).is_some() {
                        trace!(name, "invalidated cached value");
                    }
                }
            }
        }
        self.events.post(event.clone());
    }
}

impl Context for CachedContext {
    fn get(&self, name: &str) -> Result<Value, ContextError> {
        if let Some(value) = self.cache.lock().get(name) {
            return Ok(value.clone());
        }
        let value = self.upstream().get(name)?;
        self.cache.lock().insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn set(&self, name: &str, value: Value) -> Result<(), ContextError> {
        self.upstream().set(name, value)
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
        self.upstream().len()
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
