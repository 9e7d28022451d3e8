use super::Upstream;
use crate::context::{base_of, Context, ContextRef};
use crate::delegate::ContextDelegate;
use crate::error::ContextError;
use crate::event::{ContextEvents, ContextModified};
use crate::item::ContextItem;
use crate::value::Value;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::debug;

/// End-of-pipeline cap forwarding everything, optionally read-only
pub struct PassThruContext {
    upstream: Upstream,
    read_only: bool,
    events: ContextEvents,
}

impl PassThruContext {
    pub fn new(upstream: ContextRef) -> Arc<Self> {
        Self::build(upstream, false)
    }

    pub fn read_only(upstream: ContextRef) -> Arc<Self> {
        Self::build(upstream, true)
    }

    fn build(upstream: ContextRef, read_only: bool) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<PassThruContext>| Self {
            upstream: Upstream::attach(upstream, this.clone(), |stage: &PassThruContext, event| {
                stage.events.post(event.clone())
            }),
            read_only,
            events: ContextEvents::new(),
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn upstream(&self) -> &ContextRef {
        self.upstream.context()
    }

    fn writable(&self, name: &str) -> Result<(), ContextError> {
        if self.read_only {
            Err(ContextError::ReadOnly(name.to_string()))
        } else {
            Ok(())
        }
    }
}

impl Context for PassThruContext {
    fn get(&self, name: &str) -> Result<Value, ContextError> {
        self.upstream().get(name)
    }

    fn set(&self, name: &str, value: Value) -> Result<(), ContextError> {
        self.writable(name)?;
        self.upstream().set(name, value)
    }

    fn delete(&self, name: &str) -> Result<(), ContextError> {
        self.writable(name)?;
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
        !self.read_only && self.upstream().accepts(name, value)
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
        self.writable(item.name())?;
        self.upstream().define_item(item)
    }
}

/// Stable consumer handle whose upstream can be swapped
pub struct TerminationContext {
    upstream: RwLock<Upstream>,
    events: ContextEvents,
    this: Weak<TerminationContext>,
}

impl TerminationContext {
    pub fn new(upstream: ContextRef) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<TerminationContext>| Self {
            upstream: RwLock::new(Self::link(upstream, this.clone())),
            events: ContextEvents::new(),
            this: this.clone(),
        })
    }

    fn link(upstream: ContextRef, this: Weak<TerminationContext>) -> Upstream {
        Upstream::attach(upstream, this, |stage: &TerminationContext, event| {
            stage.events.post(event.clone())
        })
    }

    pub fn upstream(&self) -> ContextRef {
        self.upstream.read().context().clone()
    }

    /// Point the handle at a different pipeline; consumers see one `reset`
    pub fn set_upstream(&self, upstream: ContextRef) {
        let link = Self::link(upstream, self.this.clone());
        let previous = std::mem::replace(&mut *self.upstream.write(), link);
        drop(previous);
        debug!("termination upstream swapped");
        self.events.post(ContextModified::reset());
    }
}

impl Context for TerminationContext {
    fn get(&self, name: &str) -> Result<Value, ContextError> {
        self.upstream().get(name)
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
        Some(base_of(&self.upstream()))
    }

    fn context_items(&self) -> Vec<ContextItem> {
        self.upstream().context_items()
    }

    fn define_item(&self, item: ContextItem) -> Result<(), ContextError> {
        self.upstream().define_item(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NumericContext;
    use parking_lot::Mutex;

    #[test]
    fn read_only_cap_rejects_writes() {
        let leaf: ContextRef = Arc::new(NumericContext::new());
        leaf.set("a", Value::from(1i64)).unwrap();
        let cap = PassThruContext::read_only(leaf);
        assert_eq!(cap.get("a").unwrap(), Value::from(1i64));
        assert_eq!(
            cap.set("a", Value::from(2i64)),
            Err(ContextError::ReadOnly("a".to_string()))
        );
        assert!(cap.delete("a").is_err());
        assert!(!cap.accepts("a", &Value::from(2i64)));
    }

    #[test]
    fn swapping_upstream_posts_reset() {
        let first: ContextRef = Arc::new(NumericContext::new());
        let second: ContextRef = Arc::new(NumericContext::new());
        first.set("a", Value::from(1i64)).unwrap();
        second.set("b", Value::from(2i64)).unwrap();

        let handle = TerminationContext::new(first.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        handle.events().subscribe(move |e| sink.lock().push(e.clone()));

        handle.set_upstream(second.clone());
        assert_eq!(handle.names(), vec!["b"]);
        assert_eq!(first.events().listener_count(), 0);

        first.set("a", Value::from(3i64)).unwrap();
        second.set("b", Value::from(4i64)).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![ContextModified::reset(), ContextModified::changed("b")]
        );
    }
}
