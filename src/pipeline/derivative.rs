use super::Upstream;
use crate::context::{base_of, Context, ContextRef};
use crate::delegate::ContextDelegate;
use crate::error::ContextError;
use crate::event::{ContextEvents, ContextModified};
use crate::item::ContextItem;
use crate::value::Value;
use std::sync::{Arc, Weak};

/// Rewrites (or swallows, by returning `None`) upstream events
pub type EventTranslator = Arc<dyn Fn(&ContextModified) -> Option<ContextModified> + Send + Sync>;

/// Pass-through stage: reads, writes and events go straight to upstream
pub struct DerivativeContext {
    upstream: Upstream,
    translator: Option<EventTranslator>,
    events: ContextEvents,
}

impl DerivativeContext {
    pub fn new(upstream: ContextRef) -> Arc<Self> {
        Self::build(upstream, None)
    }

    pub fn with_translator(upstream: ContextRef, translator: EventTranslator) -> Arc<Self> {
        Self::build(upstream, Some(translator))
    }

    fn build(upstream: ContextRef, translator: Option<EventTranslator>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<DerivativeContext>| Self {
            upstream: Upstream::attach(upstream, this.clone(), |stage: &DerivativeContext, event| {
                stage.upstream_changed(event)
            }),
            translator,
            events: ContextEvents::new(),
        })
    }

    pub fn upstream(&self) -> &ContextRef {
        self.upstream.context()
    }

    fn upstream_changed(&self, event: &ContextModified) {
        let translated = match &self.translator {
            Some(translate) => translate(event),
            None => Some(event.clone()),
        };
        if let Some(event) = translated {
            self.events.post(event);
        }
    }
}

impl Context for DerivativeContext {
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
        Some(base_of(self.upstream()))
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
    fn passes_everything_through() {
        let leaf: ContextRef = Arc::new(NumericContext::new());
        let stage = DerivativeContext::new(leaf.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        stage.events().subscribe(move |e| sink.lock().push(e.clone()));

        stage.set("a", Value::from(vec![1i64, 2])).unwrap();
        assert_eq!(leaf.get("a").unwrap(), Value::from(vec![1i64, 2]));
        assert_eq!(stage.len(), 2);
        assert_eq!(*seen.lock(), vec![ContextModified::added("a")]);
        assert!(Arc::ptr_eq(&stage.context_base().unwrap(), &leaf));
    }

    #[test]
    fn translator_rewrites_events() {
        let leaf: ContextRef = Arc::new(NumericContext::new());
        let translator: EventTranslator = Arc::new(|event: &ContextModified| {
            if event.changed.is_empty() {
                Some(event.clone())
            } else {
                None
            }
        });
        let stage = DerivativeContext::with_translator(leaf.clone(), translator);
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        stage.events().subscribe(move |_| *sink.lock() += 1);

        leaf.set("s", Value::from(1i64)).unwrap();
        leaf.set("a", Value::from(vec![1i64])).unwrap();
        assert_eq!(*seen.lock(), 1);
    }
}
