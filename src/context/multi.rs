//! A context presenting the union of an ordered list of children

use crate::context::{Context, ContextRef};
use crate::error::ContextError;
use crate::event::{ContextEvents, ContextModified};
use crate::item::ContextItem;
use crate::pipeline::Upstream;
use crate::value::Value;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Routes each name to the first child that holds or accepts it
pub struct MultiContext {
    children: RwLock<Vec<Upstream>>,
    events: ContextEvents,
    this: Weak<MultiContext>,
}

impl MultiContext {
    pub fn new(children: Vec<ContextRef>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<MultiContext>| {
            let links = children
                .into_iter()
                .map(|child| Self::link(child, this.clone()))
                .collect();
            Self {
                children: RwLock::new(links),
                events: ContextEvents::new(),
                this: this.clone(),
            }
        })
    }

    fn link(child: ContextRef, this: Weak<MultiContext>) -> Upstream {
        Upstream::attach(child, this, |multi: &MultiContext, event| {
            multi.child_changed(event)
        })
    }

    /// Append a child; its names become visible after those already present
    pub fn add_child(&self, child: ContextRef) {
        let link = Self::link(child, self.this.clone());
        self.children.write().push(link);
        self.events.post(ContextModified::reset());
    }

    pub fn children(&self) -> Vec<ContextRef> {
        self.children
            .read()
            .iter()
            .map(|link| link.context().clone())
            .collect()
    }

    fn child_changed(&self, event: &ContextModified) {
        let mut event = event.clone();
        if !event.reset {
            // still visible through another child
            event.removed.retain(|name| !self.contains(name));
        }
        self.events.post(event);
    }

    fn holder(&self, name: &str) -> Option<ContextRef> {
        self.children()
            .into_iter()
            .find(|child| child.contains(name))
    }
}

impl Context for MultiContext {
    fn get(&self, name: &str) -> Result<Value, ContextError> {
        match self.holder(name) {
            Some(child) => child.get(name),
            None => Err(ContextError::UnknownName(name.to_string())),
        }
    }

    fn set(&self, name: &str, value: Value) -> Result<(), ContextError> {
        let children = self.children();
        let Some(target) = children.iter().position(|c| c.accepts(name, &value)) else {
            return Err(ContextError::Rejected {
                name: name.to_string(),
                reason: "no child context accepts this value".to_string(),
            });
        };

        let _deferred = self.events.deferring();
        children[target].set(name, value)?;
        for (index, child) in children.iter().enumerate() {
            if index != target && child.contains(name) {
                debug!(name, child = index, "dropping shadowed value from child context");
                child.delete(name)?;
            }
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), ContextError> {
        let holders: Vec<ContextRef> = self
            .children()
            .into_iter()
            .filter(|child| child.contains(name))
            .collect();
        if holders.is_empty() {
            return Err(ContextError::UnknownName(name.to_string()));
        }
        let _deferred = self.events.deferring();
        for child in holders {
            child.delete(name)?;
        }
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.children().iter().any(|child| child.contains(name))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for child in self.children() {
            for name in child.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn len(&self) -> usize {
        self.children()
            .iter()
            .map(|child| child.len())
            .max()
            .unwrap_or(0)
    }

    fn events(&self) -> &ContextEvents {
        &self.events
    }

    fn accepts(&self, name: &str, value: &Value) -> bool {
        self.children().iter().any(|child| child.accepts(name, value))
    }

    fn context_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for child in self.children() {
            for name in child.context_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn context_items(&self) -> Vec<ContextItem> {
        let mut items: Vec<ContextItem> = Vec::new();
        for child in self.children() {
            for item in child.context_items() {
                if !items.iter().any(|i| i.name() == item.name()) {
                    items.push(item);
                }
            }
        }
        items
    }

    fn define_item(&self, item: ContextItem) -> Result<(), ContextError> {
        let children = self.children();
        let child = children
            .iter()
            .find(|c| c.contains(item.name()))
            .or_else(|| children.first())
            .ok_or_else(|| ContextError::Item {
                name: item.name().to_string(),
                reason: "multi-context has no children".to_string(),
            })?;
        child.define_item(item)
    }
}
