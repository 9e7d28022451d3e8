use super::Upstream;
use crate::context::{Context, ContextRef, NumericContext};
use crate::error::ContextError;
use crate::event::{ContextEvents, ContextModified};
use crate::item::ContextItem;
use crate::value::{Scalar, Value};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Stage adding synthetic names visible only downstream
///
/// Names are looked up in the private extension leaf first, then upstream.
/// Every write lands in the extension, which makes this stage the context
/// base for anything built on top of it.
pub struct ExtensionContext {
    upstream: Upstream,
    extension: Arc<NumericContext>,
    extension_link: Upstream,
    events: ContextEvents,
}

impl ExtensionContext {
    pub fn new(upstream: ContextRef) -> Arc<Self> {
        let extension = Arc::new(NumericContext::new());
        Arc::new_cyclic(|this: &Weak<ExtensionContext>| Self {
            upstream: Upstream::attach(upstream, this.clone(), |stage: &ExtensionContext, event| {
                stage.upstream_changed(event)
            }),
            extension_link: Upstream::attach(
                extension.clone(),
                this.clone(),
                |stage: &ExtensionContext, event| stage.events.post(event.clone()),
            ),
            extension,
            events: ContextEvents::new(),
        })
    }

    pub fn upstream(&self) -> &ContextRef {
        self.upstream.context()
    }

    /// The private leaf holding the synthetic names
    pub fn extension(&self) -> &Arc<NumericContext> {
        &self.extension
    }

    fn upstream_changed(&self, event: &ContextModified) {
        let mut event = event.clone();
        if !event.reset {
            // shadowed by the extension
            event.removed.retain(|name| !self.extension.contains(name));
        }
        let _deferred = self.events.deferring();
        self.events.post(event);
        if let Err(err) = self.conform() {
            debug!(error = %err, "could not resize extension arrays");
        }
    }

    /// Resize extension arrays after the upstream length changed
    fn conform(&self) -> Result<(), ContextError> {
        let target = self.upstream().len();
        let names = self.extension.context_names();
        if target == 0 || names.is_empty() || self.extension.len() == target {
            return Ok(());
        }
        debug!(from = self.extension.len(), to = target, "resizing extension arrays");
        let delegate = self.extension.delegate();
        let mut resized = Vec::with_capacity(names.len());
        for name in names {
            let value = self.extension.get(&name)?;
            let Value::Array(array) = &value else {
                continue;
            };
            let fill = delegate
                .default_value_for(&name, &value)
                .unwrap_or_else(|| Scalar::default_for(array.dtype()));
            let array = array
                .resized(target, &fill)
                .map_err(|source| ContextError::TypeMismatch {
                    name: name.clone(),
                    source,
                })?;
            resized.push((name, Value::array(array)));
        }
        self.extension.update(resized)
    }
}

impl Context for ExtensionContext {
    fn get(&self, name: &str) -> Result<Value, ContextError> {
        if self.extension.contains(name) {
            self.extension.get(name)
        } else {
            self.upstream().get(name)
        }
    }

    fn set(&self, name: &str, value: Value) -> Result<(), ContextError> {
        let expected = self.upstream().len();
        if let Value::Array(array) = &value {
            if expected > 0 && array.len() != expected {
                return Err(ContextError::LengthMismatch {
                    name: name.to_string(),
                    expected,
                    found: array.len(),
                });
            }
        }
        self.extension.set(name, value)
    }

    fn delete(&self, name: &str) -> Result<(), ContextError> {
        if self.extension.contains(name) {
            self.extension.delete(name)
        } else {
            self.upstream().delete(name)
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.extension.contains(name) || self.upstream().contains(name)
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.upstream().names();
        for name in self.extension.names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn len(&self) -> usize {
        match self.upstream().len() {
            0 => self.extension.len(),
            len => len,
        }
    }

    fn events(&self) -> &ContextEvents {
        &self.events
    }

    fn accepts(&self, name: &str, value: &Value) -> bool {
        self.extension.accepts(name, value)
    }

    fn context_items(&self) -> Vec<ContextItem> {
        let mut items = self.upstream().context_items();
        for item in self.extension.context_items() {
            match items.iter_mut().find(|i| i.name() == item.name()) {
                Some(slot) => *slot = item,
                None => items.push(item),
            }
        }
        items
    }

    fn define_item(&self, item: ContextItem) -> Result<(), ContextError> {
        self.extension.define_item(item)
    }
}
