//! Leaf context: owns its arrays and items

use crate::context::{validate_name, Context};
use crate::delegate::{default_context_delegate, ContextDelegate, LengthPolicy};
use crate::error::ContextError;
use crate::event::{ContextEvents, ContextModified};
use crate::item::ContextItem;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Kinds of values a leaf stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKinds {
    #[default]
    Any,
    ArraysOnly,
}

#[derive(Default)]
struct LeafState {
    order: Vec<String>,
    values: HashMap<String, Value>,
    items: Vec<ContextItem>,
    length: Option<usize>,
}

impl LeafState {
    fn array_length(&self) -> Option<usize> {
        self.order
            .iter()
            .filter_map(|name| self.values.get(name))
            .find_map(|v| v.as_array().map(|a| a.len()))
    }

    fn external_item(&self, name: &str) -> Option<ContextItem> {
        self.items
            .iter()
            .find(|item| item.name() == name && !item.is_owned())
            .cloned()
    }
}

/// The leaf of every pipeline
pub struct NumericContext {
    state: RwLock<LeafState>,
    events: ContextEvents,
    delegate: Arc<dyn ContextDelegate>,
    kinds: ValueKinds,
}

impl Default for NumericContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NumericContext {
    pub fn new() -> Self {
        Self::with_delegate(default_context_delegate())
    }

    pub fn with_delegate(delegate: Arc<dyn ContextDelegate>) -> Self {
        Self {
            state: RwLock::new(LeafState::default()),
            events: ContextEvents::new(),
            delegate,
            kinds: ValueKinds::Any,
        }
    }

    /// A leaf that rejects every non-array value
    pub fn arrays_only() -> Self {
        Self::new().with_kinds(ValueKinds::ArraysOnly)
    }

    pub fn with_kinds(mut self, kinds: ValueKinds) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn kinds(&self) -> ValueKinds {
        self.kinds
    }

    /// Item registered for `name`, if any
    pub fn item(&self, name: &str) -> Option<ContextItem> {
        self.state
            .read()
            .items
            .iter()
            .find(|item| item.name() == name)
            .cloned()
    }

    fn set_external(&self, item: ContextItem, value: Value) -> Result<(), ContextError> {
        let event = if value.is_array() {
            ContextModified::modified(item.name())
        } else {
            ContextModified::changed(item.name())
        };
        item.set_data(self, value)?;
        self.events.post(event);
        Ok(())
    }

    /// Resize every array except `name` to `length`
    fn reallocate(
        &self,
        state: &LeafState,
        name: &str,
        length: usize,
    ) -> Result<Vec<(String, Value)>, ContextError> {
        let mut resized = Vec::new();
        for other in state.order.iter().filter(|other| other.as_str() != name) {
            let Some(Value::Array(current)) = state.values.get(other) else {
                continue;
            };
            let sample = Value::Array(current.clone());
            let fill = self
                .delegate
                .default_value_for(other, &sample)
                .ok_or_else(|| ContextError::LengthMismatch {
                    name: other.clone(),
                    expected: length,
                    found: current.len(),
                })?;
            let array = current
                .resized(length, &fill)
                .map_err(|source| ContextError::TypeMismatch {
                    name: other.clone(),
                    source,
                })?;
            resized.push((other.clone(), Value::array(array)));
        }
        Ok(resized)
    }
}

impl Context for NumericContext {
    fn get(&self, name: &str) -> Result<Value, ContextError> {
        if name.contains('.') {
            return self.get_dotted(name);
        }
        let external = {
            let state = self.state.read();
            if let Some(value) = state.values.get(name) {
                return Ok(value.clone());
            }
            state.external_item(name)
        };
        match external {
            Some(item) => item.data(self),
            None => Err(ContextError::UnknownName(name.to_string())),
        }
    }

    fn set(&self, name: &str, value: Value) -> Result<(), ContextError> {
        if name.contains('.') {
            return self.set_dotted(name, value);
        }
        validate_name(name)?;

        let external = self.state.read().external_item(name);
        if let Some(item) = external {
            return self.set_external(item, value);
        }
        if !self.accepts(name, &value) {
            return Err(ContextError::Rejected {
                name: name.to_string(),
                reason: format!("this context only stores arrays, got a {}", value.kind()),
            });
        }

        let (event, reallocated) = {
            let mut state = self.state.write();
            let existed = state.values.contains_key(name);
            let mut reallocated = Vec::new();

            if let Value::Array(array) = &value {
                let length = array.len();
                let others_exist = state
                    .order
                    .iter()
                    .any(|other| other != name && state.values[other].is_array());
                match state.length {
                    Some(current) if current != length && others_exist => {
                        match self.delegate.length_policy() {
                            LengthPolicy::Reject => {
                                return Err(ContextError::LengthMismatch {
                                    name: name.to_string(),
                                    expected: current,
                                    found: length,
                                });
                            }
                            LengthPolicy::Reallocate => {
                                let resized = self.reallocate(&state, name, length)?;
                                debug!(
                                    name,
                                    from = current,
                                    to = length,
                                    count = resized.len(),
                                    "reallocating arrays to new context length"
                                );
                                for (other, array) in resized {
                                    state.values.insert(other.clone(), array);
                                    reallocated.push(other);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }

            let is_array = value.is_array();
            if !existed {
                state.order.push(name.to_string());
            }
            state.values.insert(name.to_string(), value);
            if !state.items.iter().any(|item| item.name() == name) {
                state.items.push(ContextItem::new(name));
            }
            state.length = state.array_length();

            let event = if !is_array {
                ContextModified::changed(name)
            } else if existed {
                ContextModified::modified(name)
            } else {
                ContextModified::added(name)
            };
            (event, reallocated)
        };

        self.events.post(event);
        if !reallocated.is_empty() {
            self.events.post(ContextModified::modified_names(reallocated));
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), ContextError> {
        {
            let mut state = self.state.write();
            if state.values.remove(name).is_some() {
                state.order.retain(|n| n != name);
            } else if state.external_item(name).is_none() {
                return Err(ContextError::UnknownName(name.to_string()));
            }
            state.items.retain(|item| item.name() != name);
            state.length = state.array_length();
        }
        self.events.post(ContextModified::removed(name));
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        if name.contains('.') {
            return self.get_dotted(name).is_ok();
        }
        let state = self.state.read();
        state.values.contains_key(name) || state.external_item(name).is_some()
    }

    fn names(&self) -> Vec<String> {
        let state = self.state.read();
        let mut names = state.order.clone();
        for item in state.items.iter().filter(|item| !item.is_owned()) {
            if !names.iter().any(|n| n == item.name()) {
                names.push(item.name().to_string());
            }
        }
        names
    }

    fn len(&self) -> usize {
        self.state.read().length.unwrap_or(0)
    }

    fn events(&self) -> &ContextEvents {
        &self.events
    }

    fn delegate(&self) -> Arc<dyn ContextDelegate> {
        self.delegate.clone()
    }

    fn accepts(&self, _name: &str, value: &Value) -> bool {
        match self.kinds {
            ValueKinds::Any => true,
            ValueKinds::ArraysOnly => value.is_array(),
        }
    }

    fn context_names(&self) -> Vec<String> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter(|name| state.values[name.as_str()].is_array())
            .cloned()
            .collect()
    }

    fn context_items(&self) -> Vec<ContextItem> {
        self.state.read().items.clone()
    }

    fn define_item(&self, item: ContextItem) -> Result<(), ContextError> {
        item.validate()?;
        let name = item.name().to_string();
        let external = !item.is_owned();
        {
            let mut state = self.state.write();
            if external && state.values.contains_key(&name) {
                return Err(ContextError::Item {
                    name,
                    reason: "name already holds a stored value".to_string(),
                });
            }
            match state.items.iter_mut().find(|existing| existing.name() == name) {
                Some(existing) => *existing = item,
                None => state.items.push(item),
            }
        }
        if external {
            self.events.post(ContextModified::added(name));
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), ContextError> {
        *self.state.write() = LeafState::default();
        self.events.post(ContextModified::reset());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::DefaultDelegate;
    use crate::item::AttributeHost;
    use crate::value::{Array, Scalar};
    use parking_lot::Mutex;

    fn record(ctx: &NumericContext) -> Arc<Mutex<Vec<ContextModified>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        ctx.events().subscribe(move |e| sink.lock().push(e.clone()));
        seen
    }

    #[test]
    fn set_array_defines_length_and_posts_added() {
        let ctx = NumericContext::new();
        let seen = record(&ctx);
        ctx.set("x", Value::from(vec![1i64, 2, 3])).unwrap();

        assert_eq!(ctx.len(), 3);
        assert_eq!(seen.lock().as_slice(), &[ContextModified::added("x")]);
    }

    #[test]
    fn get_returns_same_array() {
        let ctx = NumericContext::new();
        let value = Value::from(vec![1.0, 2.0]);
        ctx.set("x", value.clone()).unwrap();
        assert!(ctx.get("x").unwrap().same(&value));
    }

    #[test]
    fn scalars_report_changed() {
        let ctx = NumericContext::new();
        let seen = record(&ctx);
        ctx.set("gain", Value::from(2.5)).unwrap();
        ctx.set("gain", Value::from(3.5)).unwrap();
        assert_eq!(seen.lock()[1], ContextModified::changed("gain"));
        assert_eq!(ctx.len(), 0);
        assert!(ctx.context_names().is_empty());
    }

    #[test]
    fn reassignment_posts_modified() {
        let ctx = NumericContext::new();
        let seen = record(&ctx);
        ctx.set("x", Value::from(vec![1i64])).unwrap();
        ctx.set("x", Value::from(vec![2i64])).unwrap();
        assert_eq!(seen.lock()[1], ContextModified::modified("x"));
    }

    #[test]
    fn length_mismatch_reallocates_by_default() {
        let ctx = NumericContext::new();
        ctx.set("a", Value::from(vec![1.0, 2.0])).unwrap();
        let seen = record(&ctx);
        ctx.set("b", Value::from(vec![1i64, 2, 3, 4])).unwrap();

        assert_eq!(ctx.len(), 4);
        let a = ctx.get("a").unwrap();
        let a = a.as_array().unwrap().as_float().unwrap().to_vec();
        assert_eq!(a.len(), 4);
        assert!(a[2].is_nan() && a[3].is_nan());
        let seen = seen.lock();
        assert_eq!(seen[0], ContextModified::added("b"));
        assert_eq!(seen[1], ContextModified::modified("a"));
    }

    #[test]
    fn length_mismatch_rejected_by_policy() {
        let ctx = NumericContext::with_delegate(Arc::new(DefaultDelegate::with_policy(
            LengthPolicy::Reject,
        )));
        ctx.set("a", Value::from(vec![1.0, 2.0])).unwrap();
        let err = ctx.set("b", Value::from(vec![1.0])).unwrap_err();
        assert_eq!(
            err,
            ContextError::LengthMismatch {
                name: "b".to_string(),
                expected: 2,
                found: 1
            }
        );
        assert!(!ctx.contains("b"));
    }

    #[test]
    fn sole_array_may_change_length() {
        let ctx = NumericContext::with_delegate(Arc::new(DefaultDelegate::with_policy(
            LengthPolicy::Reject,
        )));
        ctx.set("a", Value::from(vec![1.0, 2.0])).unwrap();
        ctx.set("a", Value::from(vec![1.0, 2.0, 3.0])).unwrap();
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn delete_posts_removed_and_forgets_length() {
        let ctx = NumericContext::new();
        ctx.set("x", Value::from(vec![1i64, 2])).unwrap();
        let seen = record(&ctx);
        ctx.delete("x").unwrap();

        assert!(!ctx.contains("x"));
        assert_eq!(ctx.len(), 0);
        assert_eq!(seen.lock().as_slice(), &[ContextModified::removed("x")]);
        assert!(matches!(ctx.delete("x"), Err(ContextError::UnknownName(_))));
    }

    #[test]
    fn clear_posts_reset() {
        let ctx = NumericContext::new();
        ctx.set("x", Value::from(vec![1i64])).unwrap();
        let seen = record(&ctx);
        ctx.clear().unwrap();
        assert!(ctx.names().is_empty());
        assert_eq!(seen.lock().as_slice(), &[ContextModified::reset()]);
    }

    #[test]
    fn update_coalesces_into_one_event() {
        let ctx = NumericContext::new();
        let seen = record(&ctx);
        ctx.update(vec![
            ("a".to_string(), Value::from(vec![1i64, 2])),
            ("b".to_string(), Value::from(vec![3i64, 4])),
            ("k".to_string(), Value::from(1.0)),
        ])
        .unwrap();
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].added, vec!["a", "b"]);
        assert_eq!(seen[0].changed, vec!["k"]);
    }

    #[test]
    fn arrays_only_rejects_scalars() {
        let ctx = NumericContext::arrays_only();
        assert!(!ctx.accepts("a", &Value::from(1i64)));
        assert!(matches!(
            ctx.set("a", Value::from(1i64)),
            Err(ContextError::Rejected { .. })
        ));
        assert!(ctx.set("a", Value::from(vec![1i64])).is_ok());
    }

    #[test]
    fn names_keep_insertion_order() {
        let ctx = NumericContext::new();
        for name in ["c", "a", "b"] {
            ctx.set(name, Value::from(1i64)).unwrap();
        }
        assert_eq!(ctx.names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn items_track_assignment_and_metadata() {
        let ctx = NumericContext::new();
        ctx.set("x", Value::from(vec![1.0])).unwrap();
        ctx.define_item(ContextItem::new("x").with_label("Depth"))
            .unwrap();
        assert_eq!(ctx.item("x").unwrap().display_label(), "Depth");
        assert_eq!(ctx.context_items().len(), 1);

        ctx.delete("x").unwrap();
        assert!(ctx.item("x").is_none());
    }

    #[test]
    fn sub_context_item_reads_and_writes_through() {
        let inner = Arc::new(NumericContext::new());
        inner.set("vp", Value::from(vec![1.0, 2.0])).unwrap();
        let ctx = NumericContext::new();
        ctx.set("logs", Value::Context(inner.clone())).unwrap();
        ctx.define_item(ContextItem::sub_context("velocity", "logs", "vp"))
            .unwrap();

        assert!(ctx.contains("velocity"));
        assert!(ctx.names().contains(&"velocity".to_string()));
        assert_eq!(ctx.get("velocity").unwrap(), Value::from(vec![1.0, 2.0]));

        ctx.set("velocity", Value::from(vec![3.0, 4.0])).unwrap();
        assert_eq!(inner.get("vp").unwrap(), Value::from(vec![3.0, 4.0]));
    }

    struct Knob {
        value: Mutex<Value>,
    }

    impl AttributeHost for Knob {
        fn get_attribute(&self, name: &str) -> Option<Value> {
            (name == "level").then(|| self.value.lock().clone())
        }

        fn set_attribute(&self, name: &str, value: Value) -> Result<(), ContextError> {
            if name != "level" {
                return Err(ContextError::UnknownName(name.to_string()));
            }
            *self.value.lock() = value;
            Ok(())
        }
    }

    #[test]
    fn attribute_item_routes_to_host() {
        let knob = Arc::new(Knob {
            value: Mutex::new(Value::from(1i64)),
        });
        let ctx = NumericContext::new();
        let seen = record(&ctx);
        ctx.define_item(ContextItem::attribute("level", knob.clone(), "level"))
            .unwrap();
        assert_eq!(ctx.get("level").unwrap(), Value::from(1i64));

        ctx.set("level", Value::from(7i64)).unwrap();
        assert_eq!(*knob.value.lock(), Value::from(7i64));
        assert_eq!(seen.lock().last().unwrap(), &ContextModified::changed("level"));
    }

    #[test]
    fn reallocation_of_strings_pads_with_empty() {
        let ctx = NumericContext::new();
        ctx.set("s", Value::from(vec!["a"])).unwrap();
        ctx.set("n", Value::from(vec![1i64, 2])).unwrap();
        assert_eq!(
            ctx.get("s").unwrap().as_array().unwrap(),
            &Array::Str(vec!["a".to_string(), String::new()])
        );
        assert_eq!(
            ctx.delegate().default_value_for("n", &ctx.get("n").unwrap()),
            Some(Scalar::Int(0))
        );
    }
}
