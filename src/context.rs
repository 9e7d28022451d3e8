//! Contexts
//!
//! A context is a keyed store of named values plus a change-event channel.
//! The [`Context`] trait is the contract shared by the leaf
//! [`NumericContext`], the [`MultiContext`] container and every pipeline
//! stage in [`crate::pipeline`].

pub mod multi;
pub mod numeric;

pub use multi::MultiContext;
pub use numeric::{NumericContext, ValueKinds};

use crate::delegate::{default_context_delegate, ContextDelegate};
use crate::error::ContextError;
use crate::event::ContextEvents;
use crate::item::ContextItem;
use crate::value::Value;
use std::sync::Arc;

/// Shared handle to any context
pub type ContextRef = Arc<dyn Context>;

pub trait Context: Send + Sync {
    fn get(&self, name: &str) -> Result<Value, ContextError>;

    fn set(&self, name: &str, value: Value) -> Result<(), ContextError>;

    fn delete(&self, name: &str) -> Result<(), ContextError>;

    fn contains(&self, name: &str) -> bool;

    /// Visible names in insertion order
    fn names(&self) -> Vec<String>;

    /// Common length of the arrays in this context (zero when there are none)
    fn len(&self) -> usize;

    fn events(&self) -> &ContextEvents;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn delegate(&self) -> Arc<dyn ContextDelegate> {
        default_context_delegate()
    }

    /// Whether a `set` of this value would be accepted
    fn accepts(&self, _name: &str, _value: &Value) -> bool {
        true
    }

    /// Names currently holding arrays
    fn context_names(&self) -> Vec<String> {
        self.names()
            .into_iter()
            .filter(|name| matches!(self.get(name), Ok(Value::Array(_))))
            .collect()
    }

    /// The context writes ultimately land on; `None` when this context is one
    fn context_base(&self) -> Option<ContextRef> {
        None
    }

    fn context_items(&self) -> Vec<ContextItem> {
        self.names().into_iter().map(ContextItem::new).collect()
    }

    fn define_item(&self, item: ContextItem) -> Result<(), ContextError> {
        Err(ContextError::Item {
            name: item.name().to_string(),
            reason: "this context does not hold items".to_string(),
        })
    }

    /// Remove every name
    fn clear(&self) -> Result<(), ContextError> {
        let _deferred = self.events().deferring();
        for name in self.names() {
            self.delete(&name)?;
        }
        Ok(())
    }

    /// Bulk assignment posting one coalesced event
    fn update(&self, values: Vec<(String, Value)>) -> Result<(), ContextError> {
        let _deferred = self.events().deferring();
        for (name, value) in values {
            self.set(&name, value)?;
        }
        Ok(())
    }

    fn defer_events(&self) {
        self.events().defer();
    }

    fn flush_events(&self) {
        self.events().flush();
    }

    /// Resolve `sub.leaf` through nested contexts
    fn get_dotted(&self, name: &str) -> Result<Value, ContextError> {
        match name.split_once('.') {
            None => self.get(name),
            Some((head, rest)) => {
                let value = self.get(head)?;
                let nested = value
                    .as_context()
                    .ok_or_else(|| ContextError::UnknownName(name.to_string()))?;
                nested.get_dotted(rest)
            }
        }
    }

    fn set_dotted(&self, name: &str, value: Value) -> Result<(), ContextError> {
        match name.split_once('.') {
            None => self.set(name, value),
            Some((head, rest)) => {
                let nested = self.get(head)?;
                let nested = nested
                    .as_context()
                    .ok_or_else(|| ContextError::UnknownName(name.to_string()))?;
                nested.set_dotted(rest, value)
            }
        }
    }
}

/// The context writes made through `context` land on
pub fn base_of(context: &ContextRef) -> ContextRef {
    context.context_base().unwrap_or_else(|| context.clone())
}

/// Names must be identifiers
pub fn validate_name(name: &str) -> Result<(), ContextError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ContextError::Item {
            name: name.to_string(),
            reason: "names must be identifiers".to_string(),
        })
    }
}
