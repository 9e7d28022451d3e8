//! Context items
//!
//! An item is a handle for one named value inside one context, carrying the
//! view metadata consumers use to present it. Items come in three flavours:
//! owned storage, a path into a nested context, and an attribute owned by
//! some external object.

use crate::context::Context;
use crate::error::ContextError;
use crate::value::{Scalar, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Presentation metadata attached to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub foreground_color: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Fill for hidden elements when a name is first written through a
    /// reduced view; ignored when it cannot take the written dtype
    #[serde(default = "default_sentinel")]
    pub value: Scalar,
}

fn default_sentinel() -> Scalar {
    Scalar::Float(f64::NAN)
}

impl Default for ItemMeta {
    fn default() -> Self {
        Self {
            label: None,
            format: None,
            foreground_color: None,
            background_color: None,
            groups: BTreeSet::new(),
            value: default_sentinel(),
        }
    }
}

/// An object exposing named attributes that a context can present as items
pub trait AttributeHost: Send + Sync {
    fn get_attribute(&self, name: &str) -> Option<Value>;
    fn set_attribute(&self, name: &str, value: Value) -> Result<(), ContextError>;
}

/// Where an item's data lives
#[derive(Clone)]
pub enum ItemSource {
    /// Stored directly in the context
    Owned,
    /// `parent[context].get_dotted(name)`
    SubContext { context: String, name: String },
    /// An attribute of an external object
    Attribute {
        host: Arc<dyn AttributeHost>,
        attribute: String,
    },
}

impl fmt::Debug for ItemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemSource::Owned => f.write_str("Owned"),
            ItemSource::SubContext { context, name } => f
                .debug_struct("SubContext")
                .field("context", context)
                .field("name", name)
                .finish(),
            ItemSource::Attribute { attribute, .. } => f
                .debug_struct("Attribute")
                .field("attribute", attribute)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextItem {
    name: String,
    source: ItemSource,
    pub meta: ItemMeta,
}

impl ContextItem {
    /// Item over the context's own storage
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ItemSource::Owned,
            meta: ItemMeta::default(),
        }
    }

    /// Item reading through the nested context bound to `context`
    pub fn sub_context(
        name: impl Into<String>,
        context: impl Into<String>,
        sub_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: ItemSource::SubContext {
                context: context.into(),
                name: sub_name.into(),
            },
            meta: ItemMeta::default(),
        }
    }

    /// Item reading an attribute of an external object
    pub fn attribute(
        name: impl Into<String>,
        host: Arc<dyn AttributeHost>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: ItemSource::Attribute {
                host,
                attribute: attribute.into(),
            },
            meta: ItemMeta::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.meta.label = Some(label.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.meta.format = Some(format.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.meta.groups.insert(group.into());
        self
    }

    /// Fill for positions a reduced view hides when the name is first written
    /// through it
    pub fn with_sentinel(mut self, sentinel: Scalar) -> Self {
        self.meta.value = sentinel;
        self
    }

    pub fn with_meta(mut self, meta: ItemMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ItemSource {
        &self.source
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.source, ItemSource::Owned)
    }

    /// Label shown to users, falling back to the name
    pub fn display_label(&self) -> &str {
        self.meta.label.as_deref().unwrap_or(&self.name)
    }

    /// Check the item can be bound in a context
    pub fn validate(&self) -> Result<(), ContextError> {
        crate::context::validate_name(&self.name)?;
        if let ItemSource::SubContext { context, name } = &self.source {
            if context == &self.name {
                return Err(ContextError::Item {
                    name: self.name.clone(),
                    reason: "a sub-context item cannot read through itself".to_string(),
                });
            }
            if name.is_empty() {
                return Err(ContextError::Item {
                    name: self.name.clone(),
                    reason: "sub-context item needs a target name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Current data of the item as seen from `context`
    pub fn data(&self, context: &dyn Context) -> Result<Value, ContextError> {
        match &self.source {
            ItemSource::Owned => context.get(&self.name),
            ItemSource::SubContext { context: sub, name } => {
                let nested = context.get(sub)?;
                let nested = nested.as_context().ok_or_else(|| ContextError::Item {
                    name: self.name.clone(),
                    reason: format!("'{}' is not a context", sub),
                })?;
                nested.get_dotted(name)
            }
            ItemSource::Attribute { host, attribute } => host
                .get_attribute(attribute)
                .ok_or_else(|| ContextError::UnknownName(attribute.clone())),
        }
    }

    /// Write the item's data through `context`
    pub fn set_data(&self, context: &dyn Context, value: Value) -> Result<(), ContextError> {
        match &self.source {
            ItemSource::Owned => context.set(&self.name, value),
            ItemSource::SubContext { context: sub, name } => {
                let nested = context.get(sub)?;
                let nested = nested.as_context().ok_or_else(|| ContextError::Item {
                    name: self.name.clone(),
                    reason: format!("'{}' is not a context", sub),
                })?;
                nested.set_dotted(name, value)
            }
            ItemSource::Attribute { host, attribute } => host.set_attribute(attribute, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sentinel_is_nan() {
        let item = ContextItem::new("x");
        assert!(matches!(item.meta.value, Scalar::Float(f) if f.is_nan()));
        assert_eq!(item.display_label(), "x");
        assert!(item.is_owned());
    }

    #[test]
    fn builder_sets_metadata() {
        let item = ContextItem::new("depth")
            .with_label("Depth (m)")
            .with_format("%.2f")
            .with_group("logs");
        assert_eq!(item.display_label(), "Depth (m)");
        assert_eq!(item.meta.format.as_deref(), Some("%.2f"));
        assert!(item.meta.groups.contains("logs"));
    }

    #[test]
    fn self_referencing_sub_context_is_invalid() {
        let item = ContextItem::sub_context("a", "a", "b");
        assert!(matches!(item.validate(), Err(ContextError::Item { .. })));
        assert!(ContextItem::new("1bad").validate().is_err());
    }
}
