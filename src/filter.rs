//! Filters: pure functions from a context to a mask or a permutation
//!
//! Filters never store their result in a context. Pipeline stages call
//! [`evaluate`], which applies the propagation policy: a disabled filter
//! yields nothing, and a filter that fails is logged and treated as
//! inactive rather than poisoning the pipeline.

pub mod aggregate;
pub mod expression;
pub mod index;
pub mod mask;
pub mod nan;
pub mod polygon;
pub mod set;
pub mod sort;

pub use aggregate::{AggregateFilter, AggregateRule};
pub use expression::ExpressionFilter;
pub use index::IndexFilter;
pub use mask::MaskFilter;
pub use nan::NaNFilter;
pub use polygon::{PolygonFilter, Ring};
pub use set::FilterSet;
pub use sort::{SortFilter, SortMode};

use crate::context::Context;
use crate::error::FilterError;
use crate::event::Channel;
use crate::value::array::mask_indices;
use crate::value::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Output of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    /// One flag per element of the context
    Mask(Vec<bool>),
    /// A permutation of `0..len`
    Permutation(Vec<usize>),
}

impl FilterResult {
    /// Upstream positions visible through this result, in view order
    pub fn indices(&self) -> Vec<usize> {
        match self {
            FilterResult::Mask(mask) => mask_indices(mask),
            FilterResult::Permutation(order) => order.clone(),
        }
    }

    pub fn as_mask(&self) -> Option<&[bool]> {
        match self {
            FilterResult::Mask(mask) => Some(mask),
            FilterResult::Permutation(_) => None,
        }
    }
}

/// Posted when a filter parameter changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterModified {
    pub parameter: String,
}

impl FilterModified {
    pub fn new(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
        }
    }
}

pub trait Filter: Send + Sync {
    /// Short kind name used in logs
    fn kind(&self) -> &'static str;

    fn evaluate(&self, context: &dyn Context) -> Result<Option<FilterResult>, FilterError>;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    /// Whether the output may depend on any of `names`
    fn context_changed(&self, _context: &dyn Context, _names: &BTreeSet<String>) -> bool {
        true
    }

    fn modified(&self) -> &Channel<FilterModified>;
}

/// Evaluate with the pipeline policy applied
pub fn evaluate(filter: &dyn Filter, context: &dyn Context) -> Option<FilterResult> {
    if !filter.is_enabled() {
        return None;
    }
    match filter.evaluate(context) {
        Ok(result) => result,
        Err(err) => {
            warn!(
                filter = filter.kind(),
                error = %err,
                "filter evaluation failed, treating it as inactive"
            );
            None
        }
    }
}

/// Enabled flag and change channel shared by every filter
pub struct FilterCore {
    enabled: AtomicBool,
    modified: Channel<FilterModified>,
}

impl Default for FilterCore {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            modified: Channel::new(),
        }
    }
}

impl FilterCore {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::AcqRel) != enabled {
            self.notify("enabled");
        }
    }

    pub fn notify(&self, parameter: &str) {
        self.modified.emit(&FilterModified::new(parameter));
    }

    pub fn modified(&self) -> &Channel<FilterModified> {
        &self.modified
    }
}

/// Coerce an expression result to a mask over `len` elements
pub(crate) fn value_to_mask(value: &Value, len: usize) -> Result<Vec<bool>, FilterError> {
    match value {
        Value::Scalar(s) => Ok(vec![s.is_truthy(); len]),
        Value::Array(_) | Value::Sequence(_) => {
            let mask = value.to_array()?.to_mask();
            if mask.len() != len {
                return Err(FilterError::Evaluation(format!(
                    "expression produced {} elements for a context of length {}",
                    mask.len(),
                    len
                )));
            }
            Ok(mask)
        }
        other => Err(FilterError::Evaluation(format!(
            "expression produced a {}, expected an array",
            other.kind()
        ))),
    }
}
