//! Writes restricted to a subset of an array's elements
//!
//! Both the mask-stack executor and the index-view stages (reduction,
//! selection, mapping) funnel their writes through here: a value written
//! "under" an index set lands at those positions of a full-length array in
//! the context underneath.

use crate::context::Context;
use crate::delegate::ContextDelegate;
use crate::error::ContextError;
use crate::value::array::mask_indices;
use crate::value::{Array, Scalar, Value};

/// New full-length value for `name` after writing `value` at `indices`
///
/// `existing` is the value currently stored (if any). Without an existing
/// array a new one is created, filled with the delegate's default value for
/// the written data.
pub fn indexed_assign(
    name: &str,
    existing: Option<&Value>,
    value: &Value,
    indices: &[usize],
    full_len: usize,
    delegate: &dyn ContextDelegate,
) -> Result<Value, ContextError> {
    let type_error = |source| ContextError::TypeMismatch {
        name: name.to_string(),
        source,
    };

    let written = match value {
        Value::Array(array) => Some(array.as_ref().clone()),
        Value::Sequence(_) => Some(Array::from_value(value).map_err(type_error)?),
        Value::Scalar(_) => None,
        other => {
            return Err(ContextError::InvalidValue {
                name: name.to_string(),
                reason: format!("cannot assign a {} under a mask", other.kind()),
            })
        }
    };

    let mut base = match existing {
        Some(Value::Array(current)) => {
            if current.len() != full_len {
                return Err(ContextError::LengthMismatch {
                    name: name.to_string(),
                    expected: full_len,
                    found: current.len(),
                });
            }
            current.as_ref().clone()
        }
        _ => {
            let sample = match &written {
                Some(array) => Value::array(array.clone()),
                None => value.clone(),
            };
            let fill = delegate
                .default_value_for(name, &sample)
                .ok_or_else(|| ContextError::InvalidValue {
                    name: name.to_string(),
                    reason: "no default fill value for a new masked array".to_string(),
                })?;
            let dtype = sample.dtype().unwrap_or_else(|| fill.dtype());
            Array::full(dtype, full_len, &fill).map_err(type_error)?
        }
    };

    match (written, value) {
        (Some(array), _) if array.len() == indices.len() => {
            base.scatter(indices, &array).map_err(type_error)?
        }
        (Some(array), _) if array.len() == full_len => base
            .scatter(indices, &array.gather(indices))
            .map_err(type_error)?,
        (Some(array), _) => {
            return Err(ContextError::LengthMismatch {
                name: name.to_string(),
                expected: indices.len(),
                found: array.len(),
            })
        }
        (None, Value::Scalar(scalar)) => base.fill_at(indices, scalar).map_err(type_error)?,
        (None, _) => {
            return Err(ContextError::InvalidValue {
                name: name.to_string(),
                reason: "expected a scalar".to_string(),
            })
        }
    }
    Ok(Value::array(base))
}

/// [`indexed_assign`] with the positions given as a full-length mask
pub fn masked_assign(
    name: &str,
    existing: Option<&Value>,
    value: &Value,
    mask: &[bool],
    delegate: &dyn ContextDelegate,
) -> Result<Value, ContextError> {
    indexed_assign(
        name,
        existing,
        value,
        &mask_indices(mask),
        mask.len(),
        delegate,
    )
}

/// Fills hidden positions with an item's reduction sentinel when it fits the
/// written dtype, deferring to the context's delegate otherwise
struct SentinelFill<'a> {
    sentinel: Scalar,
    inner: &'a dyn ContextDelegate,
}

impl ContextDelegate for SentinelFill<'_> {
    fn default_value_for(&self, name: &str, sample: &Value) -> Option<Scalar> {
        sample
            .dtype()
            .and_then(|dtype| self.sentinel.coerce(dtype).ok())
            .or_else(|| self.inner.default_value_for(name, sample))
    }
}

/// Value to store in `context` when `value` is written to `name` through a
/// view exposing only `indices`
///
/// Arrays (existing or written) are scattered; an existing non-array is
/// replaced; a new scalar creates a default-filled array. A name with a
/// defined item but no stored value is filled with the item's sentinel.
/// Contexts without arrays take every write as-is.
pub fn assign_through(
    context: &dyn Context,
    name: &str,
    value: Value,
    indices: &[usize],
) -> Result<Value, ContextError> {
    let full_len = context.len();
    if full_len == 0 {
        return Ok(value);
    }
    let existing = if context.contains(name) {
        Some(context.get(name)?)
    } else {
        None
    };
    let delegate = context.delegate();
    let scatter = match (&existing, &value) {
        (Some(Value::Array(_)), _) => true,
        (_, Value::Array(_)) | (_, Value::Sequence(_)) => true,
        (Some(_), _) => false,
        (None, Value::Scalar(_)) => true,
        (None, _) => false,
    };
    if !scatter {
        return Ok(value);
    }
    let sentinel = match existing {
        Some(_) => None,
        None => context
            .context_items()
            .into_iter()
            .find(|item| item.name() == name)
            .map(|item| item.meta.value),
    };
    match sentinel {
        Some(sentinel) => indexed_assign(
            name,
            None,
            &value,
            indices,
            full_len,
            &SentinelFill {
                sentinel,
                inner: delegate.as_ref(),
            },
        ),
        None => indexed_assign(
            name,
            existing.as_ref(),
            &value,
            indices,
            full_len,
            delegate.as_ref(),
        ),
    }
}
