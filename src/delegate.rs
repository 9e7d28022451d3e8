//! Context delegates: fill values and length policy

use crate::value::{Scalar, Value};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// What a context does when an array arrives with a different length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthPolicy {
    /// Resize every other array, padding with default fill values
    #[default]
    Reallocate,
    /// Fail with a length mismatch
    Reject,
}

/// Policy object consulted by contexts
pub trait ContextDelegate: Send + Sync {
    /// Fill value for `name` given a sample of the data being stored
    ///
    /// `None` means no sensible default exists.
    fn default_value_for(&self, name: &str, sample: &Value) -> Option<Scalar> {
        let _ = name;
        match sample {
            Value::Scalar(s) => Some(Scalar::default_for(s.dtype())),
            Value::Array(a) => Some(Scalar::default_for(a.dtype())),
            _ => None,
        }
    }

    fn length_policy(&self) -> LengthPolicy {
        LengthPolicy::Reallocate
    }
}

/// Delegate with the stock fills and a configurable length policy
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDelegate {
    policy: LengthPolicy,
}

impl DefaultDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: LengthPolicy) -> Self {
        Self { policy }
    }
}

impl ContextDelegate for DefaultDelegate {
    fn length_policy(&self) -> LengthPolicy {
        self.policy
    }
}

/// Process-wide delegate used by contexts created without one
pub fn default_context_delegate() -> Arc<dyn ContextDelegate> {
    static DEFAULT: OnceLock<Arc<dyn ContextDelegate>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(DefaultDelegate::new()))
        .clone()
}
