use super::{Filter, FilterCore, FilterModified, FilterResult};
use crate::context::Context;
use crate::error::FilterError;
use crate::event::Channel;
use crate::value::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Keeps rows where every array is finite (or, not inverted, where any is not)
pub struct NaNFilter {
    core: FilterCore,
    invert: AtomicBool,
}

impl Default for NaNFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl NaNFilter {
    pub fn new() -> Self {
        Self {
            core: FilterCore::default(),
            invert: AtomicBool::new(true),
        }
    }

    pub fn invert(&self) -> bool {
        self.invert.load(Ordering::Acquire)
    }

    pub fn set_invert(&self, invert: bool) {
        self.invert.store(invert, Ordering::Release);
        self.core.notify("invert");
    }
}

impl Filter for NaNFilter {
    fn kind(&self) -> &'static str {
        "nan"
    }

    fn evaluate(&self, context: &dyn Context) -> Result<Option<FilterResult>, FilterError> {
        let mut finite = vec![true; context.len()];
        for name in context.context_names() {
            if let Value::Array(array) = context.get(&name)? {
                if array.len() != finite.len() {
                    continue;
                }
                for (slot, ok) in finite.iter_mut().zip(array.is_finite()) {
                    *slot &= ok;
                }
            }
        }
        if !self.invert() {
            finite.iter_mut().for_each(|f| *f = !*f);
        }
        Ok(Some(FilterResult::Mask(finite)))
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.core.set_enabled(enabled)
    }

    fn context_changed(&self, context: &dyn Context, names: &BTreeSet<String>) -> bool {
        context
            .context_names()
            .iter()
            .any(|name| names.contains(name))
    }

    fn modified(&self) -> &Channel<FilterModified> {
        self.core.modified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NumericContext;

    fn ctx() -> NumericContext {
        let ctx = NumericContext::new();
        ctx.set("a", Value::from(vec![1.0, f64::NAN, 3.0])).unwrap();
        ctx.set("b", Value::from(vec![1.0, 2.0, f64::INFINITY])).unwrap();
        ctx.set("n", Value::from(vec![1i64, 2, 3])).unwrap();
        ctx.set("label", Value::from("x")).unwrap();
        ctx
    }

    #[test]
    fn keeps_rows_finite_in_every_array() {
        let filter = NaNFilter::new();
        assert_eq!(
            filter.evaluate(&ctx()).unwrap(),
            Some(FilterResult::Mask(vec![true, false, false]))
        );
    }

    #[test]
    fn not_inverted_selects_non_finite_rows() {
        let filter = NaNFilter::new();
        filter.set_invert(false);
        assert_eq!(
            filter.evaluate(&ctx()).unwrap(),
            Some(FilterResult::Mask(vec![false, true, true]))
        );
    }

    #[test]
    fn only_array_names_are_relevant() {
        let ctx = ctx();
        let filter = NaNFilter::new();
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        assert!(filter.context_changed(&ctx, &names(&["a"])));
        assert!(!filter.context_changed(&ctx, &names(&["label"])));
        assert!(!filter.context_changed(&ctx, &names(&["elsewhere"])));
    }
}
