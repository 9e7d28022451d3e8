use super::indexed::{IndexSource, IndexedContext};
use crate::context::{Context, ContextRef};
use crate::filter::{self, Filter, FilterResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// View reordered by a permutation filter (a sort view)
///
/// Reads return `a[order]`; writes put element `k` of the written value at
/// upstream position `order[k]`, which applies the inverse permutation.
pub type MappingContext = IndexedContext<PermutationSource>;

pub struct PermutationSource {
    filter: Arc<dyn Filter>,
}

fn is_permutation(order: &[usize]) -> bool {
    let mut seen = vec![false; order.len()];
    for &index in order {
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

impl IndexSource for PermutationSource {
    fn kind(&self) -> &'static str {
        "mapping"
    }

    fn indices(&self, upstream: &dyn Context) -> Option<Vec<usize>> {
        match filter::evaluate(self.filter.as_ref(), upstream)? {
            FilterResult::Permutation(order)
                if order.len() == upstream.len() && is_permutation(&order) =>
            {
                Some(order)
            }
            FilterResult::Permutation(_) => {
                warn!(filter = self.filter.kind(), "ignoring an invalid permutation");
                None
            }
            FilterResult::Mask(_) => {
                warn!(filter = self.filter.kind(), "mapping ignores a mask result");
                None
            }
        }
    }

    fn depends_on(&self, upstream: &dyn Context, names: &BTreeSet<String>) -> bool {
        self.filter.context_changed(upstream, names)
    }

    fn filter(&self) -> Option<Arc<dyn Filter>> {
        Some(self.filter.clone())
    }
}

impl IndexedContext<PermutationSource> {
    pub fn new(upstream: ContextRef, filter: Arc<dyn Filter>) -> Arc<Self> {
        Self::with_source(upstream, PermutationSource { filter })
    }
}
