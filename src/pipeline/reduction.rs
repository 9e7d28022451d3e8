use super::indexed::{IndexSource, IndexedContext};
use crate::context::{Context, ContextRef};
use crate::filter::{self, Filter, FilterResult};
use crate::value::array::mask_indices;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// View of the elements a filter's mask keeps
///
/// Reads return `a[mask]`; writes land in `a[mask]` upstream. While the
/// filter is inactive the view exposes everything.
pub type ReductionContext = IndexedContext<MaskSource>;

pub struct MaskSource {
    filter: Arc<dyn Filter>,
}

impl IndexSource for MaskSource {
    fn kind(&self) -> &'static str {
        "reduction"
    }

    fn indices(&self, upstream: &dyn Context) -> Option<Vec<usize>> {
        match filter::evaluate(self.filter.as_ref(), upstream)? {
            FilterResult::Mask(mask) if mask.len() == upstream.len() => Some(mask_indices(&mask)),
            FilterResult::Mask(mask) => {
                warn!(
                    filter = self.filter.kind(),
                    mask = mask.len(),
                    context = upstream.len(),
                    "ignoring mask of the wrong length"
                );
                None
            }
            FilterResult::Permutation(_) => {
                warn!(
                    filter = self.filter.kind(),
                    "reduction ignores a permutation result"
                );
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

impl IndexedContext<MaskSource> {
    pub fn new(upstream: ContextRef, filter: Arc<dyn Filter>) -> Arc<Self> {
        Self::with_source(upstream, MaskSource { filter })
    }
}
