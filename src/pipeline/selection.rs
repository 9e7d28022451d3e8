use super::indexed::{IndexSource, IndexedContext};
use crate::context::{Context, ContextRef};
use crate::error::ContextError;
use crate::filter::{self, Filter};
use crate::value::array::mask_indices;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// View of an index selection narrowed by a stack of masks
pub type SelectionContext = IndexedContext<SelectionSource>;

enum Base {
    Indices(Vec<usize>),
    Filter(Arc<dyn Filter>),
}

/// Base selection plus the mask stack
///
/// Masks are stored relative to the base selection; the top of the stack
/// is already the intersection of everything pushed below it.
pub struct SelectionSource {
    base: Base,
    masks: Mutex<Vec<Vec<bool>>>,
}

impl SelectionSource {
    fn base_indices(&self, upstream: &dyn Context) -> Vec<usize> {
        match &self.base {
            Base::Indices(indices) => indices.clone(),
            Base::Filter(filter) => match filter::evaluate(filter.as_ref(), upstream) {
                Some(result) => result.indices(),
                None => (0..upstream.len()).collect(),
            },
        }
    }
}

impl IndexSource for SelectionSource {
    fn kind(&self) -> &'static str {
        "selection"
    }

    fn indices(&self, upstream: &dyn Context) -> Option<Vec<usize>> {
        let base = self.base_indices(upstream);
        let masks = self.masks.lock();
        match masks.last() {
            None => Some(base),
            Some(mask) if mask.len() == base.len() => Some(
                base.into_iter()
                    .zip(mask)
                    .filter_map(|(index, keep)| keep.then_some(index))
                    .collect(),
            ),
            Some(mask) => {
                warn!(
                    mask = mask.len(),
                    selection = base.len(),
                    "selection changed under the mask stack, ignoring masks"
                );
                Some(base)
            }
        }
    }

    fn depends_on(&self, upstream: &dyn Context, names: &BTreeSet<String>) -> bool {
        match &self.base {
            Base::Indices(_) => false,
            Base::Filter(filter) => filter.context_changed(upstream, names),
        }
    }

    fn filter(&self) -> Option<Arc<dyn Filter>> {
        match &self.base {
            Base::Indices(_) => None,
            Base::Filter(filter) => Some(filter.clone()),
        }
    }
}

impl IndexedContext<SelectionSource> {
    /// Select explicit upstream positions, in the given order
    pub fn with_indices(upstream: ContextRef, indices: Vec<usize>) -> Arc<Self> {
        Self::with_source(
            upstream,
            SelectionSource {
                base: Base::Indices(indices),
                masks: Mutex::new(Vec::new()),
            },
        )
    }

    /// Select the positions a filter yields
    pub fn with_filter(upstream: ContextRef, filter: Arc<dyn Filter>) -> Arc<Self> {
        Self::with_source(
            upstream,
            SelectionSource {
                base: Base::Filter(filter),
                masks: Mutex::new(Vec::new()),
            },
        )
    }

    pub fn mask_depth(&self) -> usize {
        self.source().masks.lock().len()
    }

    /// Narrow the view; `mask` has one flag per currently visible element
    pub fn push_mask(&self, mask: &[bool]) -> Result<(), ContextError> {
        let base = self.source().base_indices(self.upstream().as_ref());
        let visible = self.len();
        if mask.len() != visible {
            return Err(ContextError::InvalidMask {
                expected: visible,
                found: mask.len(),
            });
        }
        {
            let mut masks = self.source().masks.lock();
            let current = match masks.last() {
                Some(top) if top.len() == base.len() => top.clone(),
                _ => vec![true; base.len()],
            };
            let mut narrowed = vec![false; base.len()];
            for (slot, keep) in mask_indices(&current).into_iter().zip(mask) {
                narrowed[slot] = *keep;
            }
            masks.push(narrowed);
            debug!(depth = masks.len(), "pushed selection mask");
        }
        self.refresh();
        Ok(())
    }

    pub fn pop_mask(&self) -> Result<(), ContextError> {
        if self.source().masks.lock().pop().is_none() {
            return Err(ContextError::MaskUnderflow);
        }
        self.refresh();
        Ok(())
    }
}
