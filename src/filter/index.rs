use super::{Filter, FilterCore, FilterModified, FilterResult};
use crate::context::Context;
use crate::error::FilterError;
use crate::event::Channel;
use parking_lot::RwLock;

struct Params {
    indices: Vec<usize>,
    invert: bool,
}

/// Selects listed positions; out-of-range indices are ignored
pub struct IndexFilter {
    core: FilterCore,
    params: RwLock<Params>,
}

impl IndexFilter {
    pub fn new(indices: Vec<usize>) -> Self {
        Self {
            core: FilterCore::default(),
            params: RwLock::new(Params {
                indices,
                invert: false,
            }),
        }
    }

    pub fn inverted(self) -> Self {
        self.params.write().invert = true;
        self
    }

    pub fn indices(&self) -> Vec<usize> {
        self.params.read().indices.clone()
    }

    pub fn set_indices(&self, indices: Vec<usize>) {
        self.params.write().indices = indices;
        self.core.notify("indices");
    }

    pub fn invert(&self) -> bool {
        self.params.read().invert
    }

    pub fn set_invert(&self, invert: bool) {
        self.params.write().invert = invert;
        self.core.notify("invert");
    }
}

impl Filter for IndexFilter {
    fn kind(&self) -> &'static str {
        "index"
    }

    fn evaluate(&self, context: &dyn Context) -> Result<Option<FilterResult>, FilterError> {
        let params = self.params.read();
        let mut mask = vec![params.invert; context.len()];
        for &index in &params.indices {
            if let Some(slot) = mask.get_mut(index) {
                *slot = !params.invert;
            }
        }
        Ok(Some(FilterResult::Mask(mask)))
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.core.set_enabled(enabled)
    }

    fn modified(&self) -> &Channel<FilterModified> {
        self.core.modified()
    }
}
