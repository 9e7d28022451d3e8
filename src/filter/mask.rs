use super::{Filter, FilterCore, FilterModified, FilterResult};
use crate::context::Context;
use crate::error::FilterError;
use crate::event::Channel;
use parking_lot::RwLock;

/// A fixed mask
pub struct MaskFilter {
    core: FilterCore,
    mask: RwLock<Vec<bool>>,
}

impl MaskFilter {
    pub fn new(mask: Vec<bool>) -> Self {
        Self {
            core: FilterCore::default(),
            mask: RwLock::new(mask),
        }
    }

    pub fn mask(&self) -> Vec<bool> {
        self.mask.read().clone()
    }

    pub fn set_mask(&self, mask: Vec<bool>) {
        *self.mask.write() = mask;
        self.core.notify("mask");
    }
}

impl Filter for MaskFilter {
    fn kind(&self) -> &'static str {
        "mask"
    }

    fn evaluate(&self, context: &dyn Context) -> Result<Option<FilterResult>, FilterError> {
        let mask = self.mask.read();
        if mask.len() != context.len() {
            return Err(FilterError::Evaluation(format!(
                "mask has {} elements, context has {}",
                mask.len(),
                context.len()
            )));
        }
        Ok(Some(FilterResult::Mask(mask.clone())))
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
