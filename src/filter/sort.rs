use super::{Filter, FilterCore, FilterModified, FilterResult};
use crate::block::Expression;
use crate::context::Context;
use crate::error::FilterError;
use crate::event::Channel;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Asc,
    Desc,
}

struct Params {
    expression: Expression,
    mode: SortMode,
}

/// Stable ordering of the context by the value of an expression
pub struct SortFilter {
    core: FilterCore,
    params: RwLock<Params>,
}

impl SortFilter {
    pub fn new(source: &str, mode: SortMode) -> Result<Self, FilterError> {
        Ok(Self {
            core: FilterCore::default(),
            params: RwLock::new(Params {
                expression: Expression::parse(source)?,
                mode,
            }),
        })
    }

    pub fn mode(&self) -> SortMode {
        self.params.read().mode
    }

    pub fn set_mode(&self, mode: SortMode) {
        self.params.write().mode = mode;
        self.core.notify("mode");
    }

    pub fn source(&self) -> String {
        self.params.read().expression.source().to_string()
    }

    pub fn set_source(&self, source: &str) -> Result<(), FilterError> {
        let expression = Expression::parse(source)?;
        self.params.write().expression = expression;
        self.core.notify("filter");
        Ok(())
    }
}

impl Filter for SortFilter {
    fn kind(&self) -> &'static str {
        "sort"
    }

    fn evaluate(&self, context: &dyn Context) -> Result<Option<FilterResult>, FilterError> {
        let (expression, mode) = {
            let params = self.params.read();
            (params.expression.clone(), params.mode)
        };
        let keys = expression.evaluate(context)?.to_array()?;
        if keys.len() != context.len() {
            return Err(FilterError::Evaluation(format!(
                "sort key has {} elements, context has {}",
                keys.len(),
                context.len()
            )));
        }
        let order = keys.argsort(mode == SortMode::Desc)?;
        Ok(Some(FilterResult::Permutation(order)))
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.core.set_enabled(enabled)
    }

    fn context_changed(&self, _context: &dyn Context, names: &BTreeSet<String>) -> bool {
        let inputs = self.params.read().expression.inputs();
        inputs.iter().any(|name| names.contains(name))
    }

    fn modified(&self) -> &Channel<FilterModified> {
        self.core.modified()
    }
}
