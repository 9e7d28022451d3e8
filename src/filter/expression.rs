use super::{value_to_mask, Filter, FilterCore, FilterModified, FilterResult};
use crate::block::Expression;
use crate::context::Context;
use crate::error::FilterError;
use crate::event::Channel;
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Mask computed from a user expression such as `(a > 1) & isfinite(b)`
pub struct ExpressionFilter {
    core: FilterCore,
    expression: RwLock<Option<Expression>>,
}

impl Default for ExpressionFilter {
    fn default() -> Self {
        Self {
            core: FilterCore::default(),
            expression: RwLock::new(None),
        }
    }
}

impl ExpressionFilter {
    pub fn new(source: &str) -> Result<Self, FilterError> {
        let filter = Self::default();
        *filter.expression.write() = Some(Expression::parse(source)?);
        Ok(filter)
    }

    pub fn source(&self) -> Option<String> {
        self.expression
            .read()
            .as_ref()
            .map(|expr| expr.source().to_string())
    }

    /// Replace the expression; an empty source clears it
    pub fn set_source(&self, source: &str) -> Result<(), FilterError> {
        let parsed = if source.trim().is_empty() {
            None
        } else {
            Some(Expression::parse(source)?)
        };
        *self.expression.write() = parsed;
        self.core.notify("filter");
        Ok(())
    }
}

impl Filter for ExpressionFilter {
    fn kind(&self) -> &'static str {
        "expression"
    }

    fn evaluate(&self, context: &dyn Context) -> Result<Option<FilterResult>, FilterError> {
        let expression = self.expression.read().clone();
        let Some(expression) = expression else {
            return Ok(None);
        };
        let value = expression.evaluate(context)?;
        Ok(Some(FilterResult::Mask(value_to_mask(&value, context.len())?)))
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.core.set_enabled(enabled)
    }

    fn context_changed(&self, _context: &dyn Context, names: &BTreeSet<String>) -> bool {
        match self.expression.read().as_ref() {
            Some(expression) => expression.inputs().iter().any(|name| names.contains(name)),
            None => false,
        }
    }

    fn modified(&self) -> &Channel<FilterModified> {
        self.core.modified()
    }
}
