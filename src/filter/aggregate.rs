use super::{evaluate, Filter, FilterCore, FilterModified, FilterResult};
use crate::context::Context;
use crate::error::FilterError;
use crate::event::Channel;
use crate::pipeline::FilterLink;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateRule {
    #[default]
    Any,
    All,
}

/// Element-wise OR / AND of child masks
///
/// Children that yield nothing (disabled, failed, empty) are skipped, as are
/// permutations. Parameter changes of any child are forwarded as `filters`.
pub struct AggregateFilter {
    core: FilterCore,
    rule: RwLock<AggregateRule>,
    children: RwLock<Vec<FilterLink>>,
    this: Weak<AggregateFilter>,
}

impl AggregateFilter {
    pub fn new(rule: AggregateRule, filters: Vec<Arc<dyn Filter>>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<AggregateFilter>| Self {
            core: FilterCore::default(),
            rule: RwLock::new(rule),
            children: RwLock::new(
                filters
                    .into_iter()
                    .map(|filter| Self::link(filter, this.clone()))
                    .collect(),
            ),
            this: this.clone(),
        })
    }

    fn link(filter: Arc<dyn Filter>, owner: Weak<AggregateFilter>) -> FilterLink {
        FilterLink::attach(filter, owner, |aggregate: &AggregateFilter, _| {
            aggregate.core.notify("filters")
        })
    }

    pub fn rule(&self) -> AggregateRule {
        *self.rule.read()
    }

    pub fn set_rule(&self, rule: AggregateRule) {
        *self.rule.write() = rule;
        self.core.notify("rule");
    }

    pub fn filters(&self) -> Vec<Arc<dyn Filter>> {
        self.children
            .read()
            .iter()
            .map(|link| link.filter().clone())
            .collect()
    }

    pub fn add_filter(&self, filter: Arc<dyn Filter>) {
        let link = Self::link(filter, self.this.clone());
        self.children.write().push(link);
        self.core.notify("filters");
    }

    /// Replace the children; links to the old ones are dropped
    pub fn set_filters(&self, filters: Vec<Arc<dyn Filter>>) {
        let links = filters
            .into_iter()
            .map(|filter| Self::link(filter, self.this.clone()))
            .collect();
        let old = std::mem::replace(&mut *self.children.write(), links);
        drop(old);
        self.core.notify("filters");
    }
}

impl Filter for AggregateFilter {
    fn kind(&self) -> &'static str {
        "aggregate"
    }

    fn evaluate(&self, context: &dyn Context) -> Result<Option<FilterResult>, FilterError> {
        let rule = self.rule();
        let mut combined: Option<Vec<bool>> = None;
        for filter in self.filters() {
            let Some(FilterResult::Mask(mask)) = evaluate(filter.as_ref(), context) else {
                continue;
            };
            combined = Some(match combined {
                None => mask,
                Some(acc) => acc
                    .iter()
                    .zip(&mask)
                    .map(|(a, b)| match rule {
                        AggregateRule::Any => *a || *b,
                        AggregateRule::All => *a && *b,
                    })
                    .collect(),
            });
        }
        Ok(combined.map(FilterResult::Mask))
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.core.set_enabled(enabled)
    }

    fn context_changed(&self, context: &dyn Context, names: &BTreeSet<String>) -> bool {
        self.filters()
            .iter()
            .any(|filter| filter.context_changed(context, names))
    }

    fn modified(&self) -> &Channel<FilterModified> {
        self.core.modified()
    }
}
