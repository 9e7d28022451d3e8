//! Derivative contexts and the pipeline topology
//!
//! A pipeline is a chain of stages over a base context. Each stage holds
//! its upstream strongly and subscribes to it through a weak back-reference,
//! re-emitting upstream events in the order they were produced. Stages
//! never own base storage, with [`ExtensionContext`] as the one declared
//! exception.

pub mod cached;
pub mod derivative;
pub mod extension;
pub mod indexed;
pub mod mapping;
pub mod reduction;
pub mod selection;
pub mod termination;
pub mod upstream;

pub use cached::CachedContext;
pub use derivative::{DerivativeContext, EventTranslator};
pub use extension::ExtensionContext;
pub use indexed::{IndexSource, IndexedContext};
pub use mapping::MappingContext;
pub use reduction::ReductionContext;
pub use selection::SelectionContext;
pub use termination::{PassThruContext, TerminationContext};
pub use upstream::{FilterLink, Upstream};

use crate::context::{base_of, ContextRef};
use crate::filter::Filter;
use std::sync::Arc;
use tracing::debug;

/// Immutable chain of stages, built front to back
///
/// Each builder method consumes the pipeline and returns it with one more
/// stage on top.
///
/// ```ignore
/// let pipeline = Pipeline::new(leaf)
///     .extend()
///     .reduce(finite)
///     .sort(by_time)
///     .cached()
///     .terminate();
/// let view = pipeline.output();
/// ```
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<ContextRef>,
    top: ContextRef,
    terminal: Option<Arc<TerminationContext>>,
}

impl Pipeline {
    pub fn new(base: ContextRef) -> Self {
        Self {
            stages: vec![base.clone()],
            top: base,
            terminal: None,
        }
    }

    /// Put a custom stage on top; `build` receives the current output
    pub fn push<F>(mut self, build: F) -> Self
    where
        F: FnOnce(ContextRef) -> ContextRef,
    {
        let stage = build(self.output());
        debug!(depth = self.stages.len(), "pipeline stage added");
        self.stages.push(stage.clone());
        self.top = stage;
        self
    }

    pub fn derive(self) -> Self {
        self.push(|upstream| DerivativeContext::new(upstream))
    }

    pub fn extend(self) -> Self {
        self.push(|upstream| ExtensionContext::new(upstream))
    }

    pub fn reduce(self, filter: Arc<dyn Filter>) -> Self {
        self.push(|upstream| ReductionContext::new(upstream, filter))
    }

    pub fn select(self, indices: Vec<usize>) -> Self {
        self.push(|upstream| SelectionContext::with_indices(upstream, indices))
    }

    pub fn select_by(self, filter: Arc<dyn Filter>) -> Self {
        self.push(|upstream| SelectionContext::with_filter(upstream, filter))
    }

    pub fn sort(self, filter: Arc<dyn Filter>) -> Self {
        self.push(|upstream| MappingContext::new(upstream, filter))
    }

    pub fn cached(self) -> Self {
        self.push(|upstream| CachedContext::new(upstream))
    }

    pub fn pass_thru(self, read_only: bool) -> Self {
        self.push(|upstream| {
            if read_only {
                PassThruContext::read_only(upstream)
            } else {
                PassThruContext::new(upstream)
            }
        })
    }

    pub fn terminate(mut self) -> Self {
        let terminal = TerminationContext::new(self.output());
        self.stages.push(terminal.clone());
        self.top = terminal.clone();
        self.terminal = Some(terminal);
        self
    }

    /// The last stage; what consumers read from
    pub fn output(&self) -> ContextRef {
        self.top.clone()
    }

    /// The context writes through [`Self::output`] land on
    pub fn base(&self) -> ContextRef {
        base_of(&self.output())
    }

    pub fn stages(&self) -> &[ContextRef] {
        &self.stages
    }

    /// The swappable handle added by [`Self::terminate`]
    pub fn terminal(&self) -> Option<&Arc<TerminationContext>> {
        self.terminal.as_ref()
    }
}
