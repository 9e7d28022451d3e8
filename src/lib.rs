//! numctx: Reactive Numeric Context Pipelines
//!
//! Named numeric values held in contexts that notify listeners of changes,
//! chained through derivative contexts that reduce, select, reorder, extend
//! and cache, and driven by blocks of a small numeric expression language
//! executed under a mask stack.

pub mod block;
pub mod cli;
pub mod config;
pub mod context;
pub mod delegate;
pub mod error;
pub mod event;
pub mod filter;
pub mod item;
pub mod logging;
pub mod pipeline;
pub mod scatter;
pub mod snapshot;
pub mod value;

pub use block::{Block, Expression};
pub use context::{Context, ContextRef, MultiContext, NumericContext};
pub use error::{BlockError, ContextError, FilterError, SnapshotError, ValueError};
pub use event::ContextModified;
pub use pipeline::Pipeline;
pub use value::{Array, Scalar, Value};
