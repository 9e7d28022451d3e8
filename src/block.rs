//! Blocks of user code executed against contexts
//!
//! A [`Block`] is parsed from a small Python-like language (assignments,
//! imports, calls, operators, subscripts and the `push_mask` / `pop_mask`
//! intrinsics). Blocks report their free inputs and bound outputs, can be
//! restricted to the statements relevant for a set of inputs or outputs,
//! and execute against any [`Context`].

pub mod analysis;
pub mod ast;
pub mod builtins;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{Expr, Stmt};
pub use eval::Executor;

use crate::context::Context;
use crate::error::BlockError;
use crate::value::Value;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    statements: Vec<Stmt>,
}

impl Block {
    pub fn from_source(source: &str) -> Result<Self, BlockError> {
        Ok(Self {
            statements: parser::parse_program(source)?,
        })
    }

    pub fn from_statements(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Names read before the block binds them
    pub fn inputs(&self) -> BTreeSet<String> {
        analysis::free_names(&self.statements)
    }

    /// Names the block binds
    pub fn outputs(&self) -> BTreeSet<String> {
        analysis::bound_names(&self.statements)
    }

    /// Sub-block affected by `inputs` and/or needed for `outputs`
    ///
    /// With neither given the whole block is returned.
    pub fn restrict(&self, inputs: &[&str], outputs: &[&str]) -> Result<Block, BlockError> {
        let kept = analysis::restrict(&self.statements, inputs, outputs)?;
        debug!(
            kept = kept.len(),
            total = self.statements.len(),
            "restricted block"
        );
        Ok(Block {
            statements: kept
                .into_iter()
                .map(|index| self.statements[index].clone())
                .collect(),
        })
    }

    /// Run the block; the context's events are coalesced into one
    /// notification that is posted even when execution fails
    pub fn execute(&self, context: &dyn Context) -> Result<(), BlockError> {
        let _deferred = context.events().deferring();
        Executor::new(context).run(&self.statements)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            writeln!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

/// A single expression, as used by filters
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    expr: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, BlockError> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse_expression(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn inputs(&self) -> BTreeSet<String> {
        self.expr
            .names()
            .into_iter()
            .filter(|name| !analysis::is_ambient(name))
            .collect()
    }

    pub fn evaluate(&self, context: &dyn Context) -> Result<Value, BlockError> {
        Executor::new(context).eval(&self.expr)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NumericContext;
    use crate::event::ContextModified;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn inputs_and_outputs() {
        let block = Block::from_source("c = add(a, b)\nd = mul(c, 16)").unwrap();
        let inputs: Vec<_> = block.inputs().into_iter().collect();
        let outputs: Vec<_> = block.outputs().into_iter().collect();
        assert_eq!(inputs, vec!["a", "b"]);
        assert_eq!(outputs, vec!["c", "d"]);
    }

    #[test]
    fn display_regenerates_source() {
        let block = Block::from_source("import numpy as np;x = np.sqrt(a)+1").unwrap();
        assert_eq!(block.to_string(), "import numpy as np\nx = np.sqrt(a) + 1\n");
        let reparsed = Block::from_source(&block.to_string()).unwrap();
        assert_eq!(reparsed, block);
    }

    #[test]
    fn execute_posts_one_event_even_on_error() {
        let ctx = NumericContext::new();
        let seen = Arc::new(Mutex::new(Vec::<ContextModified>::new()));
        let sink = seen.clone();
        ctx.events().subscribe(move |e| sink.lock().push(e.clone()));

        let block = Block::from_source("a = 1\nb = 2\nc = missing").unwrap();
        assert!(matches!(
            block.execute(&ctx),
            Err(BlockError::UnknownName(_))
        ));
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].changed, vec!["a", "b"]);
        assert!(!ctx.events().is_deferred());
    }

    #[test]
    fn restriction_keeps_writes_a_masked_assignment_builds_on() {
        let block =
            Block::from_source("x = a\npush_mask(m)\nx = 3\npop_mask()\ny = x").unwrap();
        let restricted = block.restrict(&[], &["y"]).unwrap();
        let inputs: Vec<_> = restricted.inputs().into_iter().collect();
        assert_eq!(inputs, vec!["a", "m"]);

        let seed = || {
            let ctx = NumericContext::new();
            ctx.set("a", Value::from(vec![7i64, 8, 9])).unwrap();
            ctx.set("m", Value::from(vec![true, false, false])).unwrap();
            ctx
        };
        let full = seed();
        block.execute(&full).unwrap();
        let partial = seed();
        restricted.execute(&partial).unwrap();

        assert_eq!(full.get("y").unwrap(), Value::from(vec![3i64, 8, 9]));
        assert_eq!(partial.get("y").unwrap(), full.get("y").unwrap());
    }

    #[test]
    fn expression_inputs_skip_builtins() {
        let expr = Expression::parse("isfinite(a) & (b > 0)").unwrap();
        let inputs: Vec<_> = expr.inputs().into_iter().collect();
        assert_eq!(inputs, vec!["a", "b"]);
        assert_eq!(expr.to_string(), "isfinite(a) & (b > 0)");
    }
}
