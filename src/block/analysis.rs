//! Dependency analysis and restriction of statement lists

use super::ast::{MaskCall, Stmt, POP_MASK, PUSH_MASK};
use super::builtins;
use crate::error::BlockError;
use std::collections::{BTreeMap, BTreeSet};

/// Whether `name` is resolved without the context (builtins and intrinsics)
pub fn is_ambient(name: &str) -> bool {
    name == PUSH_MASK || name == POP_MASK || builtins::is_global(name)
}

/// Names a statement needs from earlier state
///
/// Inside an open mask bracket an assignment keeps the unmasked elements of
/// its target, so the target is read as well.
fn effective_reads(stmt: &Stmt, masked: bool) -> Vec<String> {
    let mut reads = stmt.reads();
    if masked {
        for name in stmt.writes() {
            if !reads.contains(&name) {
                reads.push(name);
            }
        }
    }
    reads
}

fn track_bracket(depth: &mut usize, stmt: &Stmt) {
    match stmt.mask_call() {
        Some(MaskCall::Push) => *depth += 1,
        Some(MaskCall::Pop) => *depth = depth.saturating_sub(1),
        None => {}
    }
}

/// Free variables: names read before any statement binds them
pub fn free_names(statements: &[Stmt]) -> BTreeSet<String> {
    let mut bound = BTreeSet::new();
    let mut free = BTreeSet::new();
    let mut depth = 0usize;
    for stmt in statements {
        for name in effective_reads(stmt, depth > 0) {
            if !bound.contains(&name) && !is_ambient(&name) {
                free.insert(name);
            }
        }
        bound.extend(stmt.writes());
        track_bracket(&mut depth, stmt);
    }
    free
}

pub fn bound_names(statements: &[Stmt]) -> BTreeSet<String> {
    statements.iter().flat_map(|s| s.writes()).collect()
}

/// Statement dependency graph
///
/// Statement `i` depends on the most recent earlier statement writing each
/// name it reads; names with no earlier writer are its free inputs. A masked
/// assignment reads its own target.
pub struct DependencyGraph {
    dependencies: BTreeMap<usize, Vec<usize>>,
    free: BTreeMap<usize, BTreeSet<String>>,
    brackets: Vec<(usize, usize)>,
}

impl DependencyGraph {
    pub fn build(statements: &[Stmt]) -> Self {
        let mut last_writer: BTreeMap<String, usize> = BTreeMap::new();
        let mut dependencies = BTreeMap::new();
        let mut free = BTreeMap::new();
        let mut open = Vec::new();
        let mut brackets = Vec::new();

        for (index, stmt) in statements.iter().enumerate() {
            let mut deps = Vec::new();
            let mut inputs = BTreeSet::new();
            for name in effective_reads(stmt, !open.is_empty()) {
                match last_writer.get(&name) {
                    Some(&writer) => {
                        if !deps.contains(&writer) {
                            deps.push(writer);
                        }
                    }
                    None if !is_ambient(&name) => {
                        inputs.insert(name);
                    }
                    None => {}
                }
            }
            deps.sort_unstable();
            dependencies.insert(index, deps);
            free.insert(index, inputs);
            for name in stmt.writes() {
                last_writer.insert(name, index);
            }
            match stmt.mask_call() {
                Some(MaskCall::Push) => open.push(index),
                Some(MaskCall::Pop) => {
                    if let Some(push) = open.pop() {
                        brackets.push((push, index));
                    }
                }
                None => {}
            }
        }

        Self {
            dependencies,
            free,
            brackets,
        }
    }

    /// `seeds` plus everything they transitively depend on
    fn upstream_closure(&self, seeds: BTreeSet<usize>) -> BTreeSet<usize> {
        let mut keep = BTreeSet::new();
        let mut stack: Vec<usize> = seeds.into_iter().collect();
        while let Some(index) = stack.pop() {
            if keep.insert(index) {
                if let Some(deps) = self.dependencies.get(&index) {
                    stack.extend(deps.iter().copied());
                }
            }
        }
        keep
    }

    /// `seeds` plus everything that transitively depends on them
    fn downstream_closure(&self, seeds: BTreeSet<usize>) -> BTreeSet<usize> {
        let mut keep = seeds;
        loop {
            let before = keep.len();
            for (index, deps) in &self.dependencies {
                if deps.iter().any(|d| keep.contains(d)) {
                    keep.insert(*index);
                }
            }
            if keep.len() == before {
                return keep;
            }
        }
    }

    /// Add the push/pop pair around every kept statement, and what the
    /// pushed mask needs
    fn close_brackets(&self, mut keep: BTreeSet<usize>) -> BTreeSet<usize> {
        loop {
            let before = keep.len();
            let mut added = BTreeSet::new();
            for &(push, pop) in &self.brackets {
                if keep.iter().any(|&k| k > push && k < pop) {
                    added.insert(push);
                    added.insert(pop);
                }
            }
            keep.extend(self.upstream_closure(added));
            if keep.len() == before {
                return keep;
            }
        }
    }

    /// Depth-first topological order; dependencies come first
    pub fn topological_order(
        &self,
        nodes: &BTreeSet<usize>,
    ) -> Result<Vec<usize>, BlockError> {
        let mut sorted = Vec::with_capacity(nodes.len());
        let mut visited = BTreeSet::new();
        let mut path = Vec::new();
        for &node in nodes {
            self.visit(node, nodes, &mut visited, &mut path, &mut sorted)?;
        }
        Ok(sorted)
    }

    fn visit(
        &self,
        node: usize,
        nodes: &BTreeSet<usize>,
        visited: &mut BTreeSet<usize>,
        path: &mut Vec<usize>,
        sorted: &mut Vec<usize>,
    ) -> Result<(), BlockError> {
        if let Some(start) = path.iter().position(|&n| n == node) {
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Err(BlockError::CyclicGraph(cycle));
        }
        if visited.contains(&node) {
            return Ok(());
        }
        path.push(node);
        if let Some(deps) = self.dependencies.get(&node) {
            for &dep in deps.iter().filter(|d| nodes.contains(*d)) {
                self.visit(dep, nodes, visited, path, sorted)?;
            }
        }
        path.pop();
        visited.insert(node);
        sorted.push(node);
        Ok(())
    }

    #[cfg(test)]
    fn with_edges(edges: &[(usize, usize)], count: usize) -> Self {
        let mut dependencies: BTreeMap<usize, Vec<usize>> =
            (0..count).map(|i| (i, Vec::new())).collect();
        for &(from, to) in edges {
            dependencies.entry(to).or_default().push(from);
        }
        Self {
            dependencies,
            free: BTreeMap::new(),
            brackets: Vec::new(),
        }
    }
}

/// Indices of the statements to keep, in execution order
pub fn restrict(
    statements: &[Stmt],
    inputs: &[&str],
    outputs: &[&str],
) -> Result<Vec<usize>, BlockError> {
    let known_inputs = free_names(statements);
    if let Some(unknown) = inputs.iter().find(|n| !known_inputs.contains(**n)) {
        return Err(BlockError::UnknownName(unknown.to_string()));
    }
    let known_outputs = bound_names(statements);
    if let Some(unknown) = outputs.iter().find(|n| !known_outputs.contains(**n)) {
        return Err(BlockError::UnknownName(unknown.to_string()));
    }

    let graph = DependencyGraph::build(statements);
    let all: BTreeSet<usize> = (0..statements.len()).collect();

    let forward = if inputs.is_empty() {
        None
    } else {
        let seeds = graph
            .free
            .iter()
            .filter(|(_, free)| inputs.iter().any(|n| free.contains(*n)))
            .map(|(index, _)| *index)
            .collect();
        Some(graph.downstream_closure(seeds))
    };

    let backward = if outputs.is_empty() {
        None
    } else {
        let seeds = outputs
            .iter()
            .filter_map(|name| {
                statements
                    .iter()
                    .rposition(|stmt| stmt.writes().iter().any(|w| w == name))
            })
            .collect();
        Some(graph.upstream_closure(seeds))
    };

    let keep = match (forward, backward) {
        (Some(f), Some(b)) => f.intersection(&b).copied().collect(),
        (Some(f), None) => f,
        (None, Some(b)) => b,
        (None, None) => all,
    };
    let keep = graph.close_brackets(keep);
    graph.topological_order(&keep)
}
