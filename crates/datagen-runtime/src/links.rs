//! Records which models reference which while records are generated, and orders sink work
//! from those references.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

#[derive(Debug, Default)]
struct LinkState {
    edges: BTreeMap<String, BTreeSet<String>>,
    /// Models producing values, innermost last.
    producers: Vec<String>,
}

/// Reference graph between models. An edge `a -> b` means records of `a` read values of `b`.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    state: Mutex<LinkState>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `name` the model currently producing values until the matching `end_generation`.
    pub fn start_generation(&self, name: &str) {
        debug!(model = name, "starting generation tracking");
        let mut state = self.state();
        state.edges.entry(name.to_string()).or_default();
        state.producers.push(name.to_string());
    }

    /// Record that the current producer read from `name`.
    pub fn record_reference(&self, name: &str) {
        let mut state = self.state();
        state.edges.entry(name.to_string()).or_default();
        let Some(producer) = state.producers.last().cloned() else {
            return;
        };
        if producer != name {
            debug!(from = %producer, to = name, "recording dependency");
        }
        state.edges.entry(producer).or_default().insert(name.to_string());
    }

    pub fn end_generation(&self) {
        let mut state = self.state();
        if let Some(producer) = state.producers.pop() {
            debug!(model = %producer, "ending generation tracking");
        }
    }

    /// Attribute references to `name` while the returned guard lives.
    ///
    /// Wraps every fresh computation of a memoized value, so references made by a model's gen
    /// code land on that model even when another model triggered the computation.
    pub fn scope(&self, name: &str) -> GenerationScope<'_> {
        self.start_generation(name);
        GenerationScope { links: self }
    }

    pub fn current_producer(&self) -> Option<String> {
        self.state().producers.last().cloned()
    }

    /// Nodes ordered so that every referrer precedes what it references.
    ///
    /// Uses an explicit stack rather than recursion. Cycles are tolerated: each node appears
    /// exactly once and back edges are ignored.
    pub fn topological_sort(&self) -> Vec<String> {
        let state = self.state();
        let nodes: Vec<&str> = state.edges.keys().map(String::as_str).collect();
        debug!(models = nodes.len(), "performing topological sort");

        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut post_order: Vec<&str> = Vec::with_capacity(nodes.len());

        for &root in nodes.iter().rev() {
            if !visited.insert(root) {
                continue;
            }
            let mut stack: Vec<(&str, Vec<&str>)> = vec![(root, successors(&state.edges, root))];
            while let Some((node, pending)) = stack.last_mut() {
                match pending.pop() {
                    Some(next) => {
                        if visited.insert(next) {
                            let children = successors(&state.edges, next);
                            stack.push((next, children));
                        }
                    }
                    None => {
                        post_order.push(*node);
                        stack.pop();
                    }
                }
            }
        }

        let order: Vec<String> = post_order.into_iter().rev().map(str::to_string).collect();
        debug!(?order, "topological sort completed");
        order
    }

    /// Order in which sinks should be loaded: referenced models first.
    pub fn load_order(&self) -> Vec<String> {
        let mut order = self.topological_sort();
        order.reverse();
        order
    }

    /// Order in which sinks should be cleared: referrers first.
    pub fn clear_order(&self) -> Vec<String> {
        self.topological_sort()
    }
}

/// Ends a generation scope on drop, unwinding included.
pub struct GenerationScope<'a> {
    links: &'a DependencyGraph,
}

impl Drop for GenerationScope<'_> {
    fn drop(&mut self) {
        self.links.end_generation();
    }
}

/// Successors in reverse-lexicographic order so that popping yields them lexicographically.
fn successors<'a>(edges: &'a BTreeMap<String, BTreeSet<String>>, node: &str) -> Vec<&'a str> {
    edges
        .get(node)
        .map(|targets| targets.iter().rev().map(String::as_str).collect())
        .unwrap_or_default()
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        writeln!(f, "Links {{")?;
        match state.producers.last() {
            Some(producer) => writeln!(f, "  current: {producer:?}")?,
            None => writeln!(f, "  current: none")?,
        }
        writeln!(f, "  edges: {{")?;
        for (from, targets) in &state.edges {
            let targets: Vec<_> = targets.iter().map(|t| format!("{t:?}")).collect();
            writeln!(f, "    {from:?}: [{}]", targets.join(", "))?;
        }
        writeln!(f, "  }}")?;
        write!(f, "}}")
    }
}
