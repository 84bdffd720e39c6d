//! Dependency graph over indexed skills.
//!
//! Required edges must form a DAG; [`build_graph`] rejects any cycle among
//! them. Optional edges are one-hop suggestions and may point anywhere,
//! including back along a required chain.

use std::collections::{BTreeMap, BTreeSet};

use quiver_core::SkillId;
use tracing::debug;

use crate::errors::CycleError;
use crate::index::SkillIndex;

/// Kind of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Must be co-activated.
    Required,
    /// Co-activated when budget allows.
    Optional,
}

/// Required and optional edges of one index generation.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    required: BTreeMap<SkillId, Vec<SkillId>>,
    optional: BTreeMap<SkillId, Vec<SkillId>>,
    dependents: BTreeMap<SkillId, BTreeSet<SkillId>>,
}

/// Build the graph for `index`, rejecting cycles among required edges.
pub fn build_graph(index: &SkillIndex) -> Result<DependencyGraph, CycleError> {
    let mut graph = DependencyGraph::default();

    for record in index.iter() {
        let id = &record.id;
        let _ = graph
            .required
            .insert(id.clone(), record.dependencies.required.clone());
        let _ = graph
            .optional
            .insert(id.clone(), record.dependencies.optional.clone());
        for dep in &record.dependencies.required {
            let _ = graph
                .dependents
                .entry(dep.clone())
                .or_default()
                .insert(id.clone());
        }
    }

    if let Some(path) = find_cycle(&graph.required) {
        return Err(CycleError { path });
    }

    debug!(
        skills = graph.required.len(),
        required_edges = graph.required.values().map(Vec::len).sum::<usize>(),
        optional_edges = graph.optional.values().map(Vec::len).sum::<usize>(),
        "Dependency graph built"
    );
    Ok(graph)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Depth-first search with three colors, visiting ids in order.
///
/// Returns the first cycle found as `[a, ..., a]`.
fn find_cycle(edges: &BTreeMap<SkillId, Vec<SkillId>>) -> Option<Vec<SkillId>> {
    fn visit<'a>(
        node: &'a SkillId,
        edges: &'a BTreeMap<SkillId, Vec<SkillId>>,
        colors: &mut BTreeMap<&'a SkillId, Color>,
        path: &mut Vec<&'a SkillId>,
    ) -> Option<Vec<SkillId>> {
        match colors.get(node).copied().unwrap_or(Color::White) {
            Color::Black => return None,
            Color::Gray => {
                let start = path.iter().position(|p| *p == node).unwrap_or(0);
                let mut cycle: Vec<SkillId> = path[start..].iter().map(|p| (*p).clone()).collect();
                cycle.push(node.clone());
                return Some(cycle);
            }
            Color::White => {}
        }

        let _ = colors.insert(node, Color::Gray);
        path.push(node);
        for next in edges.get(node).into_iter().flatten() {
            if let Some(cycle) = visit(next, edges, colors, path) {
                return Some(cycle);
            }
        }
        let _ = path.pop();
        let _ = colors.insert(node, Color::Black);
        None
    }

    let mut colors = BTreeMap::new();
    let mut path = Vec::new();
    edges
        .keys()
        .find_map(|start| visit(start, edges, &mut colors, &mut path))
}

impl DependencyGraph {
    /// Direct required dependencies of `id`.
    pub fn required(&self, id: &str) -> &[SkillId] {
        self.required.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Direct optional dependencies of `id`.
    pub fn optional(&self, id: &str) -> &[SkillId] {
        self.optional.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Skills that directly require `id`.
    pub fn dependents(&self, id: &str) -> impl Iterator<Item = &SkillId> {
        self.dependents.get(id).into_iter().flatten()
    }

    /// Every edge as `(from, to, kind)`.
    pub fn edges(&self) -> impl Iterator<Item = (&SkillId, &SkillId, EdgeKind)> {
        let required = self
            .required
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from, to, EdgeKind::Required)));
        let optional = self
            .optional
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from, to, EdgeKind::Optional)));
        required.chain(optional)
    }

    /// Transitive required dependencies of `id` in depth-first preorder,
    /// excluding `id` itself.
    pub fn required_closure(&self, id: &str) -> Vec<SkillId> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for dep in self.required(id) {
            self.push_required(dep, &mut seen, &mut out);
        }
        out.retain(|d| d.as_str() != id);
        out
    }

    /// Seeds followed by their transitive required dependencies, each seed's
    /// dependencies directly after it. With `include_optional`, the optional
    /// neighbors of every member (and their required closures) follow.
    pub fn closure(&self, seeds: &[SkillId], include_optional: bool) -> Vec<SkillId> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for seed in seeds {
            self.push_required(seed, &mut seen, &mut out);
        }
        if include_optional {
            let members = out.clone();
            for member in &members {
                for companion in self.optional(member) {
                    self.push_required(companion, &mut seen, &mut out);
                }
            }
        }
        out
    }

    /// Longest required-dependency path from each member to a member with no
    /// required dependencies inside `members`.
    pub fn depths(&self, members: &BTreeSet<SkillId>) -> BTreeMap<SkillId, usize> {
        fn depth_of(
            graph: &DependencyGraph,
            id: &SkillId,
            members: &BTreeSet<SkillId>,
            memo: &mut BTreeMap<SkillId, usize>,
        ) -> usize {
            if let Some(d) = memo.get(id) {
                return *d;
            }
            let depth = graph
                .required(id)
                .iter()
                .filter(|dep| members.contains(*dep))
                .map(|dep| depth_of(graph, dep, members, memo) + 1)
                .max()
                .unwrap_or(0);
            let _ = memo.insert(id.clone(), depth);
            depth
        }

        let mut memo = BTreeMap::new();
        for id in members {
            let _ = depth_of(self, id, members, &mut memo);
        }
        memo
    }

    fn push_required(&self, id: &SkillId, seen: &mut BTreeSet<SkillId>, out: &mut Vec<SkillId>) {
        if !seen.insert(id.clone()) {
            return;
        }
        out.push(id.clone());
        for dep in self.required(id) {
            self.push_required(dep, seen, out);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
