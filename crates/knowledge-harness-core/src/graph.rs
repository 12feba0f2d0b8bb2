//! Document graph construction.
//!
//! Documents are arena-indexed (`0..n` in snapshot order) and edges are
//! derived from resolved links only. Links found under a related-section
//! heading become [`EdgeKind::Related`] edges; every other resolved link is
//! a [`EdgeKind::Reference`] edge. Duplicate links collapse into one edge
//! and self-links never produce edges.
//!
//! Reference cycles are found with Tarjan's SCC algorithm. Cycles are
//! expected in a cross-referencing corpus and are reported as
//! informational issues; renderers that flatten the graph into a tree use
//! [`DocumentGraph::in_cycle`] to stop recursion.

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::models::{Document, Edge, EdgeKind, IssueKind, ValidationIssue};

/// Directed graph over a document arena.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentGraph {
    /// All edges, sorted by `(from_id, to_id, kind)`.
    pub edges: Vec<Edge>,
    /// Reference cycles; each sorted by id, the list sorted.
    pub cycles: Vec<Vec<String>>,
    #[serde(skip)]
    outbound: Vec<Vec<(usize, EdgeKind)>>,
    #[serde(skip)]
    inbound: Vec<Vec<(usize, EdgeKind)>>,
    #[serde(skip)]
    cycle_of: Vec<Option<usize>>,
}

impl DocumentGraph {
    /// Targets of `node`'s outbound edges of `kind`, in target-id order.
    pub fn outbound(&self, node: usize, kind: EdgeKind) -> impl Iterator<Item = usize> + '_ {
        self.outbound
            .get(node)
            .into_iter()
            .flatten()
            .filter(move |(_, k)| *k == kind)
            .map(|(target, _)| *target)
    }

    /// Sources of `node`'s inbound edges of `kind`, in source-id order.
    pub fn inbound(&self, node: usize, kind: EdgeKind) -> impl Iterator<Item = usize> + '_ {
        self.inbound
            .get(node)
            .into_iter()
            .flatten()
            .filter(move |(_, k)| *k == kind)
            .map(|(source, _)| *source)
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.outbound.get(node).map_or(0, Vec::len)
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.inbound.get(node).map_or(0, Vec::len)
    }

    /// Whether `node` is part of a reference cycle.
    pub fn in_cycle(&self, node: usize) -> bool {
        matches!(self.cycle_of.get(node), Some(Some(_)))
    }

    /// Members of the reference cycle containing `node`, if any.
    pub fn cycle_of(&self, node: usize) -> Option<&[String]> {
        let cycle = (*self.cycle_of.get(node)?)?;
        self.cycles.get(cycle).map(Vec::as_slice)
    }

    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.edges.iter().filter(|e| e.kind == kind).count()
    }
}

/// Build the graph for `documents` (already link-resolved).
///
/// Returns the graph plus `cycle-detected` and `orphan-document` issues.
pub fn build(documents: &[Document]) -> (DocumentGraph, Vec<ValidationIssue>) {
    let index: HashMap<&str, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.as_str(), i))
        .collect();

    let mut edge_set: BTreeSet<Edge> = BTreeSet::new();
    for doc in documents {
        for link in &doc.outbound_links {
            let Some(target) = link.resolved_id.as_deref() else {
                continue;
            };
            if target == doc.id || !index.contains_key(target) {
                continue;
            }
            let kind = if link.in_related_section {
                EdgeKind::Related
            } else {
                EdgeKind::Reference
            };
            edge_set.insert(Edge {
                from_id: doc.id.clone(),
                to_id: target.to_string(),
                kind,
            });
        }
    }
    let edges: Vec<Edge> = edge_set.into_iter().collect();

    let n = documents.len();
    let mut outbound: Vec<Vec<(usize, EdgeKind)>> = vec![Vec::new(); n];
    let mut inbound: Vec<Vec<(usize, EdgeKind)>> = vec![Vec::new(); n];
    let mut arena: DiGraph<usize, ()> = DiGraph::with_capacity(n, edges.len());
    let nodes: Vec<_> = (0..n).map(|i| arena.add_node(i)).collect();

    for edge in &edges {
        let from = index[edge.from_id.as_str()];
        let to = index[edge.to_id.as_str()];
        outbound[from].push((to, edge.kind));
        inbound[to].push((from, edge.kind));
        if edge.kind == EdgeKind::Reference {
            arena.add_edge(nodes[from], nodes[to], ());
        }
    }
    // `edges` is sorted by (from, to), so both adjacency lists come out in
    // neighbour-id order.

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&arena)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<String> =
                scc.iter().map(|n| documents[arena[*n]].id.clone()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();

    let mut cycle_of = vec![None; n];
    for (ci, cycle) in cycles.iter().enumerate() {
        for member in cycle {
            cycle_of[index[member.as_str()]] = Some(ci);
        }
    }

    let mut issues = Vec::new();
    for cycle in &cycles {
        issues.push(ValidationIssue::new(
            IssueKind::CycleDetected,
            &cycle[0],
            format!(
                "reference cycle among {} documents: {}",
                cycle.len(),
                cycle.join(", ")
            ),
        ));
    }
    for (i, doc) in documents.iter().enumerate() {
        if outbound[i].is_empty() && inbound[i].is_empty() {
            issues.push(ValidationIssue::new(
                IssueKind::OrphanDocument,
                &doc.id,
                "no inbound or outbound links to other documents",
            ));
        }
    }

    tracing::debug!(
        edges = edges.len(),
        cycles = cycles.len(),
        "built document graph"
    );

    (
        DocumentGraph {
            edges,
            cycles,
            outbound,
            inbound,
            cycle_of,
        },
        issues,
    )
}
