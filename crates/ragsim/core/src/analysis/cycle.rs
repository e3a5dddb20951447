// Ragsim
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Cycle-Based Deadlock Characterization
//!
//! Builds the directed resource-allocation graph (process -> resource for
//! each request, resource -> process for each allocation) and enumerates its
//! simple cycles. A cycle through single-instance resources only is a
//! certain deadlock. A cycle through any multi-instance resource is only a
//! potential one: it is necessary but not sufficient, and needs a safety
//! check to confirm.

use serde::Serialize;
use tracing::debug;

use crate::error::GraphResult;
use crate::graph::{EdgeKind, GraphSnapshot, GraphStore, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlockKind {
    None,
    /// Cycle through single-instance resources only
    Certain,
    /// Cycle through at least one multi-instance resource
    Potential,
}

/// Result of cycle analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub has_deadlock: bool,
    pub kind: DeadlockKind,
    /// Node ids of the reported cycle, starting at its first process
    pub cycle: Vec<String>,
    pub explanation: String,
    /// Number of simple cycles found, valid or not
    pub cycle_count: usize,
}

#[derive(Debug, Clone)]
struct Node {
    id: String,
    kind: NodeKind,
    instances: u32,
}

/// Directed view of a graph store used for cycle enumeration
#[derive(Debug, Clone)]
pub struct CycleAnalyzer {
    nodes: Vec<Node>,
    /// Outgoing `(target, edge kind)` per node, ascending by target
    adjacency: Vec<Vec<(usize, EdgeKind)>>,
}

impl CycleAnalyzer {
    /// Index processes first, then resources, each in ascending id order
    pub fn new(store: &GraphStore) -> Self {
        let mut nodes: Vec<Node> = store
            .processes()
            .map(|id| Node {
                id: id.to_string(),
                kind: NodeKind::Process,
                instances: 1,
            })
            .collect();
        let process_count = nodes.len();
        nodes.extend(store.resources().map(|(id, info)| Node {
            id: id.to_string(),
            kind: NodeKind::Resource,
            instances: info.total,
        }));

        let process_index = |id: &str| store.processes().position(|p| p == id);
        let resource_index = |id: &str| store.resources().position(|(r, _)| r == id).map(|i| i + process_count);

        let mut adjacency = vec![Vec::new(); nodes.len()];
        for (process, resource, _) in store.requests() {
            if let (Some(p), Some(r)) = (process_index(process), resource_index(resource)) {
                adjacency[p].push((r, EdgeKind::Request));
            }
        }
        for (process, resource, _) in store.allocations() {
            if let (Some(p), Some(r)) = (process_index(process), resource_index(resource)) {
                adjacency[r].push((p, EdgeKind::Allocation));
            }
        }
        for edges in &mut adjacency {
            edges.sort_unstable_by_key(|(target, _)| *target);
        }

        Self { nodes, adjacency }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Every simple cycle as node indices, each rooted at its smallest index
    pub fn simple_cycles(&self) -> Vec<Vec<usize>> {
        let mut cycles = Vec::new();
        let mut on_path = vec![false; self.nodes.len()];
        let mut path = Vec::new();

        for start in 0..self.nodes.len() {
            self.search(start, start, &mut on_path, &mut path, &mut cycles);
        }
        cycles
    }

    /// Depth-first search restricted to nodes with index >= `start`
    fn search(&self, start: usize, node: usize, on_path: &mut [bool], path: &mut Vec<usize>, cycles: &mut Vec<Vec<usize>>) {
        on_path[node] = true;
        path.push(node);

        for (next, _) in &self.adjacency[node] {
            let next = *next;
            if next == start {
                cycles.push(path.clone());
            } else if next > start && !on_path[next] {
                self.search(start, next, on_path, path, cycles);
            }
        }

        path.pop();
        on_path[node] = false;
    }

    /// Simple cycles rendered as node ids
    pub fn cycles(&self) -> Vec<Vec<String>> {
        self.simple_cycles().into_iter().map(|cycle| self.ids(&cycle)).collect()
    }

    /// A deadlock cycle strictly alternates request and allocation edges
    fn alternates(&self, cycle: &[usize]) -> bool {
        (0..cycle.len()).all(|i| {
            let from = cycle[i];
            let to = cycle[(i + 1) % cycle.len()];
            let kind = self.adjacency[from].iter().find(|(target, _)| *target == to).map(|(_, kind)| *kind);
            matches!(
                (self.nodes[from].kind, self.nodes[to].kind, kind),
                (NodeKind::Process, NodeKind::Resource, Some(EdgeKind::Request)) | (NodeKind::Resource, NodeKind::Process, Some(EdgeKind::Allocation))
            )
        })
    }

    fn single_instance_only(&self, cycle: &[usize]) -> bool {
        cycle.iter().map(|&i| &self.nodes[i]).filter(|node| node.kind == NodeKind::Resource).all(|node| node.instances == 1)
    }

    fn ids(&self, cycle: &[usize]) -> Vec<String> {
        cycle.iter().map(|&i| self.nodes[i].id.clone()).collect()
    }

    /// Classify the graph as deadlock-free, certainly deadlocked or potentially deadlocked
    pub fn analyze(&self) -> CycleReport {
        let cycles = self.simple_cycles();
        let cycle_count = cycles.len();
        debug!(nodes = self.node_count(), edges = self.edge_count(), cycles = cycle_count, "enumerated simple cycles");

        if cycles.is_empty() {
            return CycleReport {
                has_deadlock: false,
                kind: DeadlockKind::None,
                cycle: Vec::new(),
                explanation: "No cycles detected in the graph. The system is not in a deadlock state.".to_string(),
                cycle_count,
            };
        }

        // Cycles built from a store always alternate
        let valid: Vec<&Vec<usize>> = cycles.iter().filter(|cycle| self.alternates(cycle)).collect();
        let Some(first) = valid.first() else {
            return CycleReport {
                has_deadlock: false,
                kind: DeadlockKind::None,
                cycle: Vec::new(),
                explanation: "Cycles detected, but they do not represent valid deadlock scenarios.".to_string(),
                cycle_count,
            };
        };

        if let Some(certain) = valid.iter().find(|cycle| self.single_instance_only(cycle)) {
            return CycleReport {
                has_deadlock: true,
                kind: DeadlockKind::Certain,
                cycle: self.ids(certain),
                explanation: "Deadlock detected: certain deadlock, single-instance cycle. A cycle exists in the resource allocation graph and every resource in it has exactly one instance.".to_string(),
                cycle_count,
            };
        }

        CycleReport {
            has_deadlock: true,
            kind: DeadlockKind::Potential,
            cycle: self.ids(first),
            explanation: "Deadlock detected: potential deadlock, confirm via safety check. A cycle exists in the resource allocation graph, but some resources in it have multiple instances, so the Banker's algorithm is needed to decide.".to_string(),
            cycle_count,
        }
    }
}

/// Cycle analysis of a graph store
pub fn analyze_cycles(store: &GraphStore) -> CycleReport {
    CycleAnalyzer::new(store).analyze()
}

/// Cycle analysis of a node/edge snapshot
pub fn analyze_snapshot(snapshot: &GraphSnapshot) -> GraphResult<CycleReport> {
    let store = snapshot.to_store()?;
    Ok(analyze_cycles(&store))
}
