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

//! Node/edge view of a resource-allocation graph.
//!
//! This is the shape drawing front ends exchange: a flat list of typed nodes
//! and a flat list of typed, directed edges. Extra node attributes such as
//! screen coordinates are ignored on input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::store::GraphStore;
use crate::error::{EntityKind, GraphError, GraphResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Process,
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// process -> resource
    Request,
    /// resource -> process
    Allocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Instance count; only meaningful for resources
    #[serde(default = "default_count")]
    pub instances: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Number of instances the edge stands for
    #[serde(default = "default_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

fn default_count() -> u32 {
    1
}

impl GraphSnapshot {
    /// Describe a store as nodes and edges
    pub fn from_store(store: &GraphStore) -> Self {
        let mut nodes: Vec<SnapshotNode> = store
            .processes()
            .map(|id| SnapshotNode {
                id: id.to_string(),
                kind: NodeKind::Process,
                instances: 1,
            })
            .collect();
        nodes.extend(store.resources().map(|(id, info)| SnapshotNode {
            id: id.to_string(),
            kind: NodeKind::Resource,
            instances: info.total,
        }));

        let mut edges: Vec<SnapshotEdge> = store
            .requests()
            .map(|(process, resource, count)| SnapshotEdge {
                id: None,
                source: process.to_string(),
                target: resource.to_string(),
                kind: EdgeKind::Request,
                count,
            })
            .collect();
        edges.extend(store.allocations().map(|(process, resource, count)| SnapshotEdge {
            id: None,
            source: resource.to_string(),
            target: process.to_string(),
            kind: EdgeKind::Allocation,
            count,
        }));

        Self { nodes, edges }
    }

    /// Build a store from the nodes and edges
    ///
    /// Allocation edges consume resource instances in listing order, so a
    /// snapshot that allocates more than a resource owns is rejected.
    pub fn to_store(&self) -> GraphResult<GraphStore> {
        let mut store = GraphStore::new();
        let mut kinds: BTreeMap<&str, NodeKind> = BTreeMap::new();

        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(GraphError::invalid("node id must not be empty"));
            }
            if kinds.insert(node.id.as_str(), node.kind).is_some() {
                return Err(GraphError::duplicate(EntityKind::Node, node.id.clone()));
            }
            match node.kind {
                NodeKind::Process => store.add_process(Some(&node.id))?,
                NodeKind::Resource => store.add_resource(Some(&node.id), node.instances)?,
            };
        }

        for edge in &self.edges {
            let source = kinds.get(edge.source.as_str()).copied().ok_or_else(|| GraphError::unknown(EntityKind::Node, edge.source.clone()))?;
            let target = kinds.get(edge.target.as_str()).copied().ok_or_else(|| GraphError::unknown(EntityKind::Node, edge.target.clone()))?;

            match (edge.kind, source, target) {
                (EdgeKind::Request, NodeKind::Process, NodeKind::Resource) => store.add_request(&edge.source, &edge.target, edge.count)?,
                (EdgeKind::Allocation, NodeKind::Resource, NodeKind::Process) => store.add_allocation(&edge.target, &edge.source, edge.count)?,
                (kind, source_kind, target_kind) => {
                    return Err(GraphError::InvalidEdgeDirection(format!(
                        "{kind:?} edge {} -> {} goes from a {source_kind:?} to a {target_kind:?}",
                        edge.source, edge.target
                    )));
                }
            }
        }

        Ok(store)
    }
}

impl From<&GraphStore> for GraphSnapshot {
    fn from(store: &GraphStore) -> Self {
        GraphSnapshot::from_store(store)
    }
}

impl TryFrom<&GraphSnapshot> for GraphStore {
    type Error = GraphError;

    fn try_from(snapshot: &GraphSnapshot) -> GraphResult<Self> {
        snapshot.to_store()
    }
}
