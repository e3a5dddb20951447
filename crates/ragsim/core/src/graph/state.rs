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

//! Canonical state encoding
//!
//! ```json
//! {
//!   "processes": ["P1", "P2"],
//!   "resources": { "R1": { "total": 2, "available": 1 } },
//!   "allocations": { "P1->R1": 1 },
//!   "requests": { "P2->R1": 2 }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::{EDGE_KEY_SEPARATOR, GraphStore, ResourceInfo, validate_id};
use crate::error::{GraphError, GraphResult};

/// Serializable form of a [`GraphStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    pub processes: Vec<String>,
    pub resources: BTreeMap<String, ResourceInfo>,
    #[serde(default)]
    pub allocations: BTreeMap<String, u32>,
    #[serde(default)]
    pub requests: BTreeMap<String, u32>,
}

impl GraphStore {
    /// Produce the canonical encoding of this store
    pub fn export(&self) -> StoreState {
        StoreState {
            processes: self.processes().map(str::to_string).collect(),
            resources: self.resources().map(|(id, info)| (id.to_string(), *info)).collect(),
            allocations: self.allocations().map(|(p, r, count)| (encode_edge_key(p, r), count)).collect(),
            requests: self.requests().map(|(p, r, count)| (encode_edge_key(p, r), count)).collect(),
        }
    }

    /// Build a new store from a canonical encoding
    pub fn from_state(state: StoreState) -> GraphResult<Self> {
        let mut processes = BTreeSet::new();
        for process in state.processes {
            validate_id(&process).map_err(|e| GraphError::malformed(e.to_string()))?;
            if !processes.insert(process.clone()) {
                return Err(GraphError::malformed(format!("process {process} listed twice")));
            }
        }

        for (id, info) in &state.resources {
            validate_id(id).map_err(|e| GraphError::malformed(e.to_string()))?;
            if info.total < 1 {
                return Err(GraphError::malformed(format!("resource {id} must have at least one instance")));
            }
            if info.available > info.total {
                return Err(GraphError::malformed(format!("resource {id} has more available ({}) than total ({})", info.available, info.total)));
            }
        }

        let allocations = decode_edges(&state.allocations, "allocation")?;
        let requests = decode_edges(&state.requests, "request")?;

        let store = GraphStore::from_parts(processes, state.resources, allocations, requests);
        store.check_invariants()?;
        Ok(store)
    }

    /// Replace the whole store with `state`
    ///
    /// On error the current contents are kept unchanged.
    pub fn import(&mut self, state: StoreState) -> GraphResult<()> {
        let store = GraphStore::from_state(state)?;
        debug!(processes = store.process_count(), resources = store.resource_count(), "imported graph state");
        *self = store;
        Ok(())
    }

    /// Serialize the canonical encoding to JSON
    pub fn to_json(&self, pretty: bool) -> GraphResult<String> {
        let state = self.export();
        let encoded = if pretty { serde_json::to_string_pretty(&state) } else { serde_json::to_string(&state) };
        encoded.map_err(|e| GraphError::malformed(e.to_string()))
    }

    /// Parse a JSON canonical encoding into a new store
    pub fn from_json(json: &str) -> GraphResult<Self> {
        let state: StoreState = serde_json::from_str(json).map_err(|e| GraphError::malformed(e.to_string()))?;
        GraphStore::from_state(state)
    }

    /// Replace the whole store with a JSON canonical encoding
    pub fn import_json(&mut self, json: &str) -> GraphResult<()> {
        *self = GraphStore::from_json(json)?;
        Ok(())
    }
}

/// Encode an edge key as `"<process>-><resource>"`
pub fn encode_edge_key(process: &str, resource: &str) -> String {
    format!("{process}{EDGE_KEY_SEPARATOR}{resource}")
}

/// Split an edge key into `(process, resource)`
pub fn decode_edge_key(key: &str) -> GraphResult<(String, String)> {
    let mut parts = key.split(EDGE_KEY_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(process), Some(resource), None) if !process.is_empty() && !resource.is_empty() => Ok((process.to_string(), resource.to_string())),
        _ => Err(GraphError::malformed(format!("invalid edge key {key:?}"))),
    }
}

fn decode_edges(edges: &BTreeMap<String, u32>, kind: &str) -> GraphResult<BTreeMap<(String, String), u32>> {
    let mut decoded = BTreeMap::new();
    for (key, count) in edges {
        if *count == 0 {
            return Err(GraphError::malformed(format!("{kind} {key} has a zero count")));
        }
        decoded.insert(decode_edge_key(key)?, *count);
    }
    Ok(decoded)
}
