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

//! Feature Extraction
//!
//! Summarizes a graph as a fixed-order vector of 23 numbers for an external
//! deadlock classifier. The order and meaning of every slot is a contract:
//! bump [`FEATURE_VERSION`] when either changes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::GraphResult;
use crate::graph::{GraphSnapshot, GraphStore};

/// Version of the feature layout
pub const FEATURE_VERSION: u32 = 1;

/// Number of features in a vector
pub const FEATURE_COUNT: usize = 23;

/// Feature names in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "process_count",
    "resource_count",
    "total_instances",
    "total_allocated",
    "total_requested",
    "mean_allocation_per_process",
    "mean_request_per_process",
    "max_allocation_per_process",
    "max_request_per_process",
    "allocation_edge_count",
    "request_edge_count",
    "mean_resource_utilization",
    "waiting_edge_count",
    "processes_with_outgoing_waits",
    "processes_with_incoming_waits",
    "processes_with_both_waits",
    "waiting_processes",
    "holding_processes",
    "waiting_and_holding_processes",
    "fully_allocated_resources",
    "contested_resources",
    "mean_contention",
    "max_contention",
];

/// Named feature values of one graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub process_count: f64,
    pub resource_count: f64,
    pub total_instances: f64,
    pub total_allocated: f64,
    pub total_requested: f64,
    pub mean_allocation_per_process: f64,
    pub mean_request_per_process: f64,
    pub max_allocation_per_process: f64,
    pub max_request_per_process: f64,
    pub allocation_edge_count: f64,
    pub request_edge_count: f64,
    /// Mean of `allocated / total` over resources
    pub mean_resource_utilization: f64,
    /// Distinct pairs (A, B) where A requests a resource that B holds
    pub waiting_edge_count: f64,
    pub processes_with_outgoing_waits: f64,
    pub processes_with_incoming_waits: f64,
    pub processes_with_both_waits: f64,
    /// Processes waiting on another process
    pub waiting_processes: f64,
    pub holding_processes: f64,
    pub waiting_and_holding_processes: f64,
    pub fully_allocated_resources: f64,
    /// Resources whose aggregate request exceeds what is available
    pub contested_resources: f64,
    /// Mean excess over contested resources
    pub mean_contention: f64,
    pub max_contention: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.process_count,
            self.resource_count,
            self.total_instances,
            self.total_allocated,
            self.total_requested,
            self.mean_allocation_per_process,
            self.mean_request_per_process,
            self.max_allocation_per_process,
            self.max_request_per_process,
            self.allocation_edge_count,
            self.request_edge_count,
            self.mean_resource_utilization,
            self.waiting_edge_count,
            self.processes_with_outgoing_waits,
            self.processes_with_incoming_waits,
            self.processes_with_both_waits,
            self.waiting_processes,
            self.holding_processes,
            self.waiting_and_holding_processes,
            self.fully_allocated_resources,
            self.contested_resources,
            self.mean_contention,
            self.max_contention,
        ]
    }

    /// `(name, value)` pairs in vector order
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES.iter().copied().zip(self.to_array()).collect()
    }
}

impl From<FeatureVector> for [f64; FEATURE_COUNT] {
    fn from(features: FeatureVector) -> Self {
        features.to_array()
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Extract the feature vector of a graph store
pub fn extract_features(store: &GraphStore) -> FeatureVector {
    let process_count = store.process_count();
    let resource_count = store.resource_count();

    let mut held_by_process: BTreeMap<&str, u64> = store.processes().map(|p| (p, 0)).collect();
    let mut requested_by_process = held_by_process.clone();
    let mut holders: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut requested_of_resource: BTreeMap<&str, u64> = BTreeMap::new();

    let mut total_allocated = 0u64;
    for (process, resource, count) in store.allocations() {
        total_allocated += u64::from(count);
        *held_by_process.entry(process).or_default() += u64::from(count);
        holders.entry(resource).or_default().insert(process);
    }

    let mut total_requested = 0u64;
    for (process, resource, count) in store.requests() {
        total_requested += u64::from(count);
        *requested_by_process.entry(process).or_default() += u64::from(count);
        *requested_of_resource.entry(resource).or_default() += u64::from(count);
    }

    let mut waiting_edges: BTreeSet<(&str, &str)> = BTreeSet::new();
    for (process, resource, _) in store.requests() {
        for holder in holders.get(resource).into_iter().flatten() {
            if *holder != process {
                waiting_edges.insert((process, *holder));
            }
        }
    }
    let outgoing: BTreeSet<&str> = waiting_edges.iter().map(|(from, _)| *from).collect();
    let incoming: BTreeSet<&str> = waiting_edges.iter().map(|(_, to)| *to).collect();
    let holding: BTreeSet<&str> = held_by_process.iter().filter(|(_, held)| **held > 0).map(|(p, _)| *p).collect();

    let mut total_instances = 0u64;
    let mut utilization = 0.0;
    let mut fully_allocated = 0usize;
    let mut contested = 0usize;
    let mut total_contention = 0u64;
    let mut max_contention = 0u64;
    for (id, info) in store.resources() {
        total_instances += u64::from(info.total);
        utilization += f64::from(info.allocated()) / f64::from(info.total.max(1));
        if info.available == 0 {
            fully_allocated += 1;
        }
        let requested = requested_of_resource.get(id).copied().unwrap_or(0);
        if requested > u64::from(info.available) {
            let excess = requested - u64::from(info.available);
            contested += 1;
            total_contention += excess;
            max_contention = max_contention.max(excess);
        }
    }

    let features = FeatureVector {
        process_count: process_count as f64,
        resource_count: resource_count as f64,
        total_instances: total_instances as f64,
        total_allocated: total_allocated as f64,
        total_requested: total_requested as f64,
        mean_allocation_per_process: mean(total_allocated as f64, process_count),
        mean_request_per_process: mean(total_requested as f64, process_count),
        max_allocation_per_process: held_by_process.values().copied().max().unwrap_or(0) as f64,
        max_request_per_process: requested_by_process.values().copied().max().unwrap_or(0) as f64,
        allocation_edge_count: store.allocation_edge_count() as f64,
        request_edge_count: store.request_edge_count() as f64,
        mean_resource_utilization: mean(utilization, resource_count),
        waiting_edge_count: waiting_edges.len() as f64,
        processes_with_outgoing_waits: outgoing.len() as f64,
        processes_with_incoming_waits: incoming.len() as f64,
        processes_with_both_waits: outgoing.intersection(&incoming).count() as f64,
        waiting_processes: outgoing.len() as f64,
        holding_processes: holding.len() as f64,
        waiting_and_holding_processes: outgoing.intersection(&holding).count() as f64,
        fully_allocated_resources: fully_allocated as f64,
        contested_resources: contested as f64,
        mean_contention: mean(total_contention as f64, contested),
        max_contention: max_contention as f64,
    };

    trace!(?features, "extracted features");
    features
}

/// Extract the feature vector of a node/edge snapshot
pub fn extract_from_snapshot(snapshot: &GraphSnapshot) -> GraphResult<FeatureVector> {
    let store = snapshot.to_store()?;
    Ok(extract_features(&store))
}
