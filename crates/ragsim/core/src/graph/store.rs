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

//! Resource Allocation Graph Store
//!
//! This module owns the processes, resources, allocation edges and request
//! edges of a resource-allocation graph. Every mutation validates its input
//! first and only then applies, so a failed call never leaves a half-updated
//! graph behind. The store keeps `available = total - allocated` for every
//! resource at all times.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EntityKind, GraphError, GraphResult};

/// Separator used by the canonical edge key encoding (`"P1->R1"`)
pub const EDGE_KEY_SEPARATOR: &str = "->";

/// Prefix used for auto-named processes
pub const PROCESS_PREFIX: &str = "P";

/// Prefix used for auto-named resources
pub const RESOURCE_PREFIX: &str = "R";

/// Per-process, per-resource counts keyed by ids
pub type Matrix<P, R> = BTreeMap<P, BTreeMap<R, u32>>;

/// Instance bookkeeping for a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// Number of instances the resource was created with
    pub total: u32,
    /// Instances not currently allocated to any process
    pub available: u32,
}

impl ResourceInfo {
    pub fn new(total: u32) -> Self {
        Self { total, available: total }
    }

    /// Instances currently held by processes
    pub fn allocated(&self) -> u32 {
        self.total - self.available
    }

    pub fn is_single_instance(&self) -> bool {
        self.total == 1
    }
}

/// Resource-allocation graph state
///
/// Edges are keyed by `(process, resource)`; an absent key means a count of
/// zero, and no zero-count entry is ever stored.
#[derive(Debug, Clone)]
pub struct GraphStore {
    processes: BTreeSet<String>,
    resources: BTreeMap<String, ResourceInfo>,
    allocations: BTreeMap<(String, String), u32>,
    requests: BTreeMap<(String, String), u32>,
    next_process_id: u32,
    next_resource_id: u32,
}

impl GraphStore {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            processes: BTreeSet::new(),
            resources: BTreeMap::new(),
            allocations: BTreeMap::new(),
            requests: BTreeMap::new(),
            next_process_id: 1,
            next_resource_id: 1,
        }
    }

    /// Add a process, auto-naming it when `id` is `None` or empty
    pub fn add_process(&mut self, id: Option<&str>) -> GraphResult<String> {
        let id = match id.filter(|s| !s.is_empty()) {
            Some(id) => {
                validate_id(id)?;
                id.to_string()
            }
            None => self.auto_process_name(),
        };

        if self.is_taken(&id) {
            return Err(GraphError::duplicate(EntityKind::Process, id));
        }

        trace!(process = %id, "adding process");
        self.processes.insert(id.clone());
        Ok(id)
    }

    /// Add a resource with `instances` total instances, auto-naming it when `id` is `None` or empty
    pub fn add_resource(&mut self, id: Option<&str>, instances: u32) -> GraphResult<String> {
        if instances < 1 {
            return Err(GraphError::invalid(format!("resource must have at least one instance, got {instances}")));
        }

        let id = match id.filter(|s| !s.is_empty()) {
            Some(id) => {
                validate_id(id)?;
                id.to_string()
            }
            None => self.auto_resource_name(),
        };

        if self.is_taken(&id) {
            return Err(GraphError::duplicate(EntityKind::Resource, id));
        }

        trace!(resource = %id, instances, "adding resource");
        self.resources.insert(id.clone(), ResourceInfo::new(instances));
        Ok(id)
    }

    /// Allocate `count` instances of `resource` to `process`
    pub fn add_allocation(&mut self, process: &str, resource: &str, count: u32) -> GraphResult<()> {
        validate_count(count)?;
        self.require_process(process)?;
        let available = self.require_resource(resource)?.available;

        if count > available {
            return Err(GraphError::InsufficientInstances {
                resource: resource.to_string(),
                requested: count,
                available,
            });
        }

        if let Some(info) = self.resources.get_mut(resource) {
            info.available -= count;
        }
        *self.allocations.entry(edge_key(process, resource)).or_insert(0) += count;
        trace!(process, resource, count, "allocated instances");
        Ok(())
    }

    /// Record that `process` is waiting for `count` instances of `resource`
    ///
    /// Requests are not checked against availability, but a pending total
    /// past `u32::MAX` is rejected.
    pub fn add_request(&mut self, process: &str, resource: &str, count: u32) -> GraphResult<()> {
        validate_count(count)?;
        self.require_process(process)?;
        self.require_resource(resource)?;

        let key = edge_key(process, resource);
        let pending = self.requests.get(&key).copied().unwrap_or(0);
        let total = pending
            .checked_add(count)
            .ok_or_else(|| GraphError::invalid(format!("request from {process} for {resource} would exceed {} instances", u32::MAX)))?;
        self.requests.insert(key, total);
        trace!(process, resource, count, "recorded request");
        Ok(())
    }

    /// Release `count` allocated instances back to `resource`
    pub fn remove_allocation(&mut self, process: &str, resource: &str, count: u32) -> GraphResult<()> {
        validate_count(count)?;
        self.require_process(process)?;
        self.require_resource(resource)?;

        let key = edge_key(process, resource);
        let held = self.allocations.get(&key).copied().unwrap_or(0);
        if count > held {
            return Err(GraphError::invalid(format!("cannot release {count} instances of {resource} from {process}, which holds {held}")));
        }

        if held == count {
            self.allocations.remove(&key);
        } else {
            self.allocations.insert(key, held - count);
        }
        if let Some(info) = self.resources.get_mut(resource) {
            info.available += count;
        }
        trace!(process, resource, count, "released instances");
        Ok(())
    }

    /// Withdraw `count` requested instances of `resource` from `process`
    pub fn remove_request(&mut self, process: &str, resource: &str, count: u32) -> GraphResult<()> {
        validate_count(count)?;
        self.require_process(process)?;
        self.require_resource(resource)?;

        let key = edge_key(process, resource);
        let pending = self.requests.get(&key).copied().unwrap_or(0);
        if count > pending {
            return Err(GraphError::invalid(format!("cannot withdraw {count} requested instances of {resource} from {process}, which requests {pending}")));
        }

        if pending == count {
            self.requests.remove(&key);
        } else {
            self.requests.insert(key, pending - count);
        }
        Ok(())
    }

    /// Remove a process together with every edge that references it
    pub fn remove_process(&mut self, process: &str) -> GraphResult<()> {
        self.require_process(process)?;

        let held: Vec<(String, u32)> = self
            .allocations
            .iter()
            .filter(|((p, _), _)| p == process)
            .map(|((_, r), count)| (r.clone(), *count))
            .collect();

        for (resource, count) in held {
            self.allocations.remove(&edge_key(process, &resource));
            if let Some(info) = self.resources.get_mut(&resource) {
                info.available += count;
            }
        }
        self.requests.retain(|(p, _), _| p != process);
        self.processes.remove(process);

        trace!(process, "removed process");
        Ok(())
    }

    /// Strip every allocation and request of `process` but keep the process itself
    pub fn preempt_process(&mut self, process: &str) -> GraphResult<()> {
        self.require_process(process)?;

        let held: Vec<(String, u32)> = self
            .allocations
            .iter()
            .filter(|((p, _), _)| p == process)
            .map(|((_, r), count)| (r.clone(), *count))
            .collect();

        for (resource, count) in held {
            self.remove_allocation(process, &resource, count)?;
        }
        self.requests.retain(|(p, _), _| p != process);
        Ok(())
    }

    pub fn has_process(&self, process: &str) -> bool {
        self.processes.contains(process)
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        self.resources.contains_key(resource)
    }

    /// Process ids in ascending order
    pub fn processes(&self) -> impl Iterator<Item = &str> {
        self.processes.iter().map(String::as_str)
    }

    /// Resources in ascending id order
    pub fn resources(&self) -> impl Iterator<Item = (&str, &ResourceInfo)> {
        self.resources.iter().map(|(id, info)| (id.as_str(), info))
    }

    pub fn resource(&self, resource: &str) -> Option<&ResourceInfo> {
        self.resources.get(resource)
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty() && self.resources.is_empty()
    }

    /// Instances of `resource` currently held by `process`
    pub fn allocation(&self, process: &str, resource: &str) -> u32 {
        self.allocations.get(&edge_key(process, resource)).copied().unwrap_or(0)
    }

    /// Instances of `resource` currently requested by `process`
    pub fn request(&self, process: &str, resource: &str) -> u32 {
        self.requests.get(&edge_key(process, resource)).copied().unwrap_or(0)
    }

    /// Allocation edges as `(process, resource, count)`
    pub fn allocations(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.allocations.iter().map(|((p, r), count)| (p.as_str(), r.as_str(), *count))
    }

    /// Request edges as `(process, resource, count)`
    pub fn requests(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.requests.iter().map(|((p, r), count)| (p.as_str(), r.as_str(), *count))
    }

    pub fn allocation_edge_count(&self) -> usize {
        self.allocations.len()
    }

    pub fn request_edge_count(&self) -> usize {
        self.requests.len()
    }

    /// Current availability keyed by resource
    pub fn available_vector(&self) -> BTreeMap<String, u32> {
        self.resources.iter().map(|(id, info)| (id.clone(), info.available)).collect()
    }

    /// Allocation edges as a process -> resource -> count matrix
    pub fn allocation_matrix(&self) -> Matrix<String, String> {
        to_matrix(&self.allocations)
    }

    /// Request edges as a process -> resource -> count matrix
    pub fn request_matrix(&self) -> Matrix<String, String> {
        to_matrix(&self.requests)
    }

    /// Verify `available + allocated == total` for every resource
    pub fn check_invariants(&self) -> GraphResult<()> {
        let mut allocated: BTreeMap<&str, u64> = BTreeMap::new();
        for ((process, resource), count) in &self.allocations {
            if !self.processes.contains(process) {
                return Err(GraphError::malformed(format!("allocation references unknown process {process}")));
            }
            if !self.resources.contains_key(resource) {
                return Err(GraphError::malformed(format!("allocation references unknown resource {resource}")));
            }
            if *count == 0 {
                return Err(GraphError::malformed(format!("zero-count allocation {process}{EDGE_KEY_SEPARATOR}{resource}")));
            }
            *allocated.entry(resource.as_str()).or_insert(0) += u64::from(*count);
        }

        for ((process, resource), count) in &self.requests {
            if !self.processes.contains(process) || !self.resources.contains_key(resource) {
                return Err(GraphError::malformed(format!("request {process}{EDGE_KEY_SEPARATOR}{resource} references an unknown entity")));
            }
            if *count == 0 {
                return Err(GraphError::malformed(format!("zero-count request {process}{EDGE_KEY_SEPARATOR}{resource}")));
            }
        }

        for (id, info) in &self.resources {
            if self.processes.contains(id) {
                return Err(GraphError::malformed(format!("{id} is both a process and a resource")));
            }
            if info.total < 1 {
                return Err(GraphError::malformed(format!("resource {id} has no instances")));
            }
            let held = allocated.get(id.as_str()).copied().unwrap_or(0);
            if u64::from(info.available) + held != u64::from(info.total) {
                return Err(GraphError::malformed(format!(
                    "resource {id}: available {} + allocated {held} != total {}",
                    info.available, info.total
                )));
            }
        }
        Ok(())
    }

    fn require_process(&self, process: &str) -> GraphResult<()> {
        if self.processes.contains(process) {
            Ok(())
        } else {
            Err(GraphError::unknown(EntityKind::Process, process))
        }
    }

    fn require_resource(&self, resource: &str) -> GraphResult<&ResourceInfo> {
        self.resources.get(resource).ok_or_else(|| GraphError::unknown(EntityKind::Resource, resource))
    }

    /// Processes and resources share one id space since both are graph nodes
    fn is_taken(&self, id: &str) -> bool {
        self.processes.contains(id) || self.resources.contains_key(id)
    }

    fn auto_process_name(&mut self) -> String {
        while self.is_taken(&format!("{PROCESS_PREFIX}{}", self.next_process_id)) {
            self.next_process_id += 1;
        }
        format!("{PROCESS_PREFIX}{}", self.next_process_id)
    }

    fn auto_resource_name(&mut self) -> String {
        while self.is_taken(&format!("{RESOURCE_PREFIX}{}", self.next_resource_id)) {
            self.next_resource_id += 1;
        }
        format!("{RESOURCE_PREFIX}{}", self.next_resource_id)
    }

    /// Assemble a store from already-validated parts
    pub(crate) fn from_parts(
        processes: BTreeSet<String>,
        resources: BTreeMap<String, ResourceInfo>,
        allocations: BTreeMap<(String, String), u32>,
        requests: BTreeMap<(String, String), u32>,
    ) -> Self {
        Self {
            processes,
            resources,
            allocations,
            requests,
            next_process_id: 1,
            next_resource_id: 1,
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Stores compare by graph content; auto-naming counters are not part of it
impl PartialEq for GraphStore {
    fn eq(&self, other: &Self) -> bool {
        self.processes == other.processes && self.resources == other.resources && self.allocations == other.allocations && self.requests == other.requests
    }
}

impl Eq for GraphStore {}

fn edge_key(process: &str, resource: &str) -> (String, String) {
    (process.to_string(), resource.to_string())
}

fn to_matrix(edges: &BTreeMap<(String, String), u32>) -> Matrix<String, String> {
    let mut matrix: Matrix<String, String> = BTreeMap::new();
    for ((process, resource), count) in edges {
        matrix.entry(process.clone()).or_default().insert(resource.clone(), *count);
    }
    matrix
}

fn validate_count(count: u32) -> GraphResult<()> {
    if count < 1 {
        return Err(GraphError::invalid("count must be positive"));
    }
    Ok(())
}

pub(crate) fn validate_id(id: &str) -> GraphResult<()> {
    if id.trim().is_empty() {
        return Err(GraphError::invalid("id must not be blank"));
    }
    if id.contains(EDGE_KEY_SEPARATOR) {
        return Err(GraphError::invalid(format!("id {id:?} must not contain {EDGE_KEY_SEPARATOR:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> GraphStore {
        let mut store = GraphStore::new();
        store.add_process(Some("P0")).unwrap();
        store.add_process(Some("P1")).unwrap();
        store.add_resource(Some("R0"), 1).unwrap();
        store.add_resource(Some("R1"), 2).unwrap();
        store
    }

    #[test]
    fn test_auto_naming_uses_lowest_unused() {
        let mut store = GraphStore::new();
        store.add_process(Some("P1")).unwrap();
        store.add_process(Some("P2")).unwrap();

        assert_eq!(store.add_process(None).unwrap(), "P3");
        assert_eq!(store.add_process(Some("")).unwrap(), "P4");
        assert_eq!(store.add_resource(None, 1).unwrap(), "R1");
        assert_eq!(store.add_resource(None, 3).unwrap(), "R2");
    }

    #[test]
    fn test_counters_are_per_store() {
        let mut first = GraphStore::new();
        first.add_process(None).unwrap();
        first.add_process(None).unwrap();

        let mut second = GraphStore::new();
        assert_eq!(second.add_process(None).unwrap(), "P1");
    }

    #[test]
    fn test_duplicate_entities_rejected() {
        let mut store = two_by_two();
        assert_eq!(store.add_process(Some("P0")), Err(GraphError::duplicate(EntityKind::Process, "P0")));
        assert_eq!(store.add_resource(Some("R1"), 4), Err(GraphError::duplicate(EntityKind::Resource, "R1")));
        assert_eq!(store.resource("R1").unwrap().total, 2);
        assert_eq!(store.add_resource(Some("P1"), 1), Err(GraphError::duplicate(EntityKind::Resource, "P1")));
        assert_eq!(store.add_process(Some("R0")), Err(GraphError::duplicate(EntityKind::Process, "R0")));
    }

    #[test]
    fn test_invalid_ids_and_instances() {
        let mut store = GraphStore::new();
        assert!(matches!(store.add_resource(Some("R0"), 0), Err(GraphError::InvalidArgument(_))));
        assert!(matches!(store.add_process(Some("   ")), Err(GraphError::InvalidArgument(_))));
        assert!(matches!(store.add_process(Some("P->R")), Err(GraphError::InvalidArgument(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_allocation_updates_availability() {
        let mut store = two_by_two();
        store.add_allocation("P0", "R1", 2).unwrap();

        assert_eq!(store.allocation("P0", "R1"), 2);
        assert_eq!(store.resource("R1").unwrap().available, 0);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_allocation_failures_do_not_mutate() {
        let mut store = two_by_two();
        let before = store.clone();

        let err = store.add_allocation("P0", "R1", 3).unwrap_err();
        assert_eq!(
            err,
            GraphError::InsufficientInstances {
                resource: "R1".to_string(),
                requested: 3,
                available: 2
            }
        );
        assert!(matches!(store.add_allocation("P9", "R1", 1), Err(GraphError::UnknownEntity { .. })));
        assert!(matches!(store.add_allocation("P0", "R9", 1), Err(GraphError::UnknownEntity { .. })));
        assert!(matches!(store.add_allocation("P0", "R0", 0), Err(GraphError::InvalidArgument(_))));
        assert_eq!(store, before);
    }

    #[test]
    fn test_requests_ignore_availability() {
        let mut store = two_by_two();
        store.add_request("P0", "R0", 5).unwrap();
        store.add_request("P0", "R0", 1).unwrap();

        assert_eq!(store.request("P0", "R0"), 6);
        assert_eq!(store.resource("R0").unwrap().available, 1);
        assert!(matches!(store.add_request("P0", "R7", 1), Err(GraphError::UnknownEntity { .. })));
    }

    #[test]
    fn test_request_overflow_is_rejected() {
        let mut store = two_by_two();
        store.add_request("P0", "R0", u32::MAX).unwrap();

        assert!(matches!(store.add_request("P0", "R0", 5), Err(GraphError::InvalidArgument(_))));
        assert_eq!(store.request("P0", "R0"), u32::MAX);
    }

    #[test]
    fn test_remove_allocation() {
        let mut store = two_by_two();
        store.add_allocation("P1", "R1", 2).unwrap();

        store.remove_allocation("P1", "R1", 1).unwrap();
        assert_eq!(store.allocation("P1", "R1"), 1);
        assert_eq!(store.resource("R1").unwrap().available, 1);

        assert!(matches!(store.remove_allocation("P1", "R1", 2), Err(GraphError::InvalidArgument(_))));

        store.remove_allocation("P1", "R1", 1).unwrap();
        assert_eq!(store.allocation_edge_count(), 0);
        assert_eq!(store.resource("R1").unwrap().available, 2);
    }

    #[test]
    fn test_remove_request() {
        let mut store = two_by_two();
        store.add_request("P0", "R0", 2).unwrap();
        store.remove_request("P0", "R0", 2).unwrap();
        assert_eq!(store.request_edge_count(), 0);
        assert!(matches!(store.remove_request("P0", "R0", 1), Err(GraphError::InvalidArgument(_))));
    }

    #[test]
    fn test_remove_process_purges_edges() {
        let mut store = two_by_two();
        store.add_allocation("P0", "R0", 1).unwrap();
        store.add_allocation("P0", "R1", 1).unwrap();
        store.add_request("P0", "R1", 1).unwrap();
        store.add_request("P1", "R0", 1).unwrap();

        store.remove_process("P0").unwrap();

        assert!(!store.has_process("P0"));
        assert_eq!(store.resource("R0").unwrap().available, 1);
        assert_eq!(store.resource("R1").unwrap().available, 2);
        assert_eq!(store.allocation_edge_count(), 0);
        assert_eq!(store.request_edge_count(), 1);
        store.check_invariants().unwrap();

        assert!(matches!(store.remove_process("P0"), Err(GraphError::UnknownEntity { .. })));
    }

    #[test]
    fn test_preempt_keeps_process() {
        let mut store = two_by_two();
        store.add_allocation("P1", "R0", 1).unwrap();
        store.add_request("P1", "R1", 2).unwrap();

        store.preempt_process("P1").unwrap();

        assert!(store.has_process("P1"));
        assert_eq!(store.allocation_edge_count(), 0);
        assert_eq!(store.request_edge_count(), 0);
        assert_eq!(store.resource("R0").unwrap().available, 1);
    }

    #[test]
    fn test_matrices() {
        let mut store = two_by_two();
        store.add_allocation("P0", "R0", 1).unwrap();
        store.add_request("P1", "R0", 1).unwrap();

        let allocation = store.allocation_matrix();
        assert_eq!(allocation["P0"]["R0"], 1);
        assert!(!allocation.contains_key("P1"));

        let request = store.request_matrix();
        assert_eq!(request["P1"]["R0"], 1);

        let available = store.available_vector();
        assert_eq!(available["R0"], 0);
        assert_eq!(available["R1"], 2);
    }
}
