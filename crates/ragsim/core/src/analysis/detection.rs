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

//! Deadlock Detection
//!
//! Answers "is the system deadlocked right now": reduces the graph using the
//! pending request edges as demand. A process that cannot finish even after
//! every finishable process has released its holdings is deadlocked.
//!
//! This is not a safety check. A state with no deadlock can still be unsafe
//! once processes ask for more; see [`crate::analysis::safety`].

use serde::Serialize;
use tracing::debug;

use super::reducibility::{Reduction, reduce};
use crate::graph::GraphStore;

/// Result of request-based deadlock detection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlockDetection {
    pub has_deadlock: bool,
    /// Processes that cannot finish, ascending
    pub deadlocked: Vec<String>,
    /// Order in which the remaining processes finish
    pub completion_order: Vec<String>,
    /// Share of processes that are deadlocked, 0 to 100
    pub deadlock_percentage: f64,
    pub explanation: Vec<String>,
}

impl DeadlockDetection {
    pub fn is_deadlocked(&self, process: &str) -> bool {
        self.deadlocked.iter().any(|p| p == process)
    }
}

/// Detect deadlocked processes from the current request edges
pub fn detect_deadlock(store: &GraphStore) -> DeadlockDetection {
    let reduction: Reduction<String, String> = reduce(
        store.processes().map(str::to_string),
        &store.available_vector(),
        &store.allocation_matrix(),
        &store.request_matrix(),
    );

    let total = store.process_count();
    let deadlock_percentage = if total == 0 {
        0.0
    } else {
        reduction.unfinished.len() as f64 / total as f64 * 100.0
    };

    let mut explanation = Vec::new();
    for step in &reduction.steps {
        explanation.push(format!("Process {} can proceed: its pending requests fit in the available instances.", step.process));
        explanation.push(format!("Process {} releases its resources. New available: {}", step.process, format_work(&step.work_after)));
    }
    if reduction.unfinished.is_empty() {
        explanation.push("All processes can complete. The system is not deadlocked.".to_string());
    } else {
        explanation.push(format!("Processes [{}] cannot complete. The system is deadlocked.", reduction.unfinished.join(", ")));
    }

    debug!(deadlocked = reduction.unfinished.len(), processes = total, "request-based deadlock detection finished");

    DeadlockDetection {
        has_deadlock: !reduction.unfinished.is_empty(),
        deadlocked: reduction.unfinished,
        completion_order: reduction.sequence,
        deadlock_percentage,
        explanation,
    }
}

fn format_work(work: &std::collections::BTreeMap<String, u32>) -> String {
    let cells: Vec<String> = work.iter().map(|(resource, count)| format!("{resource}={count}")).collect();
    format!("{{{}}}", cells.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_wait_is_deadlocked() {
        let mut store = GraphStore::new();
        for p in ["P0", "P1"] {
            store.add_process(Some(p)).unwrap();
        }
        for r in ["R0", "R1"] {
            store.add_resource(Some(r), 1).unwrap();
        }
        store.add_allocation("P0", "R0", 1).unwrap();
        store.add_request("P0", "R1", 1).unwrap();
        store.add_allocation("P1", "R1", 1).unwrap();
        store.add_request("P1", "R0", 1).unwrap();

        let detection = detect_deadlock(&store);
        assert!(detection.has_deadlock);
        assert_eq!(detection.deadlocked, vec!["P0", "P1"]);
        assert_eq!(detection.deadlock_percentage, 100.0);
        assert!(detection.is_deadlocked("P1"));
    }

    #[test]
    fn test_chain_unwinds() {
        let mut store = GraphStore::new();
        for p in ["P1", "P2", "P3"] {
            store.add_process(Some(p)).unwrap();
        }
        store.add_resource(Some("R1"), 1).unwrap();
        store.add_resource(Some("R2"), 1).unwrap();
        store.add_allocation("P2", "R1", 1).unwrap();
        store.add_allocation("P3", "R2", 1).unwrap();
        store.add_request("P1", "R1", 1).unwrap();
        store.add_request("P2", "R2", 1).unwrap();

        let detection = detect_deadlock(&store);
        assert!(!detection.has_deadlock);
        assert_eq!(detection.completion_order, vec!["P3", "P2", "P1"]);
        assert_eq!(detection.deadlock_percentage, 0.0);
    }

    #[test]
    fn test_partial_deadlock_percentage() {
        let mut store = GraphStore::new();
        for p in ["A", "B", "C", "D"] {
            store.add_process(Some(p)).unwrap();
        }
        store.add_resource(Some("X"), 1).unwrap();
        store.add_resource(Some("Y"), 1).unwrap();
        store.add_allocation("A", "X", 1).unwrap();
        store.add_allocation("B", "Y", 1).unwrap();
        store.add_request("A", "Y", 1).unwrap();
        store.add_request("B", "X", 1).unwrap();

        let detection = detect_deadlock(&store);
        assert_eq!(detection.deadlocked, vec!["A", "B"]);
        assert_eq!(detection.deadlock_percentage, 50.0);
    }

    #[test]
    fn test_empty_store() {
        let detection = detect_deadlock(&GraphStore::new());
        assert!(!detection.has_deadlock);
        assert_eq!(detection.deadlock_percentage, 0.0);
    }
}
