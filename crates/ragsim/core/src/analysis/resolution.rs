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

//! Deadlock resolution by resource preemption or process termination.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::detection::detect_deadlock;
use crate::error::{GraphError, GraphResult};
use crate::graph::GraphStore;

/// How deadlocked processes are dealt with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// Take every held instance and pending request away, keep the process
    Preemption,
    /// Remove the process from the graph
    Termination,
}

impl FromStr for ResolutionStrategy {
    type Err = GraphError;

    fn from_str(s: &str) -> GraphResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "preempt" | "preemption" => Ok(ResolutionStrategy::Preemption),
            "terminate" | "termination" => Ok(ResolutionStrategy::Termination),
            other => Err(GraphError::invalid(format!("unknown resolution strategy {other:?}"))),
        }
    }
}

/// Outcome of a resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    /// Processes that were preempted or terminated
    pub victims: Vec<String>,
    /// Graph after resolution
    pub store: GraphStore,
    /// Whether detection still reports deadlocked processes afterwards
    pub deadlock_persists: bool,
}

/// Resolve the current deadlock, returning the resolved graph
///
/// Works on a copy; `store` itself is never modified.
pub fn resolve(store: &GraphStore, strategy: ResolutionStrategy) -> GraphResult<Resolution> {
    let detection = detect_deadlock(store);
    if !detection.has_deadlock {
        debug!("no deadlock to resolve");
        return Ok(Resolution {
            strategy,
            victims: Vec::new(),
            store: store.clone(),
            deadlock_persists: false,
        });
    }

    let mut resolved = store.clone();
    for process in &detection.deadlocked {
        match strategy {
            ResolutionStrategy::Preemption => resolved.preempt_process(process)?,
            ResolutionStrategy::Termination => resolved.remove_process(process)?,
        }
    }

    let deadlock_persists = detect_deadlock(&resolved).has_deadlock;
    info!(?strategy, victims = detection.deadlocked.len(), deadlock_persists, "resolved deadlock");

    Ok(Resolution {
        strategy,
        victims: detection.deadlocked,
        store: resolved,
        deadlock_persists,
    })
}
