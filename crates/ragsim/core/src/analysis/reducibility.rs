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

//! Graph Reduction
//!
//! Repeatedly finishes any process whose demand fits in the current work
//! vector and returns its holdings to that vector, until a full pass makes no
//! progress. Deadlock detection and the Banker's safety check both run this
//! same fixpoint; they differ only in what they pass as `demand`.
//!
//! Processes are scanned in ascending key order, so the finish sequence is
//! reproducible. The finished set does not depend on the scan order.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::Matrix;

/// One process being finished during reduction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionStep<P, R> {
    pub process: P,
    /// Demand that was checked against `work_before`
    pub demand: BTreeMap<R, u32>,
    pub work_before: BTreeMap<R, u32>,
    /// Work after the process returned its holdings
    pub work_after: BTreeMap<R, u32>,
}

/// Outcome of a reduction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction<P, R> {
    /// Processes in the order they finished
    pub sequence: Vec<P>,
    /// Processes that could never finish, ascending
    pub unfinished: Vec<P>,
    pub steps: Vec<ReductionStep<P, R>>,
    /// Final work vector
    pub work: BTreeMap<R, u32>,
}

impl<P: Ord, R> Reduction<P, R> {
    pub fn is_complete(&self) -> bool {
        self.unfinished.is_empty()
    }

    pub fn is_finished(&self, process: &P) -> bool {
        self.sequence.contains(process)
    }
}

/// Reduce `processes` against `work`, consuming `demand` and releasing `hold`
///
/// Missing matrix rows and cells count as zero. A demand on a resource that
/// is absent from `work` can only be met when it is zero.
pub fn reduce<P, R>(processes: impl IntoIterator<Item = P>, work: &BTreeMap<R, u32>, hold: &Matrix<P, R>, demand: &Matrix<P, R>) -> Reduction<P, R>
where
    P: Ord + Clone,
    R: Ord + Clone,
{
    let mut pending: BTreeSet<P> = processes.into_iter().collect();
    let mut work = work.clone();
    let mut sequence = Vec::new();
    let mut steps = Vec::new();
    let empty = BTreeMap::new();

    loop {
        let mut progressed = false;
        let candidates: Vec<P> = pending.iter().cloned().collect();

        for process in candidates {
            let row = demand.get(&process).unwrap_or(&empty);
            let satisfiable = row.iter().all(|(resource, needed)| *needed <= work.get(resource).copied().unwrap_or(0));
            if !satisfiable {
                continue;
            }

            let work_before = work.clone();
            for (resource, held) in hold.get(&process).unwrap_or(&empty) {
                let slot = work.entry(resource.clone()).or_insert(0);
                *slot = slot.saturating_add(*held);
            }

            steps.push(ReductionStep {
                process: process.clone(),
                demand: row.clone(),
                work_before,
                work_after: work.clone(),
            });
            pending.remove(&process);
            sequence.push(process);
            progressed = true;
        }

        if !progressed {
            break;
        }
    }

    Reduction {
        sequence,
        unfinished: pending.into_iter().collect(),
        steps,
        work,
    }
}
