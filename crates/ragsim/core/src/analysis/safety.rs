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

//! Banker's Algorithm
//!
//! Safety checking reduces the state using each process's remaining need
//! (declared maximum claim minus current allocation) as demand. A state is
//! safe when every process can finish in some order; that order is the safe
//! sequence.
//!
//! Request admission tests a request against a clone of the state and never
//! touches the caller's copy. Committing a granted request is a separate,
//! explicit [`BankersState::grant`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::reducibility::reduce;
use crate::error::{EntityKind, GraphError, GraphResult};
use crate::graph::{GraphStore, Matrix};

/// Index-based Banker's state: process `i`, resource type `j`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankersState {
    available: Vec<u32>,
    allocation: Vec<Vec<u32>>,
    need: Vec<Vec<u32>>,
}

impl BankersState {
    /// Build a state from an explicit need matrix
    pub fn new(available: Vec<u32>, allocation: Vec<Vec<u32>>, need: Vec<Vec<u32>>) -> GraphResult<Self> {
        let resources = available.len();
        if allocation.len() != need.len() {
            return Err(GraphError::invalid(format!("allocation has {} rows but need has {}", allocation.len(), need.len())));
        }
        check_rows("allocation", &allocation, resources)?;
        check_rows("need", &need, resources)?;
        Ok(Self { available, allocation, need })
    }

    /// Build a state from maximum claims, deriving `need = max - allocation`
    pub fn from_max(available: Vec<u32>, allocation: Vec<Vec<u32>>, max: Vec<Vec<u32>>) -> GraphResult<Self> {
        let resources = available.len();
        if allocation.len() != max.len() {
            return Err(GraphError::invalid(format!("allocation has {} rows but max has {}", allocation.len(), max.len())));
        }
        check_rows("allocation", &allocation, resources)?;
        check_rows("max", &max, resources)?;

        let mut need = Vec::with_capacity(max.len());
        for (i, (claim, held)) in max.iter().zip(&allocation).enumerate() {
            let mut row = Vec::with_capacity(resources);
            for (j, (c, h)) in claim.iter().zip(held).enumerate() {
                let remaining = c.checked_sub(*h).ok_or_else(|| GraphError::invalid(format!("process {i} holds {h} of resource {j}, above its maximum claim {c}")))?;
                row.push(remaining);
            }
            need.push(row);
        }
        Ok(Self { available, allocation, need })
    }

    /// Build a state from a graph store plus caller-declared maximum claims
    ///
    /// Processes and resources are indexed in ascending id order, matching
    /// [`GraphStore::processes`] and [`GraphStore::resources`]. Every process
    /// must have a claim row; absent cells in a row are zero.
    pub fn from_store(store: &GraphStore, max_claims: &Matrix<String, String>) -> GraphResult<Self> {
        for (process, row) in max_claims {
            if !store.has_process(process) {
                return Err(GraphError::unknown(EntityKind::Process, process.clone()));
            }
            if let Some(resource) = row.keys().find(|r| !store.has_resource(r)) {
                return Err(GraphError::unknown(EntityKind::Resource, resource.clone()));
            }
        }

        let resources: Vec<&str> = store.resources().map(|(id, _)| id).collect();
        let available = store.resources().map(|(_, info)| info.available).collect();

        let mut allocation = Vec::new();
        let mut max = Vec::new();
        for process in store.processes() {
            let claim = max_claims.get(process).ok_or_else(|| GraphError::invalid(format!("no maximum claim declared for process {process}")))?;
            allocation.push(resources.iter().map(|r| store.allocation(process, r)).collect());
            max.push(resources.iter().map(|r| claim.get(*r).copied().unwrap_or(0)).collect());
        }

        BankersState::from_max(available, allocation, max)
    }

    pub fn available(&self) -> &[u32] {
        &self.available
    }

    pub fn allocation(&self) -> &[Vec<u32>] {
        &self.allocation
    }

    pub fn need(&self) -> &[Vec<u32>] {
        &self.need
    }

    pub fn process_count(&self) -> usize {
        self.allocation.len()
    }

    pub fn resource_count(&self) -> usize {
        self.available.len()
    }

    /// Commit a request: move `request` from available to the process's allocation
    pub fn grant(&mut self, process: usize, request: &[u32]) -> GraphResult<()> {
        self.check_request_shape(process, request)?;
        if request.iter().zip(&self.need[process]).any(|(r, n)| r > n) {
            return Err(GraphError::invalid(format!("request exceeds maximum claim for process {process}")));
        }
        if request.iter().zip(&self.available).any(|(r, a)| r > a) {
            return Err(GraphError::invalid("request exceeds available resources"));
        }

        self.apply(process, request);
        Ok(())
    }

    fn apply(&mut self, process: usize, request: &[u32]) {
        for (j, amount) in request.iter().enumerate() {
            self.available[j] -= amount;
            self.allocation[process][j] += amount;
            self.need[process][j] -= amount;
        }
    }

    fn check_request_shape(&self, process: usize, request: &[u32]) -> GraphResult<()> {
        if process >= self.process_count() {
            return Err(GraphError::unknown(EntityKind::Process, process.to_string()));
        }
        if request.len() != self.resource_count() {
            return Err(GraphError::invalid(format!("request has {} entries but there are {} resource types", request.len(), self.resource_count())));
        }
        if let Some(j) = request.iter().zip(&self.allocation[process]).position(|(r, a)| a.checked_add(*r).is_none()) {
            return Err(GraphError::invalid(format!("granting request would overflow allocation of resource {j} for process {process}")));
        }
        Ok(())
    }

    fn to_matrix(rows: &[Vec<u32>]) -> Matrix<usize, usize> {
        rows.iter().enumerate().map(|(i, row)| (i, row.iter().copied().enumerate().collect())).collect()
    }
}

fn check_rows(name: &str, rows: &[Vec<u32>], resources: usize) -> GraphResult<()> {
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != resources) {
        return Err(GraphError::invalid(format!("{name} row {i} has {} entries but there are {resources} resource types", row.len())));
    }
    Ok(())
}

/// Outcome of a safety check or request admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyVerdict {
    pub is_safe: bool,
    pub safe_sequence: Option<Vec<usize>>,
    pub explanation: Vec<String>,
}

impl SafetyVerdict {
    fn rejected(explanation: Vec<String>) -> Self {
        Self {
            is_safe: false,
            safe_sequence: None,
            explanation,
        }
    }
}

/// Run the Banker's safety algorithm
pub fn check_safety(state: &BankersState) -> SafetyVerdict {
    let work: BTreeMap<usize, u32> = state.available.iter().copied().enumerate().collect();
    let reduction = reduce(
        0..state.process_count(),
        &work,
        &BankersState::to_matrix(&state.allocation),
        &BankersState::to_matrix(&state.need),
    );

    let mut explanation = vec![
        "Starting safety algorithm to determine if the state is safe.".to_string(),
        format!("Initial available resources: {:?}", state.available),
        "Checking for processes that can complete with available resources...".to_string(),
    ];

    for step in &reduction.steps {
        let before: Vec<u32> = step.work_before.values().copied().collect();
        let after: Vec<u32> = step.work_after.values().copied().collect();
        explanation.push(format!("Process {} can complete with available resources {before:?}.", step.process));
        explanation.push(format!("Need: {:?}, Available: {before:?}", state.need[step.process]));
        explanation.push(format!("Process {} releases its resources. New available: {after:?}", step.process));
    }

    debug!(safe = reduction.is_complete(), processes = state.process_count(), "banker's safety check finished");

    if reduction.is_complete() {
        explanation.push(format!("All processes can complete. Safe sequence: {}", format_sequence(&reduction.sequence)));
        SafetyVerdict {
            is_safe: true,
            safe_sequence: Some(reduction.sequence),
            explanation,
        }
    } else {
        explanation.push(format!("Processes {:?} cannot complete. The system is in an unsafe state.", reduction.unfinished));
        SafetyVerdict::rejected(explanation)
    }
}

/// Decide whether `request` from `process` may be granted
///
/// The state is left untouched; on a safe verdict the caller commits with
/// [`BankersState::grant`].
pub fn request_admission(state: &BankersState, process: usize, request: &[u32]) -> GraphResult<SafetyVerdict> {
    state.check_request_shape(process, request)?;

    if request.iter().zip(&state.need[process]).any(|(r, n)| r > n) {
        return Ok(SafetyVerdict::rejected(vec![
            format!("Request {request:?} exceeds maximum claim for process {process} (need {:?}).", state.need[process]),
            "The request cannot be granted.".to_string(),
        ]));
    }

    if request.iter().zip(&state.available).any(|(r, a)| r > a) {
        return Ok(SafetyVerdict::rejected(vec![
            format!("Request {request:?} from process {process} exceeds available resources {:?}.", state.available),
            format!("Process {process} must wait until resources are available."),
        ]));
    }

    let mut tentative = state.clone();
    tentative.apply(process, request);
    let verdict = check_safety(&tentative);

    let mut explanation = Vec::new();
    if verdict.is_safe {
        explanation.push(format!("Request {request:?} from process {process} can be granted."));
    } else {
        explanation.push(format!("Request {request:?} from process {process} cannot be granted."));
    }
    explanation.push(format!("Available after the tentative grant: {:?}", tentative.available));
    if let Some(sequence) = &verdict.safe_sequence {
        explanation.push(format!("The resulting state is safe. Safe sequence: {}", format_sequence(sequence)));
    } else {
        explanation.push("The resulting state would be unsafe and could lead to deadlock.".to_string());
    }
    explanation.extend(verdict.explanation);

    Ok(SafetyVerdict {
        is_safe: verdict.is_safe,
        safe_sequence: verdict.safe_sequence,
        explanation,
    })
}

fn format_sequence(sequence: &[usize]) -> String {
    sequence.iter().map(|p| format!("P{p}")).collect::<Vec<_>>().join(" -> ")
}

/// Safety-call payload: `need` wins over `max` when both are given
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankersInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<usize>,
    pub available: Vec<u32>,
    pub allocation: Vec<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<Vec<u32>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need: Option<Vec<Vec<u32>>>,
}

impl BankersInput {
    pub fn into_state(self) -> GraphResult<BankersState> {
        if let Some(processes) = self.processes {
            if processes != self.allocation.len() {
                return Err(GraphError::invalid(format!("declared {processes} processes but allocation has {} rows", self.allocation.len())));
            }
        }
        if let Some(resources) = self.resources {
            if resources != self.available.len() {
                return Err(GraphError::invalid(format!("declared {resources} resource types but available has {} entries", self.available.len())));
            }
        }

        match (self.need, self.max) {
            (Some(need), _) => BankersState::new(self.available, self.allocation, need),
            (None, Some(max)) => BankersState::from_max(self.available, self.allocation, max),
            (None, None) => Err(GraphError::invalid("either max or need must be provided")),
        }
    }
}

/// Request-admission payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionInput {
    pub state: BankersInput,
    pub process: usize,
    pub request: Vec<u32>,
}

impl AdmissionInput {
    pub fn evaluate(self) -> GraphResult<SafetyVerdict> {
        let state = self.state.into_state()?;
        request_admission(&state, self.process, &self.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Five-process textbook instance, totals [10, 5, 7]
    fn textbook() -> BankersState {
        BankersState::from_max(
            vec![3, 3, 2],
            vec![vec![0, 1, 0], vec![2, 0, 0], vec![3, 0, 2], vec![2, 1, 1], vec![0, 0, 2]],
            vec![vec![7, 5, 3], vec![3, 2, 2], vec![9, 0, 2], vec![2, 2, 2], vec![4, 3, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_need_derived_from_max() {
        let state = textbook();
        assert_eq!(state.need()[0], vec![7, 4, 3]);
        assert_eq!(state.need()[4], vec![4, 3, 1]);
    }

    #[test]
    fn test_textbook_state_is_safe() {
        let verdict = check_safety(&textbook());
        assert!(verdict.is_safe);
        assert_eq!(verdict.safe_sequence, Some(vec![1, 3, 4, 0, 2]));
        assert_eq!(verdict.explanation[1], "Initial available resources: [3, 3, 2]");
        assert_eq!(verdict.explanation.last().unwrap(), "All processes can complete. Safe sequence: P1 -> P3 -> P4 -> P0 -> P2");
    }

    #[test]
    fn test_unsafe_state() {
        let state = BankersState::new(vec![0, 0], vec![vec![1, 0], vec![0, 1]], vec![vec![0, 1], vec![1, 0]]).unwrap();
        let verdict = check_safety(&state);
        assert!(!verdict.is_safe);
        assert_eq!(verdict.safe_sequence, None);
        assert!(verdict.explanation.last().unwrap().contains("[0, 1]"));
    }

    #[test]
    fn test_admission_exceeding_claim() {
        let state = textbook();
        let before = state.clone();

        let verdict = request_admission(&state, 1, &[2, 0, 0]).unwrap();
        assert!(!verdict.is_safe);
        assert!(verdict.explanation[0].contains("exceeds maximum claim"));
        assert_eq!(state, before);
    }

    #[test]
    fn test_admission_must_wait() {
        let verdict = request_admission(&textbook(), 0, &[4, 0, 0]).unwrap();
        assert!(!verdict.is_safe);
        assert!(verdict.explanation[1].contains("must wait"));
    }

    #[test]
    fn test_admission_granted_then_committed() {
        let mut state = textbook();
        let verdict = request_admission(&state, 1, &[1, 0, 2]).unwrap();
        assert!(verdict.is_safe);
        assert!(verdict.explanation[1].contains("[2, 3, 0]"));
        assert_eq!(state.available(), &[3, 3, 2]);

        state.grant(1, &[1, 0, 2]).unwrap();
        assert_eq!(state.available(), &[2, 3, 0]);
        assert_eq!(state.allocation()[1], vec![3, 0, 2]);
        assert_eq!(state.need()[1], vec![0, 2, 0]);
    }

    #[test]
    fn test_admission_leading_to_unsafe_state() {
        let mut state = textbook();
        state.grant(1, &[1, 0, 2]).unwrap();

        // Available drops to [2, 1, 0] and no remaining need fits in it
        let verdict = request_admission(&state, 0, &[0, 2, 0]).unwrap();
        assert!(!verdict.is_safe);
        assert!(verdict.explanation[1].contains("[2, 1, 0]"));
        assert!(verdict.explanation[2].contains("unsafe"));
        assert_eq!(state.available(), &[2, 3, 0]);
    }

    #[test]
    fn test_admission_shape_errors() {
        let state = textbook();
        assert!(matches!(request_admission(&state, 9, &[0, 0, 0]), Err(GraphError::UnknownEntity { .. })));
        assert!(matches!(request_admission(&state, 0, &[0, 0]), Err(GraphError::InvalidArgument(_))));
    }

    #[test]
    fn test_allocation_overflow_is_rejected() {
        let mut state = BankersState::new(vec![1], vec![vec![u32::MAX]], vec![vec![1]]).unwrap();
        let before = state.clone();

        assert!(matches!(request_admission(&state, 0, &[1]), Err(GraphError::InvalidArgument(_))));
        assert!(matches!(state.grant(0, &[1]), Err(GraphError::InvalidArgument(_))));
        assert_eq!(state, before);
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(BankersState::new(vec![1], vec![vec![0]], vec![]).is_err());
        assert!(BankersState::new(vec![1], vec![vec![0, 0]], vec![vec![0, 0]]).is_err());
        assert!(BankersState::from_max(vec![1], vec![vec![2]], vec![vec![1]]).is_err());
    }

    #[test]
    fn test_input_payload() {
        let json = r#"{"available": [3, 3, 2], "allocation": [[0, 1, 0], [2, 0, 0]], "max": [[7, 5, 3], [3, 2, 2]]}"#;
        let input: BankersInput = serde_json::from_str(json).unwrap();
        let state = input.into_state().unwrap();
        assert_eq!(state.need()[1], vec![1, 2, 2]);

        let missing: BankersInput = serde_json::from_str(r#"{"available": [1], "allocation": [[0]]}"#).unwrap();
        assert!(missing.into_state().is_err());
    }

    #[test]
    fn test_verdict_wire_shape() {
        let verdict = check_safety(&textbook());
        let value = serde_json::to_value(&verdict).unwrap();
        assert_eq!(value["isSafe"], true);
        assert_eq!(value["safeSequence"][0], 1);
    }

    #[test]
    fn test_from_store() {
        let mut store = GraphStore::new();
        store.add_process(Some("P0")).unwrap();
        store.add_process(Some("P1")).unwrap();
        store.add_resource(Some("A"), 3).unwrap();
        store.add_resource(Some("B"), 2).unwrap();
        store.add_allocation("P0", "A", 1).unwrap();
        store.add_allocation("P1", "B", 2).unwrap();

        let claims: Matrix<String, String> = BTreeMap::from([
            ("P0".to_string(), BTreeMap::from([("A".to_string(), 2), ("B".to_string(), 1)])),
            ("P1".to_string(), BTreeMap::from([("B".to_string(), 2)])),
        ]);
        let state = BankersState::from_store(&store, &claims).unwrap();
        assert_eq!(state.available(), &[2, 0]);
        assert_eq!(state.need()[0], vec![1, 1]);

        let verdict = check_safety(&state);
        assert_eq!(verdict.safe_sequence, Some(vec![1, 0]));

        let partial: Matrix<String, String> = BTreeMap::from([("P0".to_string(), BTreeMap::new())]);
        assert!(matches!(BankersState::from_store(&store, &partial), Err(GraphError::InvalidArgument(_))));
    }
}
