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

//! Deadlock risk assessment.
//!
//! A trained classifier lives outside this crate; [`DeadlockPredictor`] is the
//! seam it plugs into. [`HeuristicPredictor`] is the built-in fallback.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::analysis::CycleAnalyzer;
use crate::error::{GraphError, GraphResult};
use crate::features::{FeatureVector, extract_features};
use crate::graph::GraphStore;

/// Estimates the probability that a graph is deadlocked
#[cfg_attr(test, mockall::automock)]
pub trait DeadlockPredictor {
    /// Probability in `[0, 1]`
    fn predict(&self, features: &FeatureVector, cycle_count: usize) -> f64;
}

/// Scores cycles, high utilization and graph size
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPredictor;

impl HeuristicPredictor {
    const CYCLE_WEIGHT: f64 = 0.7;
    const UTILIZATION_WEIGHT: f64 = 0.2;
    const UTILIZATION_THRESHOLD: f64 = 0.8;
    const SIZE_WEIGHT_CAP: f64 = 0.1;
}

impl DeadlockPredictor for HeuristicPredictor {
    fn predict(&self, features: &FeatureVector, cycle_count: usize) -> f64 {
        let mut score = 0.0;
        if cycle_count > 0 {
            score += Self::CYCLE_WEIGHT;
        }
        if features.mean_resource_utilization > Self::UTILIZATION_THRESHOLD {
            score += Self::UTILIZATION_WEIGHT;
        }
        score += ((features.process_count + features.resource_count) / 100.0).min(Self::SIZE_WEIGHT_CAP);
        score.min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.7 {
            RiskLevel::High
        } else if probability > 0.3 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Risk assessment of one graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub probability: f64,
    pub risk: RiskLevel,
    pub features: FeatureVector,
    pub explanation: String,
}

/// Assess deadlock risk of `store` with `predictor`
///
/// Fails with `InvalidArgument` if the predictor returns a value outside `[0, 1]`.
pub fn assess(store: &GraphStore, predictor: &dyn DeadlockPredictor) -> GraphResult<Assessment> {
    let features = extract_features(store);
    let cycle_count = CycleAnalyzer::new(store).simple_cycles().len();
    let probability = predictor.predict(&features, cycle_count);

    if !(0.0..=1.0).contains(&probability) {
        return Err(GraphError::invalid(format!("predictor returned probability {probability} outside [0, 1]")));
    }

    let risk = RiskLevel::from_probability(probability);
    let explanation = match risk {
        RiskLevel::High => format!("High risk of deadlock ({:.0}%). The graph contains {cycle_count} cycle(s).", probability * 100.0),
        RiskLevel::Moderate => format!("Moderate risk of deadlock ({:.0}%). Monitor resource usage.", probability * 100.0),
        RiskLevel::Low => format!("Low risk of deadlock ({:.0}%).", probability * 100.0),
    };
    debug!(probability, %risk, cycle_count, "assessed deadlock risk");

    Ok(Assessment {
        probability,
        risk,
        features,
        explanation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;

    fn circular_wait() -> GraphStore {
        let mut store = GraphStore::new();
        store.add_process(Some("P0")).unwrap();
        store.add_process(Some("P1")).unwrap();
        store.add_resource(Some("R0"), 1).unwrap();
        store.add_resource(Some("R1"), 1).unwrap();
        store.add_allocation("P0", "R0", 1).unwrap();
        store.add_allocation("P1", "R1", 1).unwrap();
        store.add_request("P0", "R1", 1).unwrap();
        store.add_request("P1", "R0", 1).unwrap();
        store
    }

    #[test]
    fn test_heuristic_scores_cycles_and_utilization() {
        let assessment = assess(&circular_wait(), &HeuristicPredictor).unwrap();
        // 0.7 cycle + 0.2 utilization + 0.04 size
        assert!((assessment.probability - 0.94).abs() < 1e-9);
        assert_eq!(assessment.risk, RiskLevel::High);
    }

    #[test]
    fn test_heuristic_empty_graph_is_low_risk() {
        let assessment = assess(&GraphStore::new(), &HeuristicPredictor).unwrap();
        assert_eq!(assessment.probability, 0.0);
        assert_eq!(assessment.risk, RiskLevel::Low);
    }

    #[test]
    fn test_heuristic_is_capped() {
        let features = FeatureVector {
            process_count: 500.0,
            resource_count: 500.0,
            mean_resource_utilization: 1.0,
            ..FeatureVector::default()
        };
        assert_eq!(HeuristicPredictor.predict(&features, 3), 1.0);
    }

    #[test]
    fn test_assess_passes_cycle_count_to_predictor() {
        let mut predictor = MockDeadlockPredictor::new();
        predictor.expect_predict().with(always(), eq(1)).times(1).returning(|_, _| 0.5);

        let assessment = assess(&circular_wait(), &predictor).unwrap();
        assert_eq!(assessment.risk, RiskLevel::Moderate);
        assert_eq!(assessment.features.process_count, 2.0);
    }

    #[test]
    fn test_assess_rejects_out_of_range_probability() {
        let mut predictor = MockDeadlockPredictor::new();
        predictor.expect_predict().returning(|_, _| 1.5);

        let err = assess(&GraphStore::new(), &predictor).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(RiskLevel::from_probability(0.3), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.31), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(0.7), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(0.71), RiskLevel::High);
    }
}
