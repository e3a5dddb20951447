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

//! Ragsim Core
//!
//! Resource-allocation graph model and deadlock analyses: request-based
//! detection, Banker's safety and request admission, cycle characterization,
//! resolution, and the feature vector consumed by an external classifier.

pub mod analysis;
pub mod error;
pub mod features;
pub mod generator;
pub mod graph;
pub mod predict;

pub use analysis::{
    AdmissionInput, BankersInput, BankersState, CycleAnalyzer, CycleReport, DeadlockDetection, DeadlockKind, Resolution, ResolutionStrategy, SafetyVerdict, analyze_cycles, analyze_snapshot, check_safety,
    detect_deadlock, request_admission, resolve,
};
pub use error::{EntityKind, GraphError, GraphResult};
pub use features::{FEATURE_COUNT, FEATURE_NAMES, FEATURE_VERSION, FeatureVector, extract_features, extract_from_snapshot};
pub use generator::{Sample, ScenarioConfig, generate_samples, generate_store};
pub use graph::{GraphSnapshot, GraphStore, ResourceInfo, SharedGraphStore, StoreState};
pub use predict::{Assessment, DeadlockPredictor, HeuristicPredictor, RiskLevel, assess};
