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

//! Deadlock analyses over graph snapshots.
//!
//! Request-based detection ([`detect_deadlock`]) and the Banker's safety check
//! ([`check_safety`]) share the reduction in [`reducibility`] but answer
//! different questions, so they are kept as separate operations.

pub mod cycle;
pub mod detection;
pub mod reducibility;
pub mod resolution;
pub mod safety;

pub use cycle::{CycleAnalyzer, CycleReport, DeadlockKind, analyze_cycles, analyze_snapshot};
pub use detection::{DeadlockDetection, detect_deadlock};
pub use reducibility::{Reduction, ReductionStep, reduce};
pub use resolution::{Resolution, ResolutionStrategy, resolve};
pub use safety::{AdmissionInput, BankersInput, BankersState, SafetyVerdict, check_safety, request_admission};
