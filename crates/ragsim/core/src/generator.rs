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

//! Random scenario generation for classifier training data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::detect_deadlock;
use crate::error::{GraphError, GraphResult};
use crate::features::{FeatureVector, extract_features};
use crate::graph::GraphStore;

/// Bounds for randomly generated graphs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub min_processes: usize,
    pub max_processes: usize,
    pub min_resources: usize,
    pub max_resources: usize,
    /// Upper bound on instances per resource
    pub max_instances: u32,
    /// Upper bound on a single request edge
    pub max_request: u32,
    /// Chance of drawing each candidate allocation and request edge
    pub edge_probability: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            min_processes: 2,
            max_processes: 10,
            min_resources: 1,
            max_resources: 5,
            max_instances: 10,
            max_request: 3,
            edge_probability: 0.5,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> GraphResult<()> {
        if self.min_processes > self.max_processes {
            return Err(GraphError::invalid(format!("min_processes {} exceeds max_processes {}", self.min_processes, self.max_processes)));
        }
        if self.min_resources > self.max_resources {
            return Err(GraphError::invalid(format!("min_resources {} exceeds max_resources {}", self.min_resources, self.max_resources)));
        }
        if self.max_instances < 1 || self.max_request < 1 {
            return Err(GraphError::invalid("max_instances and max_request must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.edge_probability) {
            return Err(GraphError::invalid(format!("edge_probability {} is outside [0, 1]", self.edge_probability)));
        }
        Ok(())
    }
}

/// One labelled training sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub features: FeatureVector,
    pub deadlock_percentage: f64,
}

/// Build a random graph named `P0..`, `R0..`
///
/// Allocations never exceed availability; requests are unconstrained.
pub fn generate_store<G: Rng + ?Sized>(rng: &mut G, config: &ScenarioConfig) -> GraphResult<GraphStore> {
    config.validate()?;

    let mut store = GraphStore::new();
    let process_count = rng.gen_range(config.min_processes..=config.max_processes);
    let resource_count = rng.gen_range(config.min_resources..=config.max_resources);

    let processes: Vec<String> = (0..process_count).map(|i| format!("P{i}")).collect();
    let resources: Vec<String> = (0..resource_count).map(|i| format!("R{i}")).collect();

    for process in &processes {
        store.add_process(Some(process.as_str()))?;
    }
    for resource in &resources {
        store.add_resource(Some(resource.as_str()), rng.gen_range(1..=config.max_instances))?;
    }

    for process in &processes {
        for resource in &resources {
            if rng.gen_bool(config.edge_probability) {
                let available = store.resource(resource).map_or(0, |info| info.available);
                if available > 0 {
                    store.add_allocation(process, resource, rng.gen_range(1..=available))?;
                }
            }
            if rng.gen_bool(config.edge_probability) {
                store.add_request(process, resource, rng.gen_range(1..=config.max_request))?;
            }
        }
    }

    Ok(store)
}

/// Generate `count` samples reproducibly from `seed`
pub fn generate_samples(seed: u64, count: usize, config: &ScenarioConfig) -> GraphResult<Vec<Sample>> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        let store = generate_store(&mut rng, config)?;
        samples.push(Sample {
            features: extract_features(&store),
            deadlock_percentage: detect_deadlock(&store).deadlock_percentage,
        });
    }

    debug!(seed, count, "generated samples");
    Ok(samples)
}
