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

//! Lock-guarded store for callers that share one graph between threads.
//!
//! Analyses always run on a cloned snapshot taken under the read lock, and
//! multi-step edits go through [`SharedGraphStore::transaction`], which works
//! on a copy and swaps it in only when every step succeeded.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::store::GraphStore;
use crate::error::GraphResult;

#[derive(Debug, Clone, Default)]
pub struct SharedGraphStore {
    inner: Arc<RwLock<GraphStore>>,
}

impl SharedGraphStore {
    pub fn new(store: GraphStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Clone the current state for analysis
    pub fn snapshot(&self) -> GraphStore {
        self.inner.read().clone()
    }

    /// Run a read-only closure against the current state
    pub fn read<T>(&self, f: impl FnOnce(&GraphStore) -> T) -> T {
        f(&self.inner.read())
    }

    /// Apply `f` to a copy of the store and commit the copy only if `f` succeeds
    pub fn transaction<T>(&self, f: impl FnOnce(&mut GraphStore) -> GraphResult<T>) -> GraphResult<T> {
        let mut guard = self.inner.write();
        let mut working = guard.clone();
        match f(&mut working) {
            Ok(value) => {
                *guard = working;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "discarding failed graph transaction");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;

    #[test]
    fn test_transaction_commits_on_success() {
        let shared = SharedGraphStore::default();
        shared
            .transaction(|store| {
                store.add_process(Some("P1"))?;
                store.add_resource(Some("R1"), 1)?;
                store.add_allocation("P1", "R1", 1)
            })
            .unwrap();

        assert_eq!(shared.read(|store| store.allocation("P1", "R1")), 1);
    }

    #[test]
    fn test_transaction_discards_on_failure() {
        let shared = SharedGraphStore::default();
        let result = shared.transaction(|store| {
            store.add_process(Some("P1"))?;
            store.add_resource(Some("R1"), 1)?;
            store.add_allocation("P1", "R1", 2)
        });

        assert!(matches!(result, Err(GraphError::InsufficientInstances { .. })));
        assert!(shared.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_writers() {
        let shared = SharedGraphStore::default();
        shared.transaction(|store| store.add_resource(Some("R1"), 64).map(|_| ())).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    shared
                        .transaction(|store| {
                            let id = format!("T{i}");
                            store.add_process(Some(&id))?;
                            store.add_allocation(&id, "R1", 8)
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = shared.snapshot();
        assert_eq!(store.resource("R1").unwrap().available, 0);
        store.check_invariants().unwrap();
    }
}
