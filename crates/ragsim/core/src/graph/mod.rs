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

//! Graph model: the store, its canonical encoding and its node/edge view.

pub mod shared;
pub mod snapshot;
pub mod state;
pub mod store;

pub use shared::SharedGraphStore;
pub use snapshot::{EdgeKind, GraphSnapshot, NodeKind, SnapshotEdge, SnapshotNode};
pub use state::{StoreState, decode_edge_key, encode_edge_key};
pub use store::{GraphStore, Matrix, ResourceInfo};
