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

//! Error types shared by the graph store and the analyses.

/// Kind of entity referenced by an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Process,
    Resource,
    Node,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Process => write!(f, "Process"),
            EntityKind::Resource => write!(f, "Resource"),
            EntityKind::Node => write!(f, "Node"),
        }
    }
}

/// Errors raised by graph mutations and analysis inputs.
///
/// Every operation validates before it applies, so receiving one of these
/// means the target state was left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("{kind} {id} already exists")]
    DuplicateEntity { kind: EntityKind, id: String },

    #[error("{kind} {id} does not exist")]
    UnknownEntity { kind: EntityKind, id: String },

    #[error("Not enough instances available ({available}) in {resource} to allocate {requested}")]
    InsufficientInstances { resource: String, requested: u32, available: u32 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid edge direction: {0}")]
    InvalidEdgeDirection(String),

    #[error("Malformed state: {0}")]
    MalformedState(String),
}

impl GraphError {
    pub(crate) fn duplicate(kind: EntityKind, id: impl Into<String>) -> Self {
        GraphError::DuplicateEntity { kind, id: id.into() }
    }

    pub(crate) fn unknown(kind: EntityKind, id: impl Into<String>) -> Self {
        GraphError::UnknownEntity { kind, id: id.into() }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        GraphError::InvalidArgument(msg.into())
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        GraphError::MalformedState(msg.into())
    }
}

/// Result type for graph operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;
