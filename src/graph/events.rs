//! Edit notifications fired by the graph store

use serde::{Deserialize, Serialize};

use crate::core::types::{ConnectionId, NodeId};

/// What happened to the node or connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditAction {
    Added,
    Removed,
}

/// A node was added to or removed from the store
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEdit<N> {
    pub action: EditAction,
    pub node: NodeId,
    pub payload: N,
}

/// A connection was added to or removed from the store
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEdit<C> {
    pub action: EditAction,
    pub connection: ConnectionId,
    pub first: NodeId,
    pub second: NodeId,
    pub payload: C,
}
