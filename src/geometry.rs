//! Geometry DTOs published to rendering collaborators
//!
//! The renderer is out of scope; these events are its entire view of the
//! infrastructure. Everything is broadcast on a single channel so a renderer
//! can subscribe once and draw whatever the builders create or remove.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::{ConnectionId, NodeId};

/// A point entity (road terminus)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdPoint {
    pub id: NodeId,
    pub point: Vec2,
}

/// A line entity (power or road line) with its two endpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdLine {
    pub id: ConnectionId,
    pub endpoints: [Vec2; 2],
}

/// A square region entity (power plant footprint)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdRegion {
    pub id: NodeId,
    pub center: Vec2,
    pub half_extent: f32,
}

/// Creation/removal events for everything the builders place on the board
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GeometryEvent {
    PowerLineAdded(IdLine),
    PowerLineRemoved(ConnectionId),
    PowerPlantAdded(IdRegion),
    PowerPlantRemoved(NodeId),
    RoadLineAdded(IdLine),
    RoadLineRemoved(ConnectionId),
    RoadTerminusAdded(IdPoint),
}
