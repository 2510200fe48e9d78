//! Power network builder: plants, passive termini and transmission lines
//!
//! Unlike the road network, power entities have no per-entity behavior yet,
//! so graph payloads are plain values rather than actor handles. The builder
//! still keeps the spatial index and the geometry stream in sync with every
//! edit.

use glam::Vec2;
use tokio::sync::broadcast;
use tracing::info;

use crate::core::config::PowerConfig;
use crate::core::error::{GridError, Result};
use crate::core::types::{ConnectionId, NodeId, PlantKind, PlantSize};
use crate::geometry::{GeometryEvent, IdLine, IdRegion};
use crate::graph::{ConnectionStatus, Graph};
use crate::spatial::{Element, ElementFinderHandle, ElementKind};

/// A generating station
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerPlant {
    pub node: NodeId,
    pub position: Vec2,
    pub kind: PlantKind,
    pub size_class: PlantSize,
    /// Side length of the square footprint (world units)
    pub footprint: f32,
    /// Generating capacity (MW)
    pub output: u32,
}

/// A junction point where transmission lines meet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerTerminus {
    pub node: NodeId,
    pub position: Vec2,
}

/// Node payload of the power graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerNode {
    Plant(PowerPlant),
    Terminus(PowerTerminus),
}

impl PowerNode {
    pub fn position(&self) -> Vec2 {
        match self {
            PowerNode::Plant(plant) => plant.position,
            PowerNode::Terminus(terminus) => terminus.position,
        }
    }
}

/// Connection payload of the power graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLine {
    /// Transmission capacity (MW)
    pub capacity: u32,
}

/// Builder and registry for the power network. Cheap to clone.
#[derive(Clone)]
pub struct PowerGrid {
    graph: Graph<PowerNode, PowerLine>,
    finder: ElementFinderHandle,
    geometry: broadcast::Sender<GeometryEvent>,
    config: PowerConfig,
}

impl PowerGrid {
    pub fn new(
        finder: ElementFinderHandle,
        geometry: broadcast::Sender<GeometryEvent>,
        config: PowerConfig,
    ) -> Self {
        Self {
            graph: Graph::new(),
            finder,
            geometry,
            config,
        }
    }

    /// Build a transmission line, creating passive termini for the endpoints
    /// that do not already exist. Same contract as the road builder:
    /// rejections happen before anything is created.
    pub async fn add_line(
        &self,
        start: Vec2,
        end: Vec2,
        capacity: u32,
        start_node: Option<NodeId>,
        end_node: Option<NodeId>,
    ) -> Result<(NodeId, ConnectionId, NodeId)> {
        if let (Some(a), Some(b)) = (start_node, end_node) {
            if a == b {
                return Err(GridError::SelfLoop(a));
            }
            if let Some((existing, _)) = self.graph.connection_between(a, b) {
                return Err(GridError::DuplicateLine(existing));
            }
        }
        for id in [start_node, end_node].into_iter().flatten() {
            if self.graph.get_node(id).is_none() {
                return Err(GridError::NodeMissing(id));
            }
        }

        let start_id = match start_node {
            Some(id) => id,
            None => self.create_terminus(start),
        };
        let end_id = match end_node {
            Some(id) => id,
            None => self.create_terminus(end),
        };
        let start_pos = self.node_position(start_id)?;
        let end_pos = self.node_position(end_id)?;

        let line_id = match self
            .graph
            .add_connection(start_id, end_id, PowerLine { capacity })
        {
            ConnectionStatus::Success(id) => id,
            ConnectionStatus::AlreadyExists(existing) => {
                return Err(GridError::DuplicateLine(existing))
            }
            ConnectionStatus::SelfLoop => return Err(GridError::SelfLoop(start_id)),
            ConnectionStatus::NodesMissing => return Err(GridError::NodeMissing(start_id)),
        };

        let endpoints = [start_pos, end_pos];
        self.finder
            .add_element(Element::new(
                line_id.0,
                ElementKind::PowerLine,
                endpoints.to_vec(),
            ))
            .await?;
        let _ = self.geometry.send(GeometryEvent::PowerLineAdded(IdLine {
            id: line_id,
            endpoints,
        }));
        info!(
            line = line_id.0,
            start = start_id.0,
            end = end_id.0,
            "power line built"
        );
        Ok((start_id, line_id, end_id))
    }

    /// Place a generating station. Output and footprint come from the plant
    /// tables in the configuration.
    pub async fn add_plant(
        &self,
        position: Vec2,
        kind: PlantKind,
        size: PlantSize,
    ) -> Result<PowerPlant> {
        let (output, footprint) = self.config.output_and_footprint(kind, size)?;

        let node = self.graph.add_node_with(|node| {
            PowerNode::Plant(PowerPlant {
                node,
                position,
                kind,
                size_class: size,
                footprint,
                output,
            })
        });
        let PowerNode::Plant(plant) = self
            .graph
            .get_node(node)
            .ok_or(GridError::NodeMissing(node))?
        else {
            return Err(GridError::NodeMissing(node));
        };

        // The plant's connection terminal sits at its center
        self.finder
            .add_element(Element::new(
                node.0,
                ElementKind::PowerPlant,
                vec![position],
            ))
            .await?;
        let _ = self
            .geometry
            .send(GeometryEvent::PowerPlantAdded(IdRegion {
                id: node,
                center: position,
                half_extent: footprint / 2.0,
            }));
        info!(plant = node.0, ?kind, ?size, output, "power plant built");
        Ok(plant)
    }

    /// Remove the line between two nodes, if one exists.
    pub async fn delete_line(&self, first: NodeId, second: NodeId) -> Result<bool> {
        let Some((line_id, _)) = self.graph.connection_between(first, second) else {
            return Ok(false);
        };
        self.graph.delete_connection(first, second);
        self.finder
            .remove_element(line_id.0, ElementKind::PowerLine)
            .await?;
        let _ = self
            .geometry
            .send(GeometryEvent::PowerLineRemoved(line_id));
        Ok(true)
    }

    /// Remove a plant and every line connected to it.
    pub async fn delete_plant(&self, node: NodeId) -> Result<bool> {
        match self.graph.get_node(node) {
            Some(PowerNode::Plant(_)) => {}
            _ => return Ok(false),
        }
        // Severed lines leave the spatial index with the plant
        for (_, line) in self.graph.neighbors(node) {
            self.finder
                .remove_element(line.0, ElementKind::PowerLine)
                .await?;
            let _ = self.geometry.send(GeometryEvent::PowerLineRemoved(line));
        }
        self.graph.delete_node(node);
        self.finder
            .remove_element(node.0, ElementKind::PowerPlant)
            .await?;
        let _ = self
            .geometry
            .send(GeometryEvent::PowerPlantRemoved(node));
        Ok(true)
    }

    /// Construction cost for a plant kind, for editor previews.
    pub fn plant_cost(&self, kind: PlantKind) -> Result<f32> {
        self.config.cost(kind)
    }

    pub fn node(&self, id: NodeId) -> Option<PowerNode> {
        self.graph.get_node(id)
    }

    pub fn line(&self, id: ConnectionId) -> Option<PowerLine> {
        self.graph.get_connection(id)
    }

    pub fn graph(&self) -> &Graph<PowerNode, PowerLine> {
        &self.graph
    }

    fn create_terminus(&self, position: Vec2) -> NodeId {
        self.graph
            .add_node_with(|node| PowerNode::Terminus(PowerTerminus { node, position }))
    }

    fn node_position(&self, id: NodeId) -> Result<Vec2> {
        self.graph
            .get_node(id)
            .map(|node| node.position())
            .ok_or(GridError::NodeMissing(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> (PowerGrid, broadcast::Receiver<GeometryEvent>) {
        let (geometry, geometry_rx) = broadcast::channel(64);
        let grid = PowerGrid::new(
            ElementFinderHandle::spawn(),
            geometry,
            PowerConfig::default(),
        );
        (grid, geometry_rx)
    }

    #[tokio::test]
    async fn test_add_line_creates_passive_termini() {
        let (grid, mut geometry) = grid();
        let (start, line, end) = grid
            .add_line(Vec2::ZERO, Vec2::new(60.0, 0.0), 250, None, None)
            .await
            .unwrap();

        assert!(matches!(
            grid.node(start),
            Some(PowerNode::Terminus(t)) if t.position == Vec2::ZERO
        ));
        assert!(matches!(grid.node(end), Some(PowerNode::Terminus(_))));
        assert_eq!(grid.line(line), Some(PowerLine { capacity: 250 }));
        assert!(matches!(
            geometry.recv().await.unwrap(),
            GeometryEvent::PowerLineAdded(_)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_power_line_rejected() {
        let (grid, _geometry) = grid();
        let (start, line, end) = grid
            .add_line(Vec2::ZERO, Vec2::new(60.0, 0.0), 250, None, None)
            .await
            .unwrap();

        let duplicate = grid
            .add_line(Vec2::ZERO, Vec2::ZERO, 999, Some(end), Some(start))
            .await;
        assert!(matches!(duplicate, Err(GridError::DuplicateLine(id)) if id == line));
        // Existing capacity untouched
        assert_eq!(grid.line(line), Some(PowerLine { capacity: 250 }));
    }

    #[tokio::test]
    async fn test_add_plant_uses_config_tables() {
        let (grid, mut geometry) = grid();
        let plant = grid
            .add_plant(Vec2::new(10.0, 10.0), PlantKind::Nuclear, PlantSize::Large)
            .await
            .unwrap();

        assert_eq!(plant.output, 4_000);
        assert_eq!(plant.kind, PlantKind::Nuclear);
        assert!(matches!(
            geometry.recv().await.unwrap(),
            GeometryEvent::PowerPlantAdded(region)
                if region.id == plant.node && region.half_extent == plant.footprint / 2.0
        ));
    }

    #[tokio::test]
    async fn test_plant_connects_to_line() {
        let (grid, _geometry) = grid();
        let plant = grid
            .add_plant(Vec2::ZERO, PlantKind::Solar, PlantSize::Small)
            .await
            .unwrap();
        let (start, _, end) = grid
            .add_line(
                Vec2::ZERO,
                Vec2::new(40.0, 0.0),
                100,
                Some(plant.node),
                None,
            )
            .await
            .unwrap();

        assert_eq!(start, plant.node);
        assert_eq!(grid.graph().neighbors(plant.node).len(), 1);
        assert!(matches!(grid.node(end), Some(PowerNode::Terminus(_))));
    }

    #[tokio::test]
    async fn test_delete_plant_severs_lines() {
        let (grid, _geometry) = grid();
        let plant = grid
            .add_plant(Vec2::ZERO, PlantKind::Coal, PlantSize::Small)
            .await
            .unwrap();
        grid.add_line(
            Vec2::ZERO,
            Vec2::new(40.0, 0.0),
            100,
            Some(plant.node),
            None,
        )
        .await
        .unwrap();

        assert!(grid.delete_plant(plant.node).await.unwrap());
        assert_eq!(grid.graph().connection_count(), 0);
        assert!(grid.node(plant.node).is_none());

        // Not a plant, or already gone
        assert!(!grid.delete_plant(plant.node).await.unwrap());
    }
}
