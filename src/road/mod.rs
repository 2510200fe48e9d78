//! Road network builder: termini, simulated road lines, procedural growth
//!
//! `RoadGrid` owns the road graph and the channels its actors communicate
//! over. Every terminus is a running actor routing vehicles between lines;
//! every line is a running actor carrying vehicles across the segment. The
//! grid wires new actors to the clock, the spatial index and the geometry
//! stream as they are created.

pub mod infinite;
pub mod line;
pub mod terminus;

use glam::Vec2;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

use crate::core::error::{GridError, Result};
use crate::core::time::Clock;
use crate::core::types::{ConnectionId, NodeId};
use crate::geometry::{GeometryEvent, IdLine, IdPoint};
use crate::graph::{ConnectionStatus, Graph};
use crate::spatial::{Element, ElementFinderHandle, ElementKind};
use crate::vehicle::VehicleUpdate;

pub use line::{VehicleAddition, ADMISSION_EPSILON, PROGRESS_PER_TICK};
pub use terminus::{
    BounceRouting, NeighborLine, RoadTerminusHandle, RoutingPolicy, TerminusMessage,
};

/// Graph connection payload for a road line. Cheap to clone; vehicle state
/// stays owned by the line's actor task.
#[derive(Debug, Clone)]
pub struct RoadLineHandle {
    pub id: ConnectionId,
    pub capacity: u32,
    pub admission: mpsc::Sender<VehicleAddition>,
    shutdown: mpsc::Sender<()>,
}

impl RoadLineHandle {
    /// Terminate the line actor. Vehicles still on the line are dropped.
    pub fn shutdown(&self) {
        let _ = self.shutdown.try_send(());
    }
}

/// Builder and registry for the road network. Cheap to clone; all clones
/// share one graph, one finder and one set of event streams.
#[derive(Clone)]
pub struct RoadGrid {
    graph: Graph<RoadTerminusHandle, RoadLineHandle>,
    finder: ElementFinderHandle,
    geometry: broadcast::Sender<GeometryEvent>,
    updates: broadcast::Sender<VehicleUpdate>,
    clock: Clock,
}

impl RoadGrid {
    pub fn new(
        clock: Clock,
        finder: ElementFinderHandle,
        geometry: broadcast::Sender<GeometryEvent>,
        updates: broadcast::Sender<VehicleUpdate>,
    ) -> Self {
        Self {
            graph: Graph::new(),
            finder,
            geometry,
            updates,
            clock,
        }
    }

    /// Build a road line, creating termini for the endpoints that do not
    /// already exist.
    ///
    /// `start_node`/`end_node` name existing termini to connect to; `None`
    /// spawns a fresh terminus at the corresponding position. Returns the
    /// resolved endpoint ids and the new line's id. Rejections (self-loop,
    /// duplicate line, stale node id) happen before anything is created.
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
        // Validate named endpoints before creating anything, so a stale id
        // cannot leave a half-built line behind
        for id in [start_node, end_node].into_iter().flatten() {
            if self.graph.get_node(id).is_none() {
                return Err(GridError::NodeMissing(id));
            }
        }

        let start_handle = match start_node {
            Some(id) => self.graph.get_node(id).ok_or(GridError::NodeMissing(id))?,
            None => self.create_terminus(start).await?,
        };
        let end_handle = match end_node {
            Some(id) => self.graph.get_node(id).ok_or(GridError::NodeMissing(id))?,
            None => self.create_terminus(end).await?,
        };

        // Canonical travel direction: low terminus = smaller node id
        let (low, high) = if start_handle.id < end_handle.id {
            (&start_handle, &end_handle)
        } else {
            (&end_handle, &start_handle)
        };

        let clock = &self.clock;
        let updates = &self.updates;
        let status = self
            .graph
            .add_connection_with(start_handle.id, end_handle.id, |id| {
                let (admission, shutdown) = line::spawn(
                    id,
                    low.id,
                    high.id,
                    low.mailbox.clone(),
                    high.mailbox.clone(),
                    clock.subscribe(),
                    updates.clone(),
                );
                RoadLineHandle {
                    id,
                    capacity,
                    admission,
                    shutdown,
                }
            });
        let line_id = match status {
            ConnectionStatus::Success(id) => id,
            ConnectionStatus::AlreadyExists(existing) => {
                return Err(GridError::DuplicateLine(existing))
            }
            ConnectionStatus::SelfLoop => return Err(GridError::SelfLoop(start_handle.id)),
            ConnectionStatus::NodesMissing => return Err(GridError::NodeMissing(start_handle.id)),
        };
        let handle = self
            .graph
            .get_connection(line_id)
            .ok_or(GridError::NodeMissing(start_handle.id))?;

        // Wire the line into both routing tables, keyed by the far end
        self.register_line(&start_handle, end_handle.id, &handle)
            .await?;
        self.register_line(&end_handle, start_handle.id, &handle)
            .await?;

        let endpoints = [start_handle.position, end_handle.position];
        self.finder
            .add_element(Element::new(
                line_id.0,
                ElementKind::RoadLine,
                endpoints.to_vec(),
            ))
            .await?;
        let _ = self.geometry.send(GeometryEvent::RoadLineAdded(IdLine {
            id: line_id,
            endpoints,
        }));
        info!(
            line = line_id.0,
            start = start_handle.id.0,
            end = end_handle.id.0,
            "road line built"
        );
        Ok((start_handle.id, line_id, end_handle.id))
    }

    /// Remove the line between two termini, if one exists. The line actor is
    /// signaled to stop and both routing tables forget it.
    pub async fn delete_line(&self, first: NodeId, second: NodeId) -> Result<bool> {
        let Some((line_id, handle)) = self.graph.connection_between(first, second) else {
            return Ok(false);
        };
        handle.shutdown();

        if let Some(terminus) = self.graph.get_node(first) {
            let _ = terminus
                .mailbox
                .send(TerminusMessage::UnregisterLine { neighbor: second })
                .await;
        }
        if let Some(terminus) = self.graph.get_node(second) {
            let _ = terminus
                .mailbox
                .send(TerminusMessage::UnregisterLine { neighbor: first })
                .await;
        }

        self.graph.delete_connection(first, second);
        self.finder
            .remove_element(line_id.0, ElementKind::RoadLine)
            .await?;
        let _ = self
            .geometry
            .send(GeometryEvent::RoadLineRemoved(line_id));
        Ok(true)
    }

    /// The terminus handle for a node id, if it still exists.
    pub fn terminus(&self, id: NodeId) -> Option<RoadTerminusHandle> {
        self.graph.get_node(id)
    }

    /// The line handle for a connection id, if it still exists.
    pub fn line(&self, id: ConnectionId) -> Option<RoadLineHandle> {
        self.graph.get_connection(id)
    }

    pub fn graph(&self) -> &Graph<RoadTerminusHandle, RoadLineHandle> {
        &self.graph
    }

    /// Subscribe to vehicle position updates from every road line.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<VehicleUpdate> {
        self.updates.subscribe()
    }

    /// The clock road lines advance with.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    async fn create_terminus(&self, position: Vec2) -> Result<RoadTerminusHandle> {
        let id = self
            .graph
            .add_node_with(|id| RoadTerminusHandle::spawn(id, position));
        let handle = self.graph.get_node(id).ok_or(GridError::NodeMissing(id))?;

        self.finder
            .add_element(Element::new(
                id.0,
                ElementKind::RoadTerminus,
                vec![position],
            ))
            .await?;
        let _ = self
            .geometry
            .send(GeometryEvent::RoadTerminusAdded(IdPoint {
                id,
                point: position,
            }));
        Ok(handle)
    }

    async fn register_line(
        &self,
        terminus: &RoadTerminusHandle,
        neighbor: NodeId,
        handle: &RoadLineHandle,
    ) -> Result<()> {
        terminus
            .mailbox
            .send(TerminusMessage::RegisterLine {
                neighbor,
                line: handle.id,
                admission: handle.admission.clone(),
            })
            .await
            .map_err(|_| GridError::ChannelClosed("road terminus"))
    }
}
