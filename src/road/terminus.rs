//! Intersection actor: routes arriving vehicles onto their next road line
//!
//! Each terminus owns a table of neighboring lines, keyed by the node id at
//! the far end of each line. Vehicles arrive as `Admit` messages carrying the
//! id of the terminus they departed from; the routing policy picks a neighbor
//! and the vehicle is re-admitted into that line's actor.

use std::collections::BTreeMap;

use glam::Vec2;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::types::{ConnectionId, NodeId};
use crate::road::line::VehicleAddition;

const MAILBOX_CAPACITY: usize = 32;

/// A road line reachable from a terminus
#[derive(Debug, Clone)]
pub struct NeighborLine {
    pub line: ConnectionId,
    pub admission: mpsc::Sender<VehicleAddition>,
}

/// Messages handled by a terminus actor
#[derive(Debug)]
pub enum TerminusMessage {
    /// A vehicle finished traversing a line and arrived here
    Admit(VehicleAddition),
    /// A line now joins this terminus to `neighbor`
    RegisterLine {
        neighbor: NodeId,
        line: ConnectionId,
        admission: mpsc::Sender<VehicleAddition>,
    },
    /// The line to `neighbor` was removed
    UnregisterLine { neighbor: NodeId },
}

/// Picks where a vehicle arriving at an intersection goes next.
pub trait RoutingPolicy: Send {
    /// The neighbor to forward to, or `None` to drop the vehicle.
    ///
    /// `arrived_from` is the terminus the vehicle departed from, i.e. the far
    /// end of the line it arrived along.
    fn choose(
        &mut self,
        arrived_from: NodeId,
        neighbors: &BTreeMap<NodeId, NeighborLine>,
    ) -> Option<NodeId>;
}

/// Default routing: the lowest-id neighbor other than the one the vehicle
/// arrived from. At a dead end the vehicle bounces back the way it came.
#[derive(Debug, Default)]
pub struct BounceRouting;

impl RoutingPolicy for BounceRouting {
    fn choose(
        &mut self,
        arrived_from: NodeId,
        neighbors: &BTreeMap<NodeId, NeighborLine>,
    ) -> Option<NodeId> {
        neighbors
            .keys()
            .find(|&&neighbor| neighbor != arrived_from)
            .or_else(|| neighbors.keys().next())
            .copied()
    }
}

/// Graph node payload for a road terminus. Cheap to clone; the routing table
/// stays owned by the actor task.
#[derive(Debug, Clone)]
pub struct RoadTerminusHandle {
    pub id: NodeId,
    pub position: Vec2,
    pub mailbox: mpsc::Sender<TerminusMessage>,
    shutdown: mpsc::Sender<()>,
}

impl RoadTerminusHandle {
    /// Spawn a terminus actor with the default routing policy.
    pub fn spawn(id: NodeId, position: Vec2) -> Self {
        Self::spawn_with_policy(id, position, BounceRouting)
    }

    pub fn spawn_with_policy(
        id: NodeId,
        position: Vec2,
        policy: impl RoutingPolicy + 'static,
    ) -> Self {
        let (mailbox, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        tokio::spawn(run(id, rx, shutdown_rx, policy));
        Self {
            id,
            position,
            mailbox,
            shutdown,
        }
    }

    /// Terminate the terminus loop. Pending mailbox messages are dropped.
    pub fn shutdown(&self) {
        let _ = self.shutdown.try_send(());
    }
}

async fn run(
    id: NodeId,
    mut rx: mpsc::Receiver<TerminusMessage>,
    mut shutdown: mpsc::Receiver<()>,
    mut policy: impl RoutingPolicy,
) {
    let mut neighbors: BTreeMap<NodeId, NeighborLine> = BTreeMap::new();

    loop {
        tokio::select! {
            Some(message) = rx.recv() => match message {
                TerminusMessage::RegisterLine { neighbor, line, admission } => {
                    neighbors.insert(neighbor, NeighborLine { line, admission });
                }
                TerminusMessage::UnregisterLine { neighbor } => {
                    neighbors.remove(&neighbor);
                }
                TerminusMessage::Admit(arrival) => {
                    forward(id, arrival, &mut policy, &neighbors).await;
                }
            },
            _ = shutdown.recv() => break,
            else => break,
        }
    }
    debug!(terminus = id.0, "terminus loop exited");
}

async fn forward(
    id: NodeId,
    arrival: VehicleAddition,
    policy: &mut impl RoutingPolicy,
    neighbors: &BTreeMap<NodeId, NeighborLine>,
) {
    let Some(next) = policy.choose(arrival.source_terminus, neighbors) else {
        warn!(
            terminus = id.0,
            vehicle = arrival.vehicle_id.0,
            "no outgoing line, dropping vehicle"
        );
        return;
    };
    let Some(target) = neighbors.get(&next) else {
        warn!(
            terminus = id.0,
            neighbor = next.0,
            "routing chose an unregistered neighbor, dropping vehicle"
        );
        return;
    };

    // Re-admit with this terminus as the departure end so the line files the
    // vehicle in the right direction
    let onward = VehicleAddition {
        source_terminus: id,
        ..arrival
    };
    if target.admission.send(onward).await.is_err() {
        debug!(
            terminus = id.0,
            line = target.line.0,
            "line actor gone, dropping vehicle"
        );
    }
}
