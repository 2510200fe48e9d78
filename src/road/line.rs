//! Road segment actor: advances vehicles each tick and hands them off
//!
//! A line actor owns two sets of traveling vehicles, one per direction.
//! Direction is canonical: the low terminus is the endpoint with the smaller
//! node id. A vehicle admitted from the low end travels low-to-high and its
//! broadcast position is positive; the opposite direction is negative. When a
//! vehicle's progress reaches 1.0 it leaves the line exactly once, delivered
//! to the far terminus's mailbox.

use ahash::AHashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::core::time::Tick;
use crate::core::types::{ConnectionId, NodeId, VehicleId};
use crate::road::terminus::TerminusMessage;
use crate::vehicle::{Vehicle, VehicleUpdate};

const MAILBOX_CAPACITY: usize = 32;

/// Fraction of the segment covered per tick at nominal speed
pub const PROGRESS_PER_TICK: f32 = 0.05;

/// Magnitude of the position update emitted on admission, before the first
/// tick moves the vehicle. Nonzero so the sign already shows the direction.
pub const ADMISSION_EPSILON: f32 = 0.001;

/// A vehicle entering a road line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleAddition {
    pub vehicle_id: VehicleId,
    pub vehicle: Vehicle,
    /// Terminus the vehicle departs from (an endpoint of the line)
    pub source_terminus: NodeId,
    /// Nominal speed, carried with the vehicle across handoffs. Progress
    /// itself advances by the fixed per-tick increment.
    pub speed: f32,
}

#[derive(Debug, Clone, Copy)]
struct ProgressingVehicle {
    vehicle: Vehicle,
    speed: f32,
    percent: f32,
}

struct RoadLine {
    id: ConnectionId,
    low: NodeId,
    high: NodeId,
    low_mailbox: mpsc::Sender<TerminusMessage>,
    high_mailbox: mpsc::Sender<TerminusMessage>,
    low_to_high: AHashMap<VehicleId, ProgressingVehicle>,
    high_to_low: AHashMap<VehicleId, ProgressingVehicle>,
    updates: broadcast::Sender<VehicleUpdate>,
}

/// Spawn a road line actor between two termini.
///
/// `low`/`high` must be the smaller and larger endpoint node ids. Returns the
/// line's admission channel and its shutdown channel.
pub fn spawn(
    id: ConnectionId,
    low: NodeId,
    high: NodeId,
    low_mailbox: mpsc::Sender<TerminusMessage>,
    high_mailbox: mpsc::Sender<TerminusMessage>,
    ticks: broadcast::Receiver<Tick>,
    updates: broadcast::Sender<VehicleUpdate>,
) -> (mpsc::Sender<VehicleAddition>, mpsc::Sender<()>) {
    debug_assert!(low < high);
    let (admission, admission_rx) = mpsc::channel(MAILBOX_CAPACITY);
    let (shutdown, shutdown_rx) = mpsc::channel(1);

    let line = RoadLine {
        id,
        low,
        high,
        low_mailbox,
        high_mailbox,
        low_to_high: AHashMap::new(),
        high_to_low: AHashMap::new(),
        updates,
    };
    tokio::spawn(line.run(admission_rx, ticks, shutdown_rx));
    (admission, shutdown)
}

impl RoadLine {
    async fn run(
        mut self,
        mut admissions: mpsc::Receiver<VehicleAddition>,
        mut ticks: broadcast::Receiver<Tick>,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                Some(addition) = admissions.recv() => self.admit(addition),
                tick = ticks.recv() => match tick {
                    Ok(_) => self.advance().await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(line = self.id.0, missed, "tick stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.recv() => break,
                else => break,
            }
        }
        debug!(line = self.id.0, "road line loop exited");
    }

    fn admit(&mut self, addition: VehicleAddition) {
        let entering = ProgressingVehicle {
            vehicle: addition.vehicle,
            speed: addition.speed,
            percent: 0.0,
        };
        let travel = if addition.source_terminus == self.low {
            self.low_to_high.insert(addition.vehicle_id, entering);
            ADMISSION_EPSILON
        } else {
            self.high_to_low.insert(addition.vehicle_id, entering);
            -ADMISSION_EPSILON
        };
        let _ = self.updates.send(VehicleUpdate {
            id: addition.vehicle_id,
            road: self.id,
            travel,
            vehicle_length: addition.vehicle.length,
        });
    }

    async fn advance(&mut self) {
        let arrived_high = step(&mut self.low_to_high, 1.0, self.id, &self.updates);
        let arrived_low = step(&mut self.high_to_low, -1.0, self.id, &self.updates);

        for (vehicle_id, progressing) in arrived_high {
            self.hand_off(vehicle_id, progressing, self.low, &self.high_mailbox)
                .await;
        }
        for (vehicle_id, progressing) in arrived_low {
            self.hand_off(vehicle_id, progressing, self.high, &self.low_mailbox)
                .await;
        }
    }

    /// Deliver a finished vehicle to the far terminus. `from` is the end the
    /// vehicle entered through, so the terminus knows which line it came by.
    async fn hand_off(
        &self,
        vehicle_id: VehicleId,
        progressing: ProgressingVehicle,
        from: NodeId,
        target: &mpsc::Sender<TerminusMessage>,
    ) {
        let arrival = VehicleAddition {
            vehicle_id,
            vehicle: progressing.vehicle,
            source_terminus: from,
            speed: progressing.speed,
        };
        if target.send(TerminusMessage::Admit(arrival)).await.is_err() {
            debug!(
                line = self.id.0,
                vehicle = vehicle_id.0,
                "terminus gone, dropping vehicle"
            );
        }
    }
}

/// Advance one direction by a tick. Vehicles that reach the far end are
/// removed and returned; the rest broadcast their new signed position.
fn step(
    vehicles: &mut AHashMap<VehicleId, ProgressingVehicle>,
    sign: f32,
    road: ConnectionId,
    updates: &broadcast::Sender<VehicleUpdate>,
) -> Vec<(VehicleId, ProgressingVehicle)> {
    let mut arrived = Vec::new();
    vehicles.retain(|&vehicle_id, progressing| {
        progressing.percent += PROGRESS_PER_TICK;
        if progressing.percent >= 1.0 {
            arrived.push((vehicle_id, *progressing));
            return false;
        }
        let _ = updates.send(VehicleUpdate {
            id: vehicle_id,
            road,
            travel: sign * progressing.percent,
            vehicle_length: progressing.vehicle.length,
        });
        true
    });
    arrived
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rig {
        clock: broadcast::Sender<Tick>,
        updates: broadcast::Receiver<VehicleUpdate>,
        low_rx: mpsc::Receiver<TerminusMessage>,
        high_rx: mpsc::Receiver<TerminusMessage>,
        admission: mpsc::Sender<VehicleAddition>,
        _shutdown: mpsc::Sender<()>,
    }

    fn rig() -> Rig {
        let (clock, ticks) = broadcast::channel(64);
        let (updates_tx, updates) = broadcast::channel(64);
        let (low_mailbox, low_rx) = mpsc::channel(64);
        let (high_mailbox, high_rx) = mpsc::channel(64);
        let (admission, shutdown) = spawn(
            ConnectionId(0),
            NodeId(0),
            NodeId(1),
            low_mailbox,
            high_mailbox,
            ticks,
            updates_tx,
        );
        Rig {
            clock,
            updates,
            low_rx,
            high_rx,
            admission,
            _shutdown: shutdown,
        }
    }

    fn addition(source: NodeId) -> VehicleAddition {
        VehicleAddition {
            vehicle_id: VehicleId(1),
            vehicle: Vehicle { length: 4.6 },
            source_terminus: source,
            speed: PROGRESS_PER_TICK,
        }
    }

    #[tokio::test]
    async fn test_low_admission_emits_positive_epsilon() {
        let mut rig = rig();
        rig.admission.send(addition(NodeId(0))).await.unwrap();

        let update = rig.updates.recv().await.unwrap();
        assert_eq!(update.id, VehicleId(1));
        assert_eq!(update.road, ConnectionId(0));
        assert_eq!(update.travel, ADMISSION_EPSILON);
    }

    #[tokio::test]
    async fn test_high_admission_emits_negative_epsilon() {
        let mut rig = rig();
        rig.admission.send(addition(NodeId(1))).await.unwrap();

        let update = rig.updates.recv().await.unwrap();
        assert_eq!(update.travel, -ADMISSION_EPSILON);
    }

    #[tokio::test]
    async fn test_full_traversal_hands_off_exactly_once() {
        let mut rig = rig();
        rig.admission.send(addition(NodeId(0))).await.unwrap();
        rig.updates.recv().await.unwrap();

        // 19 ticks of 0.05 keep the vehicle on the line, each with a
        // positive position update
        for i in 1..20u32 {
            rig.clock.send(i as Tick).unwrap();
            let update = rig.updates.recv().await.unwrap();
            let expected = PROGRESS_PER_TICK * i as f32;
            assert!((update.travel - expected).abs() < 1e-4);
            assert!(update.travel > 0.0);
        }

        // Tick 20 reaches 1.0: no update, one arrival at the high end
        rig.clock.send(20).unwrap();
        let TerminusMessage::Admit(arrival) = rig.high_rx.recv().await.unwrap() else {
            panic!("expected an admit message");
        };
        assert_eq!(arrival.vehicle_id, VehicleId(1));
        assert_eq!(arrival.source_terminus, NodeId(0));

        assert!(rig.low_rx.try_recv().is_err());
        assert!(rig.updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_high_to_low_traversal_arrives_at_low_end() {
        let mut rig = rig();
        rig.admission.send(addition(NodeId(1))).await.unwrap();
        rig.updates.recv().await.unwrap();

        for i in 1..20u32 {
            rig.clock.send(i as Tick).unwrap();
            let update = rig.updates.recv().await.unwrap();
            assert!(update.travel < 0.0);
        }

        rig.clock.send(20).unwrap();
        let TerminusMessage::Admit(arrival) = rig.low_rx.recv().await.unwrap() else {
            panic!("expected an admit message");
        };
        assert_eq!(arrival.source_terminus, NodeId(1));
        assert!(rig.high_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_progress_increment_ignores_carried_speed() {
        let mut rig = rig();
        let mut slow = addition(NodeId(0));
        slow.speed = 0.0;
        rig.admission.send(slow).await.unwrap();
        rig.updates.recv().await.unwrap();

        rig.clock.send(1).unwrap();
        let update = rig.updates.recv().await.unwrap();
        assert!((update.travel - PROGRESS_PER_TICK).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_line() {
        let rig = rig();
        rig._shutdown.send(()).await.unwrap();
        // The actor drops its admission receiver when the loop exits
        rig.admission.closed().await;
    }
}
