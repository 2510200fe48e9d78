//! Procedural highway generator driven by terrain region discovery
//!
//! The terrain layer reports region coordinates as they come into view; the
//! generator extends an infinite east-west highway along row zero, one road
//! segment per column. Adjacent columns share termini, so the highway is one
//! connected chain, and cars are periodically released at both frontiers so
//! the road is never empty.

use ahash::AHashMap;
use fastnoise_lite::{FastNoiseLite, NoiseType};
use glam::Vec2;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::core::config::{RoadConfig, TerrainConfig};
use crate::core::error::Result;
use crate::core::types::{ConnectionId, NodeId, RegionCoord};
use crate::road::line::{VehicleAddition, PROGRESS_PER_TICK};
use crate::road::RoadGrid;
use crate::vehicle::VehicleManager;

const MAILBOX_CAPACITY: usize = 32;

/// The road built for one terrain column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedSegment {
    /// Terminus at the column's west boundary
    pub start: NodeId,
    pub line: ConnectionId,
    /// Terminus at the column's east boundary
    pub end: NodeId,
}

/// Handle to a spawned generator actor
#[derive(Debug, Clone)]
pub struct InfiniRoadHandle {
    /// Feed region-discovered coordinates here
    pub regions: mpsc::Sender<RegionCoord>,
    shutdown: mpsc::Sender<()>,
}

impl InfiniRoadHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown.try_send(());
    }
}

pub struct InfiniRoadGenerator {
    grid: RoadGrid,
    vehicles: VehicleManager,
    noise: FastNoiseLite,
    generated: AHashMap<i32, GeneratedSegment>,
    west_edge: i32,
    east_edge: i32,
    west_segment: Option<GeneratedSegment>,
    east_segment: Option<GeneratedSegment>,
    car_timer: u32,
    road_config: RoadConfig,
    terrain: TerrainConfig,
}

impl InfiniRoadGenerator {
    pub fn new(
        grid: RoadGrid,
        road_config: RoadConfig,
        terrain: TerrainConfig,
        vehicle_seed: u64,
    ) -> Self {
        let mut noise = FastNoiseLite::with_seed(terrain.noise_seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(terrain.noise_frequency));

        Self {
            grid,
            vehicles: VehicleManager::new(vehicle_seed, &road_config),
            noise,
            generated: AHashMap::new(),
            west_edge: 0,
            east_edge: 0,
            west_segment: None,
            east_segment: None,
            car_timer: road_config.car_spawn_period,
            road_config,
            terrain,
        }
    }

    /// Extend the highway for a newly discovered terrain region.
    ///
    /// Only row zero grows road; re-discovering a generated column is a
    /// no-op. Columns adjacent to generated ones reuse the shared terminus
    /// so the highway stays connected.
    pub async fn handle_region(&mut self, coord: RegionCoord) -> Result<()> {
        if coord.y != 0 {
            return Ok(());
        }
        if self.generated.contains_key(&coord.x) {
            debug!(x = coord.x, "column already generated");
            return Ok(());
        }

        let start_node = self.live_terminus(self.generated.get(&(coord.x - 1)).map(|s| s.end));
        let end_node = self.live_terminus(self.generated.get(&(coord.x + 1)).map(|s| s.start));

        let start = self.boundary_point(coord.x);
        let end = self.boundary_point(coord.x + 1);
        let (start_id, line, end_id) = self
            .grid
            .add_line(
                start,
                end,
                self.road_config.default_capacity,
                start_node,
                end_node,
            )
            .await?;

        let segment = GeneratedSegment {
            start: start_id,
            line,
            end: end_id,
        };
        let first = self.generated.is_empty();
        self.generated.insert(coord.x, segment);

        if first {
            self.west_edge = coord.x;
            self.east_edge = coord.x;
            self.west_segment = Some(segment);
            self.east_segment = Some(segment);
        } else if coord.x < self.west_edge {
            self.west_edge = coord.x;
            self.west_segment = Some(segment);
        } else if coord.x > self.east_edge {
            self.east_edge = coord.x;
            self.east_segment = Some(segment);
        }
        debug!(
            x = coord.x,
            line = line.0,
            west = self.west_edge,
            east = self.east_edge,
            "highway column generated"
        );
        Ok(())
    }

    /// Count down the car timer; when it fires, release one car at each
    /// frontier, heading inward.
    pub async fn handle_tick(&mut self) {
        if self.generated.is_empty() {
            return;
        }
        self.car_timer -= 1;
        if self.car_timer > 0 {
            return;
        }
        self.car_timer = self.road_config.car_spawn_period;

        let frontiers = [
            // West frontier: enter at the segment's west end, drive east
            self.west_segment.map(|s| (s.line, s.start)),
            self.east_segment.map(|s| (s.line, s.end)),
        ];
        for (line, terminus) in frontiers.into_iter().flatten() {
            self.release_car(line, terminus).await;
        }
    }

    /// Spawn the generator as an actor over region and tick streams.
    pub fn spawn(mut self) -> InfiniRoadHandle {
        let (regions, mut region_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (shutdown, mut shutdown_rx) = mpsc::channel(1);
        let mut ticks = self.grid.clock().subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(coord) = region_rx.recv() => {
                        if let Err(error) = self.handle_region(coord).await {
                            warn!(%error, x = coord.x, y = coord.y, "road generation failed");
                        }
                    }
                    tick = ticks.recv() => match tick {
                        Ok(_) => self.handle_tick().await,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "generator tick stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown_rx.recv() => break,
                    else => break,
                }
            }
            debug!("road generator loop exited");
        });
        InfiniRoadHandle { regions, shutdown }
    }

    /// The segment generated for a column, if any.
    pub fn segment(&self, column: i32) -> Option<GeneratedSegment> {
        self.generated.get(&column).copied()
    }

    /// Westmost and eastmost generated columns.
    pub fn frontiers(&self) -> Option<(i32, i32)> {
        (!self.generated.is_empty()).then_some((self.west_edge, self.east_edge))
    }

    /// A neighbor's terminus id, downgraded to `None` when the node has
    /// since been deleted (a fresh terminus will be created instead).
    fn live_terminus(&self, candidate: Option<NodeId>) -> Option<NodeId> {
        let id = candidate?;
        if self.grid.terminus(id).is_none() {
            debug!(node = id.0, "shared terminus is gone, creating a new one");
            return None;
        }
        Some(id)
    }

    /// World position of a column boundary: evenly spaced horizontally,
    /// noise-jittered vertically.
    fn boundary_point(&self, boundary: i32) -> Vec2 {
        let jitter = self.noise.get_noise_2d(boundary as f32, 0.0) * self.terrain.jitter_scale;
        Vec2::new(boundary as f32 * self.terrain.region_size, jitter)
    }

    async fn release_car(&mut self, line: ConnectionId, terminus: NodeId) {
        let Some(handle) = self.grid.line(line) else {
            debug!(line = line.0, "frontier line is gone, skipping car spawn");
            return;
        };
        let (vehicle_id, vehicle) = self.vehicles.create();
        let addition = VehicleAddition {
            vehicle_id,
            vehicle,
            source_terminus: terminus,
            speed: PROGRESS_PER_TICK,
        };
        if handle.admission.send(addition).await.is_err() {
            debug!(line = line.0, "frontier line actor gone, dropping car");
            return;
        }
        debug!(vehicle = vehicle_id.0, line = line.0, "car released at frontier");
    }
}
