//! End-to-end procedural highway tests: the generator actor growing road
//! from region discoveries and releasing frontier traffic.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use citygrid::core::config::InfraConfig;
use citygrid::core::time::Clock;
use citygrid::core::types::{RegionCoord, VehicleId};
use citygrid::vehicle::VehicleUpdate;
use citygrid::geometry::GeometryEvent;
use citygrid::road::infinite::InfiniRoadGenerator;
use citygrid::road::{RoadGrid, ADMISSION_EPSILON};
use citygrid::spatial::ElementFinderHandle;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

struct World {
    clock: Clock,
    roads: RoadGrid,
    geometry: broadcast::Receiver<GeometryEvent>,
    config: InfraConfig,
}

fn world() -> World {
    let clock = Clock::new(64);
    let (geometry_tx, geometry) = broadcast::channel(256);
    let (updates, _) = broadcast::channel(256);
    let roads = RoadGrid::new(
        clock.clone(),
        ElementFinderHandle::spawn(),
        geometry_tx,
        updates,
    );
    World {
        clock,
        roads,
        geometry,
        config: InfraConfig::default(),
    }
}

#[tokio::test]
async fn test_generator_actor_grows_a_connected_highway() {
    let mut world = world();
    let generator = InfiniRoadGenerator::new(
        world.roads.clone(),
        world.config.road.clone(),
        world.config.terrain.clone(),
        7,
    )
    .spawn();

    for x in [0, 1, -1] {
        generator.regions.send(RegionCoord::new(x, 0)).await.unwrap();
    }
    // Off-row discoveries must not grow anything
    generator.regions.send(RegionCoord::new(5, 2)).await.unwrap();

    // Three columns: 4 terminus events and 3 line events, and the shared
    // termini mean exactly 4 nodes in the graph
    let mut termini = 0;
    let mut lines = 0;
    for _ in 0..7 {
        match timeout(RECV_TIMEOUT, world.geometry.recv())
            .await
            .expect("timed out waiting for geometry")
            .unwrap()
        {
            GeometryEvent::RoadTerminusAdded(_) => termini += 1,
            GeometryEvent::RoadLineAdded(_) => lines += 1,
            other => panic!("unexpected geometry event {other:?}"),
        }
    }
    assert_eq!((termini, lines), (4, 3));
    assert_eq!(world.roads.graph().node_count(), 4);
    assert_eq!(world.roads.graph().connection_count(), 3);

    // Nothing further queued (the off-row region was ignored)
    assert!(world.geometry.try_recv().is_err());
    generator.shutdown();
}

#[tokio::test]
async fn test_frontier_cars_spawn_after_the_configured_period() {
    let mut world = world();
    let generator = InfiniRoadGenerator::new(
        world.roads.clone(),
        world.config.road.clone(),
        world.config.terrain.clone(),
        7,
    )
    .spawn();

    for x in [0, 1, -1] {
        generator.regions.send(RegionCoord::new(x, 0)).await.unwrap();
    }
    // Wait for all three columns before ticking
    for _ in 0..7 {
        timeout(RECV_TIMEOUT, world.geometry.recv())
            .await
            .expect("timed out waiting for geometry")
            .unwrap();
    }

    let mut updates = world.roads.subscribe_updates();
    for _ in 0..world.config.road.car_spawn_period {
        world.clock.tick();
    }

    // One car per frontier, admitted into the two outermost lines. Later
    // ticks may already be advancing the first car while the second is
    // still being admitted, so judge each car by its first update.
    let mut first_seen: HashMap<VehicleId, VehicleUpdate> = HashMap::new();
    while first_seen.len() < 2 {
        let update = timeout(RECV_TIMEOUT, updates.recv()).await.unwrap().unwrap();
        first_seen.entry(update.id).or_insert(update);
    }
    let cars: Vec<&VehicleUpdate> = first_seen.values().collect();
    assert_eq!(cars[0].travel.abs(), ADMISSION_EPSILON);
    assert_eq!(cars[1].travel.abs(), ADMISSION_EPSILON);
    assert_ne!(cars[0].road, cars[1].road);

    generator.shutdown();
}
