//! Demo binary: wires the simulation together and runs a small scenario
//!
//! Stands in for the game shell (renderer, terrain, input are external
//! collaborators). Builds the clock, the spatial index and both
//! infrastructure builders, discovers a few terrain regions so the highway
//! generator grows road, then logs the geometry and vehicle traffic the
//! simulation produces.

use std::time::Duration;

use glam::Vec2;
use tokio::sync::broadcast;
use tracing::{info, warn};

use citygrid::core::config::InfraConfig;
use citygrid::core::time::Clock;
use citygrid::core::types::{PlantKind, PlantSize, RegionCoord};
use citygrid::power::PowerGrid;
use citygrid::road::infinite::InfiniRoadGenerator;
use citygrid::road::RoadGrid;
use citygrid::spatial::{ElementFinderHandle, ElementKind};

const TICK_PERIOD: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> citygrid::core::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("citygrid=debug")),
        )
        .init();

    let config = InfraConfig::new();
    config.validate()?;

    let clock = Clock::default();
    let finder = ElementFinderHandle::spawn();
    let (geometry, mut geometry_rx) = broadcast::channel(256);
    let (updates, _) = broadcast::channel(1024);

    let roads = RoadGrid::new(clock.clone(), finder.clone(), geometry.clone(), updates);
    let power = PowerGrid::new(finder.clone(), geometry, config.power.clone());

    // A small hand-built power network next to the highway
    let plant = power
        .add_plant(Vec2::new(40.0, 80.0), PlantKind::Gas, PlantSize::Small)
        .await?;
    power
        .add_line(
            plant.position,
            Vec2::new(200.0, 60.0),
            plant.output,
            Some(plant.node),
            None,
        )
        .await?;
    info!(
        plant = plant.node.0,
        output = plant.output,
        cost = power.plant_cost(plant.kind)?,
        "power network seeded"
    );

    // Grow the highway across five columns, as if the camera panned east
    let generator = InfiniRoadGenerator::new(
        roads.clone(),
        config.road.clone(),
        config.terrain.clone(),
        rand::random(),
    );
    let mut traffic = roads.subscribe_updates();
    let generator = generator.spawn();
    for x in -2..=2 {
        generator
            .regions
            .send(RegionCoord::new(x, 0))
            .await
            .map_err(|_| citygrid::core::error::GridError::ChannelClosed("road generator"))?;
    }

    let nearest = finder
        .k_nearest(Vec2::ZERO, vec![ElementKind::RoadTerminus], 3)
        .await?;
    for hit in &nearest {
        info!(node = hit.id, distance = hit.distance, "terminus near origin");
    }

    let driver = clock.spawn_driver(TICK_PERIOD);

    // Observe the simulation for a few seconds, then shut down
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            event = geometry_rx.recv() => match event {
                Ok(event) => info!(?event, "geometry"),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "geometry stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            update = traffic.recv() => match update {
                Ok(update) => info!(
                    vehicle = update.id.0,
                    road = update.road.0,
                    travel = update.travel,
                    "traffic"
                ),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "traffic stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut deadline => break,
        }
    }

    driver.abort();
    generator.shutdown();
    finder.shutdown();
    info!(tick = clock.now(), "simulation stopped");
    Ok(())
}
