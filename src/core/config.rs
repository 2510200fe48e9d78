//! Infrastructure configuration with documented constants
//!
//! All tunables are collected here. The composition root builds one
//! `InfraConfig` and passes it (or its sub-configs) through constructors;
//! there is no process-wide mutable configuration state.

use ahash::AHashMap;

use crate::core::error::{GridError, Result};
use crate::core::types::{PlantKind, PlantSize};

/// Output and footprint table entry for one power plant kind
#[derive(Debug, Clone, Copy)]
pub struct PlantSpec {
    /// Megawatts produced by the small variant
    pub small_output: u32,
    /// Megawatts produced by the large variant
    pub large_output: u32,
    /// Side length of the small variant's square footprint (world units)
    pub small_footprint: f32,
    /// Side length of the large variant's square footprint (world units)
    pub large_footprint: f32,
    /// Construction cost, consumed by the out-of-scope editor UI
    pub cost: f32,
}

/// Power grid configuration: the plant lookup tables
#[derive(Debug, Clone)]
pub struct PowerConfig {
    pub plant_types: AHashMap<PlantKind, PlantSpec>,
}

impl Default for PowerConfig {
    fn default() -> Self {
        let mut plant_types = AHashMap::new();
        plant_types.insert(
            PlantKind::Coal,
            PlantSpec {
                small_output: 400,
                large_output: 1200,
                small_footprint: 12.0,
                large_footprint: 24.0,
                cost: 2_500.0,
            },
        );
        plant_types.insert(
            PlantKind::Gas,
            PlantSpec {
                small_output: 300,
                large_output: 900,
                small_footprint: 8.0,
                large_footprint: 16.0,
                cost: 1_800.0,
            },
        );
        plant_types.insert(
            PlantKind::Nuclear,
            PlantSpec {
                small_output: 1_000,
                large_output: 4_000,
                small_footprint: 20.0,
                large_footprint: 40.0,
                cost: 12_000.0,
            },
        );
        plant_types.insert(
            PlantKind::Solar,
            PlantSpec {
                small_output: 50,
                large_output: 250,
                small_footprint: 10.0,
                large_footprint: 30.0,
                cost: 900.0,
            },
        );
        plant_types.insert(
            PlantKind::Wind,
            PlantSpec {
                small_output: 30,
                large_output: 150,
                small_footprint: 4.0,
                large_footprint: 10.0,
                cost: 700.0,
            },
        );
        Self { plant_types }
    }
}

impl PowerConfig {
    /// Output (MW) and footprint side length for a plant of the given kind and size
    pub fn output_and_footprint(&self, kind: PlantKind, size: PlantSize) -> Result<(u32, f32)> {
        let spec = self
            .plant_types
            .get(&kind)
            .ok_or_else(|| GridError::InvalidConfig(format!("no plant spec for {kind:?}")))?;
        Ok(match size {
            PlantSize::Small => (spec.small_output, spec.small_footprint),
            PlantSize::Large => (spec.large_output, spec.large_footprint),
        })
    }

    /// Construction cost for a plant kind
    pub fn cost(&self, kind: PlantKind) -> Result<f32> {
        self.plant_types
            .get(&kind)
            .map(|spec| spec.cost)
            .ok_or_else(|| GridError::InvalidConfig(format!("no plant spec for {kind:?}")))
    }
}

/// Road network configuration
#[derive(Debug, Clone)]
pub struct RoadConfig {
    /// Capacity assigned to procedurally generated highway segments
    ///
    /// User-drawn roads carry an explicit capacity; this is only the
    /// default for the infinite road generator.
    pub default_capacity: u32,

    /// Nominal vehicle length (world units)
    pub base_vehicle_length: f32,

    /// Maximum +/- variation applied to `base_vehicle_length` per vehicle
    pub vehicle_length_spread: f32,

    /// Ticks between car spawns at the road network frontiers
    ///
    /// At the default (10) and one tick per 100ms this is roughly one car
    /// per direction per second.
    pub car_spawn_period: u32,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            default_capacity: 1_000,
            base_vehicle_length: 4.6,
            vehicle_length_spread: 0.6,
            car_spawn_period: 10,
        }
    }
}

/// Terrain-facing configuration consumed by the road generator
#[derive(Debug, Clone)]
pub struct TerrainConfig {
    /// Side length of one terrain region (world units). Generated road
    /// segments span exactly one region horizontally.
    pub region_size: f32,

    /// Seed for the endpoint jitter noise. Fixed seed keeps generated
    /// road geometry reproducible across runs.
    pub noise_seed: i32,

    /// Vertical jitter amplitude applied to generated road endpoints so
    /// straight segments still have visually distinct snap nodes.
    pub jitter_scale: f32,

    /// Noise sampling frequency; region columns are sampled at integer
    /// coordinates, so this controls variation between adjacent columns.
    pub noise_frequency: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            region_size: 128.0,
            noise_seed: 42,
            jitter_scale: 30.0,
            noise_frequency: 0.1,
        }
    }
}

/// Top-level configuration for the infrastructure simulation
#[derive(Debug, Clone, Default)]
pub struct InfraConfig {
    pub power: PowerConfig,
    pub road: RoadConfig,
    pub terrain: TerrainConfig,
}

impl InfraConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        for kind in crate::core::types::PlantKind::ALL {
            if !self.power.plant_types.contains_key(&kind) {
                return Err(GridError::InvalidConfig(format!(
                    "plant table is missing an entry for {kind:?}"
                )));
            }
        }

        if self.road.default_capacity == 0 {
            return Err(GridError::InvalidConfig(
                "default_capacity must be positive".into(),
            ));
        }
        if self.road.vehicle_length_spread >= self.road.base_vehicle_length {
            return Err(GridError::InvalidConfig(format!(
                "vehicle_length_spread ({}) must be < base_vehicle_length ({})",
                self.road.vehicle_length_spread, self.road.base_vehicle_length
            )));
        }
        if self.road.car_spawn_period == 0 {
            return Err(GridError::InvalidConfig(
                "car_spawn_period must be at least 1 tick".into(),
            ));
        }

        if self.terrain.region_size <= 0.0 {
            return Err(GridError::InvalidConfig(
                "region_size must be positive".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(InfraConfig::default().validate().is_ok());
    }

    #[test]
    fn test_plant_table_lookup() {
        let config = PowerConfig::default();
        let (output, footprint) = config
            .output_and_footprint(PlantKind::Nuclear, PlantSize::Large)
            .unwrap();
        assert_eq!(output, 4_000);
        assert!(footprint > 0.0);

        let (small_output, small_footprint) = config
            .output_and_footprint(PlantKind::Nuclear, PlantSize::Small)
            .unwrap();
        assert!(small_output < output);
        assert!(small_footprint < footprint);
    }

    #[test]
    fn test_plant_cost_lookup() {
        let config = PowerConfig::default();
        assert!(config.cost(PlantKind::Wind).unwrap() > 0.0);
    }

    #[test]
    fn test_missing_plant_entry_fails_validation() {
        let mut config = InfraConfig::default();
        config.power.plant_types.remove(&PlantKind::Solar);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = InfraConfig::default();
        config.road.default_capacity = 0;
        assert!(config.validate().is_err());
    }
}
