//! Vehicles and the position updates they broadcast while traveling

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::RoadConfig;
use crate::core::types::{ConnectionId, VehicleId};

/// A vehicle circulating on the road network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Physical length (world units), for rendering and spacing
    pub length: f32,
}

/// Position update for a vehicle traveling along a road line.
///
/// `travel` is the signed fraction of the segment covered: positive means
/// low-to-high terminus travel, negative means high-to-low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleUpdate {
    pub id: VehicleId,
    pub road: ConnectionId,
    pub travel: f32,
    pub vehicle_length: f32,
}

/// Allocates vehicle ids and synthesizes vehicles with slightly varied
/// lengths. Seeded so generated traffic is reproducible.
#[derive(Debug)]
pub struct VehicleManager {
    next_id: u64,
    rng: ChaCha8Rng,
    base_length: f32,
    length_spread: f32,
}

impl VehicleManager {
    pub fn new(seed: u64, config: &RoadConfig) -> Self {
        Self {
            next_id: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            base_length: config.base_vehicle_length,
            length_spread: config.vehicle_length_spread,
        }
    }

    /// Synthesize the next vehicle.
    pub fn create(&mut self) -> (VehicleId, Vehicle) {
        let id = VehicleId(self.next_id);
        self.next_id += 1;

        let jitter = if self.length_spread > 0.0 {
            self.rng.gen_range(-self.length_spread..=self.length_spread)
        } else {
            0.0
        };
        (
            id,
            Vehicle {
                length: self.base_length + jitter,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_vehicle_ids() {
        let mut manager = VehicleManager::new(1, &RoadConfig::default());
        let (a, _) = manager.create();
        let (b, _) = manager.create();
        assert_eq!(a, VehicleId(0));
        assert_eq!(b, VehicleId(1));
    }

    #[test]
    fn test_lengths_stay_within_spread() {
        let config = RoadConfig::default();
        let mut manager = VehicleManager::new(7, &config);
        for _ in 0..100 {
            let (_, vehicle) = manager.create();
            assert!(vehicle.length >= config.base_vehicle_length - config.vehicle_length_spread);
            assert!(vehicle.length <= config.base_vehicle_length + config.vehicle_length_spread);
        }
    }

    #[test]
    fn test_same_seed_same_fleet() {
        let config = RoadConfig::default();
        let mut a = VehicleManager::new(3, &config);
        let mut b = VehicleManager::new(3, &config);
        for _ in 0..10 {
            assert_eq!(a.create(), b.create());
        }
    }
}
