//! Core identifier types shared across the infrastructure graph

use serde::{Deserialize, Serialize};

/// Unique identifier for a graph node (terminus, plant or intersection).
///
/// Allocated sequentially by the graph store. The ordering derive matters:
/// road lines canonicalize their travel direction as `min`/`max` of the two
/// endpoint node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Unique identifier for a graph connection (power or road line)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

/// Unique identifier for a vehicle circulating on the road network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub u64);

/// Discrete terrain region coordinate, as reported by the terrain layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionCoord {
    pub x: i32,
    pub y: i32,
}

impl RegionCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Power plant fuel/technology category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlantKind {
    Coal,
    Gas,
    Nuclear,
    Solar,
    Wind,
}

impl PlantKind {
    /// Every plant kind, for exhaustive config-table validation
    pub const ALL: [PlantKind; 5] = [
        PlantKind::Coal,
        PlantKind::Gas,
        PlantKind::Nuclear,
        PlantKind::Solar,
        PlantKind::Wind,
    ];
}

/// Power plant size class (scales output and footprint)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlantSize {
    Small,
    Large,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_ordering() {
        assert!(NodeId(1) < NodeId(2));
        assert_eq!(NodeId(3).min(NodeId(7)), NodeId(3));
        assert_eq!(NodeId(3).max(NodeId(7)), NodeId(7));
    }

    #[test]
    fn test_node_id_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<NodeId, &str> = HashMap::new();
        map.insert(NodeId(1), "terminus");
        assert_eq!(map.get(&NodeId(1)), Some(&"terminus"));
    }

    #[test]
    fn test_plant_kind_all_is_exhaustive() {
        // A new variant must be added to ALL; this keeps the config table honest
        for kind in PlantKind::ALL {
            assert!(PlantKind::ALL.contains(&kind));
        }
        assert_eq!(PlantKind::ALL.len(), 5);
    }
}
