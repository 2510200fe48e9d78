//! Spatial nearest-neighbor index (element finder)
//!
//! Tracks the addressable connection points of every infrastructure entity
//! (line endpoints, plant terminals, road termini) and answers k-nearest
//! queries so new edits can snap onto the existing network. One actor owns
//! the category maps; inserts, removals and queries are serialized through
//! its mailbox, and queries block their caller on a oneshot reply.
//!
//! The query is a deliberate linear scan: category cardinality stays small
//! in practice, and the bounded sorted list keeps the per-query allocation
//! at `count` entries.

pub mod nearest;

use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::core::error::{GridError, Result};

pub use nearest::BoundedDistanceList;

const MAILBOX_CAPACITY: usize = 32;

/// Category a findable element belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    PowerLine,
    PowerPlant,
    RoadLine,
    RoadTerminus,
}

/// A findable element: the snap points of one owning entity.
///
/// `id` is the owning entity's id in its own id space (node id for termini
/// and plants, connection id for lines); `kind` disambiguates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: u32,
    pub kind: ElementKind,
    pub points: Vec<Vec2>,
}

impl Element {
    pub fn new(id: u32, kind: ElementKind, points: Vec<Vec2>) -> Self {
        Self { id, kind, points }
    }
}

/// One k-nearest result row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestMatch {
    pub id: u32,
    pub kind: ElementKind,
    pub point: Vec2,
    pub point_index: usize,
    pub distance: f32,
}

enum FinderRequest {
    Add(Element),
    Remove { id: u32, kind: ElementKind },
    KNearest {
        pos: Vec2,
        kinds: Vec<ElementKind>,
        count: usize,
        reply: oneshot::Sender<Vec<NearestMatch>>,
    },
}

/// Handle to the element-finder actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ElementFinderHandle {
    tx: mpsc::Sender<FinderRequest>,
    shutdown: mpsc::Sender<()>,
}

impl ElementFinderHandle {
    /// Spawn the finder actor and return its handle.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        tokio::spawn(run(rx, shutdown_rx));
        Self { tx, shutdown }
    }

    /// Register (or replace) an element's snap points.
    pub async fn add_element(&self, element: Element) -> Result<()> {
        self.tx
            .send(FinderRequest::Add(element))
            .await
            .map_err(|_| GridError::ChannelClosed("element finder"))
    }

    /// Drop an element when its owning entity is deleted.
    pub async fn remove_element(&self, id: u32, kind: ElementKind) -> Result<()> {
        self.tx
            .send(FinderRequest::Remove { id, kind })
            .await
            .map_err(|_| GridError::ChannelClosed("element finder"))
    }

    /// The `count` nearest snap points of the requested kinds, ascending by
    /// Euclidean distance from `pos`.
    pub async fn k_nearest(
        &self,
        pos: Vec2,
        kinds: Vec<ElementKind>,
        count: usize,
    ) -> Result<Vec<NearestMatch>> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(FinderRequest::KNearest {
                pos,
                kinds,
                count,
                reply,
            })
            .await
            .map_err(|_| GridError::ChannelClosed("element finder"))?;
        reply_rx
            .await
            .map_err(|_| GridError::ChannelClosed("element finder reply"))
    }

    /// Terminate the finder loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.try_send(());
    }
}

async fn run(mut rx: mpsc::Receiver<FinderRequest>, mut shutdown: mpsc::Receiver<()>) {
    let mut elements: AHashMap<ElementKind, AHashMap<u32, Element>> = AHashMap::new();

    loop {
        tokio::select! {
            Some(request) = rx.recv() => match request {
                FinderRequest::Add(element) => {
                    elements
                        .entry(element.kind)
                        .or_default()
                        .insert(element.id, element);
                }
                FinderRequest::Remove { id, kind } => {
                    if let Some(by_id) = elements.get_mut(&kind) {
                        by_id.remove(&id);
                    }
                }
                FinderRequest::KNearest { pos, kinds, count, reply } => {
                    // Caller gone is not our problem; drop the result
                    let _ = reply.send(k_nearest(&elements, pos, &kinds, count));
                }
            },
            _ = shutdown.recv() => break,
            else => break,
        }
    }
    debug!("element finder loop exited");
}

fn k_nearest(
    elements: &AHashMap<ElementKind, AHashMap<u32, Element>>,
    pos: Vec2,
    kinds: &[ElementKind],
    count: usize,
) -> Vec<NearestMatch> {
    let mut closest = BoundedDistanceList::new(count);

    for kind in kinds {
        let Some(by_id) = elements.get(kind) else {
            continue;
        };
        for element in by_id.values() {
            for (point_index, &point) in element.points.iter().enumerate() {
                let distance = point.distance(pos);
                closest.push(
                    distance,
                    NearestMatch {
                        id: element.id,
                        kind: element.kind,
                        point,
                        point_index,
                        distance,
                    },
                );
            }
        }
    }

    closest
        .into_sorted()
        .into_iter()
        .map(|(_, item)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_k_nearest_orders_by_distance() {
        let finder = ElementFinderHandle::spawn();
        finder
            .add_element(Element::new(
                1,
                ElementKind::RoadTerminus,
                vec![Vec2::new(10.0, 0.0)],
            ))
            .await
            .unwrap();
        finder
            .add_element(Element::new(
                2,
                ElementKind::RoadTerminus,
                vec![Vec2::new(1.0, 0.0)],
            ))
            .await
            .unwrap();
        finder
            .add_element(Element::new(
                3,
                ElementKind::RoadTerminus,
                vec![Vec2::new(5.0, 0.0)],
            ))
            .await
            .unwrap();

        let matches = finder
            .k_nearest(Vec2::ZERO, vec![ElementKind::RoadTerminus], 2)
            .await
            .unwrap();
        let ids: Vec<u32> = matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(matches[0].distance <= matches[1].distance);
    }

    #[tokio::test]
    async fn test_k_nearest_filters_by_kind() {
        let finder = ElementFinderHandle::spawn();
        finder
            .add_element(Element::new(1, ElementKind::PowerPlant, vec![Vec2::ZERO]))
            .await
            .unwrap();
        finder
            .add_element(Element::new(
                2,
                ElementKind::RoadTerminus,
                vec![Vec2::new(100.0, 0.0)],
            ))
            .await
            .unwrap();

        let matches = finder
            .k_nearest(Vec2::ZERO, vec![ElementKind::RoadTerminus], 5)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, 2);
    }

    #[tokio::test]
    async fn test_multi_point_elements_report_point_index() {
        let finder = ElementFinderHandle::spawn();
        finder
            .add_element(Element::new(
                7,
                ElementKind::PowerLine,
                vec![Vec2::new(-50.0, 0.0), Vec2::new(2.0, 0.0)],
            ))
            .await
            .unwrap();

        let matches = finder
            .k_nearest(Vec2::ZERO, vec![ElementKind::PowerLine], 1)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].point_index, 1);
        assert_eq!(matches[0].point, Vec2::new(2.0, 0.0));
    }

    #[tokio::test]
    async fn test_removed_element_no_longer_matches() {
        let finder = ElementFinderHandle::spawn();
        finder
            .add_element(Element::new(1, ElementKind::PowerPlant, vec![Vec2::ZERO]))
            .await
            .unwrap();
        finder
            .remove_element(1, ElementKind::PowerPlant)
            .await
            .unwrap();

        let matches = finder
            .k_nearest(Vec2::ZERO, vec![ElementKind::PowerPlant], 1)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
