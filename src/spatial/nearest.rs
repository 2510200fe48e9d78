//! Bounded insertion-sorted list used to retain the k closest candidates

/// Keeps at most `max` items, ascending by distance. Ties keep encounter
/// order: an item never displaces an earlier item at the same distance.
#[derive(Debug, Clone)]
pub struct BoundedDistanceList<T> {
    max: usize,
    items: Vec<(f32, T)>,
}

impl<T> BoundedDistanceList<T> {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            items: Vec::with_capacity(max),
        }
    }

    /// Insert a candidate, dropping it (or the now-worst item) when full.
    pub fn push(&mut self, distance: f32, item: T) {
        if self.max == 0 {
            return;
        }
        let at = self.items.partition_point(|(d, _)| *d <= distance);
        if at == self.items.len() && self.items.len() >= self.max {
            // Worse than everything in a full list
            return;
        }
        self.items.insert(at, (distance, item));
        self.items.truncate(self.max);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the list, ascending by distance.
    pub fn into_sorted(self) -> Vec<(f32, T)> {
        self.items
    }
}
