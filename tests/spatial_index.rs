//! Property tests for the bounded distance list backing k-nearest queries.

use citygrid::spatial::BoundedDistanceList;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_never_holds_more_than_capacity(
        distances in prop::collection::vec(0.0f32..1000.0, 0..50),
        capacity in 0usize..10,
    ) {
        let mut list = BoundedDistanceList::new(capacity);
        for &distance in &distances {
            list.push(distance, ());
        }
        prop_assert_eq!(list.len(), distances.len().min(capacity));
    }

    #[test]
    fn test_keeps_exactly_the_smallest_distances_in_order(
        distances in prop::collection::vec(0.0f32..1000.0, 0..50),
        capacity in 1usize..10,
    ) {
        let mut list = BoundedDistanceList::new(capacity);
        for &distance in &distances {
            list.push(distance, ());
        }
        let kept: Vec<f32> = list.into_sorted().into_iter().map(|(d, _)| d).collect();

        prop_assert!(kept.windows(2).all(|pair| pair[0] <= pair[1]));

        let mut expected = distances.clone();
        expected.sort_by(f32::total_cmp);
        expected.truncate(capacity);
        prop_assert_eq!(kept, expected);
    }
}
