//! Spatial index over real candidate locations, one R-tree per activity type.

use std::collections::HashMap;

use rand::Rng;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};

use crate::error::AssignmentError;
use crate::geometry::Point;
use crate::traits::{LocationId, Purpose};

/// One real-world destination offering a given activity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "activity_type")]
    pub purpose: Purpose,
    pub x: f64,
    pub y: f64,
    pub location_id: LocationId,
}

impl Candidate {
    pub fn new(purpose: Purpose, location_id: impl Into<String>, location: Point) -> Self {
        Self {
            purpose,
            x: location.x,
            y: location.y,
            location_id: LocationId::new(location_id),
        }
    }

    pub fn location(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

type Entry = GeomWithData<[f64; 2], usize>;

#[derive(Debug)]
struct PurposeIndex {
    ids: Vec<LocationId>,
    locations: Vec<Point>,
    tree: RTree<Entry>,
}

impl PurposeIndex {
    fn build(ids: Vec<LocationId>, locations: Vec<Point>) -> Self {
        let entries = locations
            .iter()
            .enumerate()
            .map(|(i, location)| GeomWithData::new(location.to_array(), i))
            .collect();
        Self {
            ids,
            locations,
            tree: RTree::bulk_load(entries),
        }
    }

    fn get(&self, i: usize) -> (&LocationId, Point) {
        (&self.ids[i], self.locations[i])
    }
}

/// Immutable per-activity-type index supporting nearest-neighbour lookup and
/// uniform sampling. Built once and shared read-only by every worker.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    by_purpose: HashMap<Purpose, PurposeIndex>,
}

impl CandidateIndex {
    pub fn new(candidates: impl IntoIterator<Item = Candidate>) -> Self {
        let mut grouped: HashMap<Purpose, (Vec<LocationId>, Vec<Point>)> = HashMap::new();
        for candidate in candidates {
            let location = candidate.location();
            let (ids, locations) = grouped.entry(candidate.purpose).or_default();
            ids.push(candidate.location_id);
            locations.push(location);
        }

        let by_purpose = grouped
            .into_iter()
            .map(|(purpose, (ids, locations))| (purpose, PurposeIndex::build(ids, locations)))
            .collect();
        Self { by_purpose }
    }

    /// Number of candidates for an activity type.
    pub fn len(&self, purpose: Purpose) -> usize {
        self.by_purpose.get(&purpose).map_or(0, |index| index.ids.len())
    }

    pub fn contains(&self, purpose: Purpose) -> bool {
        self.len(purpose) > 0
    }

    /// Fails if the activity type has no candidates at all.
    pub fn ensure(&self, purpose: Purpose) -> Result<(), AssignmentError> {
        if self.contains(purpose) {
            Ok(())
        } else {
            Err(AssignmentError::NoCandidates(purpose))
        }
    }

    fn purpose_index(&self, purpose: Purpose) -> Result<&PurposeIndex, AssignmentError> {
        self.by_purpose
            .get(&purpose)
            .filter(|index| !index.ids.is_empty())
            .ok_or(AssignmentError::NoCandidates(purpose))
    }

    /// Closest candidate of the given type to `point`.
    pub fn nearest(
        &self,
        purpose: Purpose,
        point: Point,
    ) -> Result<(&LocationId, Point), AssignmentError> {
        let index = self.purpose_index(purpose)?;
        let entry = index
            .tree
            .nearest_neighbor(&point.to_array())
            .ok_or(AssignmentError::NoCandidates(purpose))?;
        Ok(index.get(entry.data))
    }

    /// Uniformly drawn candidate of the given type.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        purpose: Purpose,
        rng: &mut R,
    ) -> Result<(&LocationId, Point), AssignmentError> {
        let index = self.purpose_index(purpose)?;
        let i = rng.gen_range(0..index.ids.len());
        Ok(index.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn shops() -> CandidateIndex {
        CandidateIndex::new(vec![
            Candidate::new(Purpose::Shop, "s1", Point::new(0.0, 0.0)),
            Candidate::new(Purpose::Shop, "s2", Point::new(100.0, 0.0)),
            Candidate::new(Purpose::Shop, "s3", Point::new(0.0, 100.0)),
            Candidate::new(Purpose::Leisure, "l1", Point::new(500.0, 500.0)),
        ])
    }

    #[test]
    fn test_nearest_picks_closest_of_type() {
        let index = shops();
        let (id, location) = index.nearest(Purpose::Shop, Point::new(90.0, 10.0)).unwrap();
        assert_eq!(id.0, "s2");
        assert_eq!(location, Point::new(100.0, 0.0));

        let (id, _) = index.nearest(Purpose::Leisure, Point::new(0.0, 0.0)).unwrap();
        assert_eq!(id.0, "l1");
    }

    #[test]
    fn test_nearest_is_idempotent() {
        let index = shops();
        let (_, snapped) = index.nearest(Purpose::Shop, Point::new(30.0, 60.0)).unwrap();
        let (_, again) = index.nearest(Purpose::Shop, snapped).unwrap();
        assert_eq!(snapped, again);
    }

    #[test]
    fn test_missing_type_is_an_error() {
        let index = shops();
        let err = index.nearest(Purpose::Other, Point::ORIGIN).unwrap_err();
        assert!(matches!(err, AssignmentError::NoCandidates(Purpose::Other)));
        assert!(index.ensure(Purpose::Other).is_err());
        assert!(index.ensure(Purpose::Shop).is_ok());
    }

    #[test]
    fn test_sample_returns_candidate_of_type() {
        let index = shops();
        let mut rng = XorShiftRng::seed_from_u64(3);
        for _ in 0..50 {
            let (id, _) = index.sample(Purpose::Shop, &mut rng).unwrap();
            assert!(id.0.starts_with('s'));
        }
    }

    #[test]
    fn test_len() {
        let index = shops();
        assert_eq!(index.len(Purpose::Shop), 3);
        assert_eq!(index.len(Purpose::Leisure), 1);
        assert_eq!(index.len(Purpose::Work), 0);
    }
}
