//! Snapping relaxed coordinates onto real candidate locations.

use crate::candidates::CandidateIndex;
use crate::error::AssignmentError;
use crate::geometry::Point;
use crate::problem::AssignmentProblem;
use crate::traits::LocationId;

/// Chosen candidates, one per variable activity, in visiting order.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretizationResult {
    pub locations: Vec<(LocationId, Point)>,
    pub valid: bool,
}

impl DiscretizationResult {
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.locations.iter().map(|(_, point)| *point)
    }
}

/// Picks the nearest candidate of the right activity type for each point.
#[derive(Debug, Clone, Copy)]
pub struct DiscretizationSolver<'a> {
    index: &'a CandidateIndex,
}

impl<'a> DiscretizationSolver<'a> {
    pub fn new(index: &'a CandidateIndex) -> Self {
        Self { index }
    }

    /// Always valid: how far the snap moved a point is judged by the objective.
    pub fn solve(
        &self,
        problem: &AssignmentProblem,
        locations: &[Point],
    ) -> Result<DiscretizationResult, AssignmentError> {
        let locations = problem
            .purposes
            .iter()
            .zip(locations)
            .map(|(&purpose, &point)| -> Result<_, AssignmentError> {
                let (id, location) = self.index.nearest(purpose, point)?;
                Ok((id.clone(), location))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DiscretizationResult {
            locations,
            valid: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::Candidate;
    use crate::problem::Anchors;
    use crate::traits::{Mode, PersonId, Purpose};

    fn index() -> CandidateIndex {
        CandidateIndex::new(vec![
            Candidate::new(Purpose::Shop, "corner", Point::new(10.0, 10.0)),
            Candidate::new(Purpose::Shop, "mall", Point::new(900.0, 0.0)),
            Candidate::new(Purpose::Leisure, "cinema", Point::new(11.0, 10.0)),
        ])
    }

    fn problem(purposes: Vec<Purpose>) -> AssignmentProblem {
        let legs = purposes.len();
        AssignmentProblem {
            person_id: PersonId(3),
            purposes,
            modes: vec![Mode::Pt; legs],
            travel_times: vec![900.0; legs],
            anchors: Anchors::Origin(Point::ORIGIN),
            activity_index: 1,
        }
    }

    #[test]
    fn test_snaps_by_activity_type() {
        let index = index();
        let solver = DiscretizationSolver::new(&index);
        let p = problem(vec![Purpose::Shop, Purpose::Leisure]);

        let result = solver
            .solve(&p, &[Point::new(800.0, 50.0), Point::new(850.0, 0.0)])
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.locations[0].0.0, "mall");
        // Only one leisure candidate, however far away.
        assert_eq!(result.locations[1].0.0, "cinema");
        assert_eq!(result.locations[1].1, Point::new(11.0, 10.0));
    }

    #[test]
    fn test_snapping_is_idempotent() {
        let index = index();
        let solver = DiscretizationSolver::new(&index);
        let p = problem(vec![Purpose::Shop]);

        let first = solver.solve(&p, &[Point::new(300.0, 300.0)]).unwrap();
        let snapped: Vec<Point> = first.points().collect();
        let second = solver.solve(&p, &snapped).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let index = index();
        let solver = DiscretizationSolver::new(&index);
        let p = problem(vec![Purpose::Other]);

        assert!(matches!(
            solver.solve(&p, &[Point::ORIGIN]),
            Err(AssignmentError::NoCandidates(Purpose::Other))
        ));
    }
}
