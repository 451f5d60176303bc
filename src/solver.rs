//! Secondary location assignment solver.
//!
//! Each attempt samples leg distances, relaxes them into coordinates, snaps
//! those to real candidates and scores the result. The best attempt is kept;
//! a fully valid one ends the search early.

use rand::Rng;

use crate::candidates::CandidateIndex;
use crate::config::SolveOptions;
use crate::discretization::{DiscretizationResult, DiscretizationSolver};
use crate::distances::{
    DistanceDistributions, DistanceSample, EmpiricalDistanceSampler, FeasibleDistanceSampler,
};
use crate::error::AssignmentError;
use crate::objective::evaluate;
use crate::problem::AssignmentProblem;
use crate::relaxation::{Relaxation, RelaxationResult};
use crate::traits::{DistanceSampler, RelaxationSolver};

/// Best attempt for one problem.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentResult {
    pub distances: DistanceSample,
    pub relaxation: RelaxationResult,
    pub discretization: DiscretizationResult,
    pub valid: bool,
    pub objective: f64,
    /// Attempt (zero-based) that produced this result.
    pub iteration: usize,
}

impl AssignmentResult {
    fn improves_on(&self, best: &Option<AssignmentResult>) -> bool {
        best.as_ref().is_none_or(|best| self.objective < best.objective)
    }
}

/// Solver over a distance sampler and a relaxation strategy.
#[derive(Debug, Clone)]
pub struct AssignmentSolver<'a, S, X> {
    sampler: S,
    relaxation: X,
    discretization: DiscretizationSolver<'a>,
    options: &'a SolveOptions,
}

/// The standard solver: feasibility-seeking empirical sampling and
/// anchor-dependent relaxation.
pub type DefaultAssignmentSolver<'a> =
    AssignmentSolver<'a, FeasibleDistanceSampler<EmpiricalDistanceSampler<'a>>, Relaxation<'a>>;

impl<'a> DefaultAssignmentSolver<'a> {
    pub fn standard(
        index: &'a CandidateIndex,
        distributions: &'a DistanceDistributions,
        options: &'a SolveOptions,
    ) -> Self {
        AssignmentSolver::new(
            FeasibleDistanceSampler::new(
                EmpiricalDistanceSampler::new(distributions),
                options.sampler_iterations,
            ),
            Relaxation::new(options.gravity_solver(), index),
            index,
            options,
        )
    }
}

impl<'a, S, X> AssignmentSolver<'a, S, X>
where
    S: DistanceSampler,
    X: RelaxationSolver,
{
    pub fn new(
        sampler: S,
        relaxation: X,
        index: &'a CandidateIndex,
        options: &'a SolveOptions,
    ) -> Self {
        Self {
            sampler,
            relaxation,
            discretization: DiscretizationSolver::new(index),
            options,
        }
    }

    /// One full attempt: sample, relax, discretize, score.
    pub fn attempt<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        iteration: usize,
        rng: &mut R,
    ) -> Result<AssignmentResult, AssignmentError> {
        let distances = self.sampler.sample(problem, rng)?;
        let relaxation = self.relaxation.relax(problem, &distances.distances, rng)?;
        let discretization = self.discretization.solve(problem, &relaxation.locations)?;
        let evaluation = evaluate(problem, self.options, &distances, &relaxation, &discretization)?;

        Ok(AssignmentResult {
            distances,
            relaxation,
            discretization,
            valid: evaluation.valid,
            objective: evaluation.objective,
            iteration,
        })
    }

    /// Best attempt within `assignment_iterations`. Non-convergence is not an
    /// error; the result is then flagged invalid.
    pub fn solve<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        rng: &mut R,
    ) -> Result<AssignmentResult, AssignmentError> {
        let mut best: Option<AssignmentResult> = None;

        for iteration in 0..self.options.assignment_iterations.max(1) {
            let result = self.attempt(problem, iteration, rng)?;
            if result.improves_on(&best) {
                best = Some(result);
            }
            if best.as_ref().is_some_and(|best| best.valid) {
                break;
            }
        }

        best.ok_or_else(|| {
            AssignmentError::InvalidConfig("assignment_iterations must be positive".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::Candidate;
    use crate::geometry::Point;
    use crate::problem::Anchors;
    use crate::traits::{Mode, PersonId, Purpose};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;
    use std::cell::Cell;

    /// Replays fixed distances and counts how often it was asked.
    struct FixedDistances {
        distances: Vec<f64>,
        calls: Cell<usize>,
    }

    impl FixedDistances {
        fn new(distances: Vec<f64>) -> Self {
            Self {
                distances,
                calls: Cell::new(0),
            }
        }
    }

    impl DistanceSampler for &FixedDistances {
        fn sample<R: Rng + ?Sized>(
            &self,
            _problem: &AssignmentProblem,
            _rng: &mut R,
        ) -> Result<DistanceSample, AssignmentError> {
            self.calls.set(self.calls.get() + 1);
            Ok(DistanceSample {
                distances: self.distances.clone(),
                valid: true,
                iterations: 0,
            })
        }
    }

    fn shop_problem(origin: Point, destination: Point) -> AssignmentProblem {
        AssignmentProblem {
            person_id: PersonId(1),
            purposes: vec![Purpose::Shop],
            modes: vec![Mode::Car, Mode::Car],
            travel_times: vec![600.0, 600.0],
            anchors: Anchors::Chain {
                origin,
                destination,
            },
            activity_index: 1,
        }
    }

    #[test]
    fn test_stops_at_first_valid_attempt() {
        let index = CandidateIndex::new(vec![Candidate::new(
            Purpose::Shop,
            "s",
            Point::new(500.0, 0.0),
        )]);
        let options = SolveOptions::default();
        let sampler = FixedDistances::new(vec![500.0, 500.0]);
        let solver = AssignmentSolver::new(
            &sampler,
            Relaxation::new(options.gravity_solver(), &index),
            &index,
            &options,
        );
        let problem = shop_problem(Point::ORIGIN, Point::new(1000.0, 0.0));
        let mut rng = XorShiftRng::seed_from_u64(1);

        let result = solver.solve(&problem, &mut rng).unwrap();
        assert!(result.valid);
        assert_eq!(result.iteration, 0);
        assert_eq!(sampler.calls.get(), 1);
        assert_eq!(result.discretization.locations.len(), 1);
    }

    #[test]
    fn test_exhausts_iterations_and_keeps_best() {
        // The only candidate is far off the feasible circle intersection.
        let index = CandidateIndex::new(vec![Candidate::new(
            Purpose::Shop,
            "far",
            Point::new(0.0, 5000.0),
        )]);
        let options = SolveOptions {
            assignment_iterations: 7,
            ..SolveOptions::default()
        };
        let sampler = FixedDistances::new(vec![600.0, 600.0]);
        let solver = AssignmentSolver::new(
            &sampler,
            Relaxation::new(options.gravity_solver(), &index),
            &index,
            &options,
        );
        let problem = shop_problem(Point::ORIGIN, Point::new(1000.0, 0.0));
        let mut rng = XorShiftRng::seed_from_u64(2);

        let result = solver.solve(&problem, &mut rng).unwrap();
        assert!(!result.valid);
        assert!(result.objective > 0.0);
        assert_eq!(sampler.calls.get(), 7);
        // Every attempt scores the same, so the first one is kept.
        assert_eq!(result.iteration, 0);
        assert_eq!(result.discretization.locations[0].0.0, "far");
    }

    #[test]
    fn test_result_length_matches_size() {
        let index = CandidateIndex::new(vec![
            Candidate::new(Purpose::Shop, "s", Point::new(100.0, 0.0)),
            Candidate::new(Purpose::Leisure, "l", Point::new(200.0, 0.0)),
            Candidate::new(Purpose::Other, "o", Point::new(300.0, 0.0)),
        ]);
        let mut distributions = std::collections::BTreeMap::new();
        distributions.insert(
            Mode::Walk,
            crate::distances::ModeDistribution {
                buckets: vec![crate::distances::DistanceBucket {
                    upper_bound: 3600.0,
                    quantiles: vec![(50.0, 0.0), (500.0, 1.0)],
                }],
            },
        );
        let distributions = DistanceDistributions::new(distributions).unwrap();
        let options = SolveOptions::default();
        let solver = DefaultAssignmentSolver::standard(&index, &distributions, &options);

        let problem = AssignmentProblem {
            person_id: PersonId(4),
            purposes: vec![Purpose::Shop, Purpose::Leisure, Purpose::Other],
            modes: vec![Mode::Walk; 4],
            travel_times: vec![300.0; 4],
            anchors: Anchors::Chain {
                origin: Point::ORIGIN,
                destination: Point::new(400.0, 0.0),
            },
            activity_index: 1,
        };

        for seed in 0..10 {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            let result = solver.solve(&problem, &mut rng).unwrap();
            assert_eq!(result.discretization.locations.len(), problem.size());
            assert_eq!(result.relaxation.locations.len(), problem.size());
            assert_eq!(result.distances.distances.len(), problem.leg_count());
        }
    }
}
