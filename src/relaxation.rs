//! Continuous placement of variable activities from sampled leg distances.
//!
//! Which solver applies depends on the problem's anchors: a gravity chain
//! between two fixed points, an angular walk away from a single fixed point,
//! or a walk from a randomly drawn candidate when nothing is fixed.

use rand::Rng;

use crate::candidates::CandidateIndex;
use crate::error::AssignmentError;
use crate::geometry::Point;
use crate::problem::{Anchors, AssignmentProblem};
use crate::traits::RelaxationSolver;

/// Below this the two anchors count as the same point.
const MIN_DIRECT_DISTANCE: f64 = 1e-12;

/// Continuous coordinates, one per variable activity.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxationResult {
    pub locations: Vec<Point>,
    pub valid: bool,
    pub iterations: usize,
}

impl RelaxationResult {
    fn converged(locations: Vec<Point>) -> Self {
        Self {
            locations,
            valid: true,
            iterations: 0,
        }
    }
}

fn wrong_anchors(solver: &str, anchors: &Anchors) -> AssignmentError {
    AssignmentError::InvalidConfig(format!("{} cannot relax a problem with {:?}", solver, anchors))
}

/// Damped spring relaxation of a chain whose two ends are fixed.
#[derive(Debug, Clone)]
pub struct GravityChainSolver {
    /// Fraction of each leg's length error corrected per iteration.
    pub alpha: f64,
    /// Absolute leg length tolerance (meters).
    pub eps: f64,
    pub maximum_iterations: usize,
    /// Bound of the initial lateral jitter. Defaults to the anchor distance.
    pub lateral_deviation: Option<f64>,
}

impl Default for GravityChainSolver {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            eps: 1.0,
            maximum_iterations: 1000,
            lateral_deviation: None,
        }
    }
}

impl GravityChainSolver {
    /// Places `distances.len() - 1` points between `origin` and `destination`.
    pub fn solve<R: Rng + ?Sized>(
        &self,
        origin: Point,
        destination: Point,
        distances: &[f64],
        rng: &mut R,
    ) -> RelaxationResult {
        if distances.len() < 2 {
            return RelaxationResult::converged(Vec::new());
        }

        let direct_distance = origin.distance(destination);
        let direction = if direct_distance < MIN_DIRECT_DISTANCE {
            Point::random_direction(rng)
        } else {
            (destination - origin) * (1.0 / direct_distance)
        };

        if distances.len() == 2 {
            return self.solve_single(
                origin,
                direction,
                direct_distance,
                distances[0],
                distances[1],
                rng,
            );
        }

        let mut points = self.initial_points(origin, destination, direction, distances, rng);
        let legs = distances.len();
        let mut valid = false;
        let mut iterations = self.maximum_iterations;

        for iteration in 0..self.maximum_iterations {
            let mut directions = Vec::with_capacity(legs);
            let mut errors = Vec::with_capacity(legs);
            for (pair, &target) in points.windows(2).zip(distances) {
                let delta = pair[1] - pair[0];
                let length = delta.norm();
                errors.push(target - length);
                directions.push(delta * (1.0 / length.max(1.0)));
            }

            if errors.iter().all(|error| error.abs() < self.eps) {
                valid = true;
                iterations = iteration;
                break;
            }

            // Points next to an anchor take the whole correction of that leg.
            for k in 1..legs {
                let before = if k == 1 { 1.0 } else { 0.5 };
                let after = if k == legs - 1 { 1.0 } else { 0.5 };
                let adjustment = directions[k - 1] * (before * self.alpha * errors[k - 1])
                    - directions[k] * (after * self.alpha * errors[k]);
                points[k] += adjustment;
            }
        }

        points.pop();
        points.remove(0);
        RelaxationResult {
            locations: points,
            valid,
            iterations,
        }
    }

    /// Anchors plus interior points spread along the anchor line by
    /// cumulative distance share, with bounded lateral jitter.
    fn initial_points<R: Rng + ?Sized>(
        &self,
        origin: Point,
        destination: Point,
        direction: Point,
        distances: &[f64],
        rng: &mut R,
    ) -> Vec<Point> {
        let direct_distance = origin.distance(destination);
        let total: f64 = distances.iter().sum();
        let interior = distances.len() - 1;
        let lateral = self
            .lateral_deviation
            .unwrap_or(direct_distance)
            .max(1.0);
        let normal = direction.perpendicular();

        let mut points = Vec::with_capacity(distances.len() + 1);
        points.push(origin);
        let mut cumulative = 0.0;
        for (i, &distance) in distances[..interior].iter().enumerate() {
            cumulative += distance;
            let share = if total < MIN_DIRECT_DISTANCE {
                (i + 1) as f64 / distances.len() as f64
            } else {
                cumulative / total
            };
            let jitter = rng.gen_range(-lateral..=lateral);
            points.push(origin + direction * (share * direct_distance) + normal * jitter);
        }
        points.push(destination);
        points
    }

    /// Closed form for one point between two anchors: the intersection of
    /// the circles around both anchors, or the closest compromise when the
    /// circles do not meet.
    fn solve_single<R: Rng + ?Sized>(
        &self,
        origin: Point,
        direction: Point,
        direct_distance: f64,
        first: f64,
        second: f64,
        rng: &mut R,
    ) -> RelaxationResult {
        let total = first + second;
        let ratio = if total > 0.0 { first / total } else { 1.0 };

        let (location, valid) = if direct_distance < MIN_DIRECT_DISTANCE {
            (origin + direction * first, (first - second).abs() < self.eps)
        } else if direct_distance > total {
            (origin + direction * (ratio * direct_distance), false)
        } else if direct_distance < (first - second).abs() {
            (origin + direction * (ratio * first.max(second)), false)
        } else {
            let along = 0.5 * (first * first - second * second + direct_distance * direct_distance)
                / direct_distance;
            let height = (first * first - along * along).max(0.0).sqrt();
            let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            (
                origin + direction * along + direction.perpendicular() * (side * height),
                true,
            )
        };

        RelaxationResult {
            locations: vec![location],
            valid,
            iterations: 0,
        }
    }
}

impl RelaxationSolver for GravityChainSolver {
    fn relax<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        distances: &[f64],
        rng: &mut R,
    ) -> Result<RelaxationResult, AssignmentError> {
        match problem.anchors {
            Anchors::Chain {
                origin,
                destination,
            } => Ok(self.solve(origin, destination, distances, rng)),
            ref anchors => Err(wrong_anchors("gravity chain solver", anchors)),
        }
    }
}

/// Walks away from a single anchor with uniformly random bearings.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngularTailSolver;

impl AngularTailSolver {
    /// One point per distance, each `distances[i]` away from the previous one.
    pub fn walk<R: Rng + ?Sized>(
        &self,
        anchor: Point,
        distances: &[f64],
        rng: &mut R,
    ) -> Vec<Point> {
        let mut current = anchor;
        distances
            .iter()
            .map(|&distance| {
                current += Point::random_direction(rng) * distance;
                current
            })
            .collect()
    }
}

impl RelaxationSolver for AngularTailSolver {
    fn relax<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        distances: &[f64],
        rng: &mut R,
    ) -> Result<RelaxationResult, AssignmentError> {
        let locations = match problem.anchors {
            Anchors::Origin(origin) => self.walk(origin, distances, rng),
            Anchors::Destination(destination) => {
                // Walk backwards from the destination, then restore visiting order.
                let reversed: Vec<f64> = distances.iter().rev().copied().collect();
                let mut locations = self.walk(destination, &reversed, rng);
                locations.reverse();
                locations
            }
            ref anchors => return Err(wrong_anchors("angular tail solver", anchors)),
        };
        Ok(RelaxationResult::converged(locations))
    }
}

/// Seeds an unanchored day at a random candidate of its first activity type
/// and walks on from there.
#[derive(Debug, Clone, Copy)]
pub struct FreeChainSolver<'a> {
    index: &'a CandidateIndex,
    tail: AngularTailSolver,
}

impl<'a> FreeChainSolver<'a> {
    pub fn new(index: &'a CandidateIndex) -> Self {
        Self {
            index,
            tail: AngularTailSolver,
        }
    }
}

impl RelaxationSolver for FreeChainSolver<'_> {
    fn relax<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        distances: &[f64],
        rng: &mut R,
    ) -> Result<RelaxationResult, AssignmentError> {
        if !matches!(problem.anchors, Anchors::Free) {
            return Err(wrong_anchors("free chain solver", &problem.anchors));
        }
        let Some(&first) = problem.purposes.first() else {
            return Ok(RelaxationResult::converged(Vec::new()));
        };

        let (_, start) = self.index.sample(first, rng)?;
        let mut locations = Vec::with_capacity(distances.len() + 1);
        locations.push(start);
        locations.extend(self.tail.walk(start, distances, rng));
        Ok(RelaxationResult::converged(locations))
    }
}

/// Routes each problem to the solver matching its anchors.
#[derive(Debug, Clone)]
pub struct Relaxation<'a> {
    pub chain: GravityChainSolver,
    pub tail: AngularTailSolver,
    pub free: FreeChainSolver<'a>,
}

impl<'a> Relaxation<'a> {
    pub fn new(chain: GravityChainSolver, index: &'a CandidateIndex) -> Self {
        Self {
            chain,
            tail: AngularTailSolver,
            free: FreeChainSolver::new(index),
        }
    }
}

impl RelaxationSolver for Relaxation<'_> {
    fn relax<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        distances: &[f64],
        rng: &mut R,
    ) -> Result<RelaxationResult, AssignmentError> {
        match problem.anchors {
            Anchors::Chain { .. } => self.chain.relax(problem, distances, rng),
            Anchors::Origin(_) | Anchors::Destination(_) => {
                self.tail.relax(problem, distances, rng)
            }
            Anchors::Free => self.free.relax(problem, distances, rng),
        }
    }
}
