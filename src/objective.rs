//! Scoring of a complete assignment attempt.

use crate::config::SolveOptions;
use crate::discretization::DiscretizationResult;
use crate::distances::DistanceSample;
use crate::error::AssignmentError;
use crate::geometry::leg_lengths;
use crate::problem::AssignmentProblem;
use crate::relaxation::RelaxationResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Largest leg excess over its mode threshold; zero when every leg fits.
    pub objective: f64,
    pub valid: bool,
}

/// Compares the realized leg lengths of the discretized path (including any
/// anchors) with the sampled targets. The worst leg decides the objective.
pub fn evaluate(
    problem: &AssignmentProblem,
    options: &SolveOptions,
    distances: &DistanceSample,
    relaxation: &RelaxationResult,
    discretization: &DiscretizationResult,
) -> Result<Evaluation, AssignmentError> {
    let mut path = Vec::with_capacity(discretization.locations.len() + 2);
    path.extend(problem.origin());
    path.extend(discretization.points());
    path.extend(problem.destination());

    let mut objective: f64 = 0.0;
    for ((realized, sampled), &mode) in leg_lengths(&path)
        .into_iter()
        .zip(&distances.distances)
        .zip(&problem.modes)
    {
        let excess = ((sampled - realized).abs() - options.threshold(mode)?).max(0.0);
        objective = objective.max(excess);
    }

    let valid =
        objective == 0.0 && distances.valid && relaxation.valid && discretization.valid;
    Ok(Evaluation { objective, valid })
}
