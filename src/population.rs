//! Parallel assignment of a whole synthetic population.
//!
//! Persons are ordered by id and cut into one contiguous chunk per worker.
//! Each chunk is solved sequentially on a rayon thread with its own RNG seeded
//! from the master seed plus the chunk index, so the output only depends on
//! the inputs, the seed and the worker count.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use rayon::prelude::*;
use serde::Serialize;

use crate::candidates::CandidateIndex;
use crate::config::PipelineConfig;
use crate::distances::DistanceDistributions;
use crate::error::AssignmentError;
use crate::problem::{AssignmentProblem, FixedLocations, Trip, group_by_person, person_problems};
use crate::solver::{AssignmentResult, DefaultAssignmentSolver};
use crate::traits::{LocationId, Mode, PersonId, Purpose};

/// One assigned activity location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub person_id: PersonId,
    pub activity_index: usize,
    pub location_id: LocationId,
    pub x: f64,
    pub y: f64,
}

/// Outcome of one problem, for success-rate reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceRecord {
    pub person_id: PersonId,
    /// Activity index of the problem's first variable activity.
    pub activity_index: usize,
    pub size: usize,
    pub valid: bool,
    pub objective: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationAssignment {
    pub locations: Vec<LocationRecord>,
    pub convergence: Vec<ConvergenceRecord>,
}

impl PopulationAssignment {
    pub fn summary(&self) -> ConvergenceSummary {
        ConvergenceSummary::from_records(&self.convergence)
    }

    fn extend(&mut self, problem: &AssignmentProblem, result: AssignmentResult) {
        self.locations.extend(
            result
                .discretization
                .locations
                .into_iter()
                .enumerate()
                .map(|(offset, (location_id, location))| LocationRecord {
                    person_id: problem.person_id,
                    activity_index: problem.activity_index + offset,
                    location_id,
                    x: location.x,
                    y: location.y,
                }),
        );
        self.convergence.push(ConvergenceRecord {
            person_id: problem.person_id,
            activity_index: problem.activity_index,
            size: problem.size(),
            valid: result.valid,
            objective: result.objective,
            iterations: result.iteration + 1,
        });
    }

    fn append(&mut self, mut other: PopulationAssignment) {
        self.locations.append(&mut other.locations);
        self.convergence.append(&mut other.convergence);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeSummary {
    pub total: usize,
    pub valid: usize,
}

/// Aggregated convergence statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvergenceSummary {
    pub total: usize,
    pub valid: usize,
    /// Breakdown by problem size.
    pub by_size: BTreeMap<usize, SizeSummary>,
}

impl ConvergenceSummary {
    pub fn from_records(records: &[ConvergenceRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            let size = summary.by_size.entry(record.size).or_default();
            size.total += 1;
            summary.total += 1;
            if record.valid {
                size.valid += 1;
                summary.valid += 1;
            }
        }
        summary
    }

    /// Share of valid problems; 1.0 when there was nothing to solve.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.valid as f64 / self.total as f64
        }
    }
}

/// Fails on the first variable purpose in `trips` that has no candidates.
pub fn check_candidates(trips: &[Trip], index: &CandidateIndex) -> Result<(), AssignmentError> {
    let purposes: BTreeSet<Purpose> = trips
        .iter()
        .flat_map(|trip| [trip.preceding_purpose, trip.following_purpose])
        .filter(|purpose| !purpose.is_fixed())
        .collect();
    purposes.into_iter().try_for_each(|purpose| index.ensure(purpose))
}

/// Fails on the first trip mode in `trips` that has no distance distribution.
pub fn check_distributions(
    trips: &[Trip],
    distributions: &DistanceDistributions,
) -> Result<(), AssignmentError> {
    let available: BTreeSet<Mode> = distributions.modes().collect();
    let used: BTreeSet<Mode> = trips.iter().map(|trip| trip.mode).collect();
    match used.difference(&available).next() {
        Some(&mode) => Err(AssignmentError::MissingDistribution(mode)),
        None => Ok(()),
    }
}

/// Assigns every variable activity of every person in `trips`.
///
/// Configuration problems (unknown candidates, missing fixed locations,
/// distributions or thresholds) abort the run. Problems that do not converge
/// are kept with their best attempt and flagged in the convergence records.
pub fn assign_population(
    trips: &[Trip],
    fixed: &FixedLocations,
    index: &CandidateIndex,
    distributions: &DistanceDistributions,
    config: &PipelineConfig,
) -> Result<PopulationAssignment, AssignmentError> {
    config.validate()?;
    check_candidates(trips, index)?;
    check_distributions(trips, distributions)?;

    let persons = group_by_person(trips);
    let chunk_size = persons.len().div_ceil(config.workers).max(1);
    tracing::info!(
        persons = persons.len(),
        trips = trips.len(),
        workers = config.workers,
        seed = config.seed,
        "assigning secondary locations"
    );

    let chunks = persons
        .par_chunks(chunk_size)
        .enumerate()
        .map(|(chunk, persons)| {
            let seed = config.seed.wrapping_add(chunk as u64);
            solve_chunk(persons, fixed, index, distributions, config, seed)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut assignment = PopulationAssignment::default();
    for chunk in chunks {
        assignment.append(chunk);
    }
    assignment
        .locations
        .sort_by_key(|record| (record.person_id, record.activity_index));
    assignment
        .convergence
        .sort_by_key(|record| (record.person_id, record.activity_index));

    let summary = assignment.summary();
    tracing::info!(
        problems = summary.total,
        valid = summary.valid,
        success_rate = summary.success_rate(),
        "secondary location assignment finished"
    );
    Ok(assignment)
}

fn solve_chunk(
    persons: &[(PersonId, Vec<Trip>)],
    fixed: &FixedLocations,
    index: &CandidateIndex,
    distributions: &DistanceDistributions,
    config: &PipelineConfig,
    seed: u64,
) -> Result<PopulationAssignment, AssignmentError> {
    let mut rng = XorShiftRng::seed_from_u64(seed);
    let solver = DefaultAssignmentSolver::standard(index, distributions, &config.options);
    let mut assignment = PopulationAssignment::default();

    for (person, trips) in persons {
        for problem in person_problems(*person, trips, fixed)? {
            let result = solver.solve(&problem, &mut rng)?;
            if !result.valid {
                tracing::trace!(
                    person = %problem.person_id,
                    activity_index = problem.activity_index,
                    size = problem.size(),
                    objective = result.objective,
                    "no valid assignment found"
                );
            }
            assignment.extend(&problem, result);
        }
    }

    tracing::debug!(
        seed,
        persons = persons.len(),
        problems = assignment.convergence.len(),
        "chunk solved"
    );
    Ok(assignment)
}
