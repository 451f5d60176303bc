//! Leg distance sampling from empirical mode/travel-time distributions.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AssignmentError;
use crate::problem::{Anchors, AssignmentProblem};
use crate::traits::{DistanceSampler, Mode};

/// Sampled leg distances for one problem.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceSample {
    pub distances: Vec<f64>,
    /// Whether the sampler converged to a feasible set.
    pub valid: bool,
    pub iterations: usize,
}

/// Distance quantiles for trips up to a travel-time bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceBucket {
    /// Upper travel-time bound in seconds (inclusive).
    pub upper_bound: f64,
    /// `(distance, cumulative probability)` pairs, sorted by distance.
    pub quantiles: Vec<(f64, f64)>,
}

impl DistanceBucket {
    /// Inverse-CDF draw, interpolating between the bracketing quantiles.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.inverse_cdf(rng.gen_range(0.0..1.0))
    }

    fn inverse_cdf(&self, u: f64) -> f64 {
        let i = self.quantiles.partition_point(|&(_, cdf)| cdf < u);
        if i == 0 {
            return self.quantiles[0].0;
        }
        if i == self.quantiles.len() {
            return self.quantiles[i - 1].0;
        }

        let (d0, c0) = self.quantiles[i - 1];
        let (d1, c1) = self.quantiles[i];
        if c1 <= c0 {
            return d1;
        }
        d0 + (u - c0) / (c1 - c0) * (d1 - d0)
    }

    fn validate(&self, mode: Mode) -> Result<(), AssignmentError> {
        let invalid = |reason: &str| -> Result<(), AssignmentError> {
            Err(AssignmentError::InvalidDistribution(format!(
                "{} bucket <= {}s: {}",
                mode, self.upper_bound, reason
            )))
        };

        if self.quantiles.is_empty() {
            return invalid("no quantiles");
        }
        if self
            .quantiles
            .iter()
            .any(|&(d, c)| !d.is_finite() || d < 0.0 || !(0.0..=1.0).contains(&c))
        {
            return invalid("distances must be finite and non-negative, probabilities in [0, 1]");
        }
        if self
            .quantiles
            .windows(2)
            .any(|pair| pair[1].0 < pair[0].0 || pair[1].1 < pair[0].1)
        {
            return invalid("quantiles must be non-decreasing");
        }
        Ok(())
    }
}

/// Buckets of one mode, ordered by travel-time bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeDistribution {
    pub buckets: Vec<DistanceBucket>,
}

impl ModeDistribution {
    /// First bucket covering `travel_time`; the last one for longer trips.
    pub fn bucket(&self, travel_time: f64) -> &DistanceBucket {
        let i = self
            .buckets
            .partition_point(|bucket| bucket.upper_bound < travel_time);
        &self.buckets[i.min(self.buckets.len() - 1)]
    }

    fn validate(&self, mode: Mode) -> Result<(), AssignmentError> {
        if self.buckets.is_empty() {
            return Err(AssignmentError::InvalidDistribution(format!(
                "{} has no buckets",
                mode
            )));
        }
        if self
            .buckets
            .windows(2)
            .any(|pair| pair[1].upper_bound <= pair[0].upper_bound)
        {
            return Err(AssignmentError::InvalidDistribution(format!(
                "{} bucket bounds must be strictly ascending",
                mode
            )));
        }
        self.buckets.iter().try_for_each(|bucket| bucket.validate(mode))
    }
}

/// A surveyed trip used to derive distance distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedTrip {
    pub mode: Mode,
    pub travel_time: f64,
    pub distance: f64,
    pub weight: f64,
}

/// Empirical distance distributions for every mode. Deserialization runs the
/// same validation as [`DistanceDistributions::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Mode, ModeDistribution>",
    into = "BTreeMap<Mode, ModeDistribution>"
)]
pub struct DistanceDistributions {
    modes: BTreeMap<Mode, ModeDistribution>,
}

impl TryFrom<BTreeMap<Mode, ModeDistribution>> for DistanceDistributions {
    type Error = AssignmentError;

    fn try_from(modes: BTreeMap<Mode, ModeDistribution>) -> Result<Self, Self::Error> {
        Self::new(modes)
    }
}

impl From<DistanceDistributions> for BTreeMap<Mode, ModeDistribution> {
    fn from(distributions: DistanceDistributions) -> Self {
        distributions.modes
    }
}

impl DistanceDistributions {
    pub fn new(modes: BTreeMap<Mode, ModeDistribution>) -> Result<Self, AssignmentError> {
        let distributions = Self { modes };
        distributions.validate()?;
        Ok(distributions)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AssignmentError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Derives distributions from weighted survey trips. Trips of each mode are
    /// sorted by travel time and cut into buckets of at least
    /// `min_observations` trips; each bucket keeps the weighted CDF of its
    /// distances.
    pub fn from_observations(
        observations: &[ObservedTrip],
        min_observations: usize,
    ) -> Result<Self, AssignmentError> {
        if min_observations == 0 {
            return Err(AssignmentError::InvalidConfig(
                "min_observations must be positive".to_string(),
            ));
        }

        let mut by_mode: BTreeMap<Mode, Vec<&ObservedTrip>> = BTreeMap::new();
        for observation in observations {
            by_mode.entry(observation.mode).or_default().push(observation);
        }

        let mut modes = BTreeMap::new();
        for (mode, mut trips) in by_mode {
            trips.sort_by(|a, b| a.travel_time.total_cmp(&b.travel_time));
            let buckets = split_buckets(&trips, min_observations)
                .into_iter()
                .map(weighted_bucket)
                .collect();
            modes.insert(mode, ModeDistribution { buckets });
        }

        Self::new(modes)
    }

    pub fn get(&self, mode: Mode) -> Result<&ModeDistribution, AssignmentError> {
        self.modes
            .get(&mode)
            .ok_or(AssignmentError::MissingDistribution(mode))
    }

    pub fn modes(&self) -> impl Iterator<Item = Mode> + '_ {
        self.modes.keys().copied()
    }

    fn validate(&self) -> Result<(), AssignmentError> {
        self.modes
            .iter()
            .try_for_each(|(mode, distribution)| distribution.validate(*mode))
    }
}

fn split_buckets<'a>(
    trips: &[&'a ObservedTrip],
    min_observations: usize,
) -> Vec<Vec<&'a ObservedTrip>> {
    let mut buckets: Vec<Vec<&ObservedTrip>> = Vec::new();
    let mut current = Vec::new();

    for (i, trip) in trips.iter().enumerate() {
        current.push(*trip);
        let boundary = trips
            .get(i + 1)
            .is_none_or(|next| next.travel_time > trip.travel_time);
        if current.len() >= min_observations && boundary {
            buckets.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        match buckets.last_mut() {
            Some(last) => last.extend(current),
            None => buckets.push(current),
        }
    }
    buckets
}

fn weighted_bucket(mut trips: Vec<&ObservedTrip>) -> DistanceBucket {
    let upper_bound = trips
        .iter()
        .map(|trip| trip.travel_time)
        .fold(f64::NEG_INFINITY, f64::max);
    trips.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let total: f64 = trips.iter().map(|trip| trip.weight.max(0.0)).sum();
    let mut cumulative = 0.0;
    let quantiles = trips
        .iter()
        .enumerate()
        .map(|(i, trip)| {
            cumulative += trip.weight.max(0.0);
            let cdf = if total > 0.0 {
                cumulative / total
            } else {
                (i + 1) as f64 / trips.len() as f64
            };
            (trip.distance, cdf.min(1.0))
        })
        .collect();

    DistanceBucket {
        upper_bound,
        quantiles,
    }
}

/// Draws each leg independently from the bucket matching its mode and travel
/// time. Never checks geometry, so the sample is always reported valid.
#[derive(Debug, Clone, Copy)]
pub struct EmpiricalDistanceSampler<'a> {
    distributions: &'a DistanceDistributions,
}

impl<'a> EmpiricalDistanceSampler<'a> {
    pub fn new(distributions: &'a DistanceDistributions) -> Self {
        Self { distributions }
    }
}

impl DistanceSampler for EmpiricalDistanceSampler<'_> {
    fn sample<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        rng: &mut R,
    ) -> Result<DistanceSample, AssignmentError> {
        let distances = problem
            .modes
            .iter()
            .zip(&problem.travel_times)
            .map(|(&mode, &travel_time)| -> Result<f64, AssignmentError> {
                Ok(self.distributions.get(mode)?.bucket(travel_time).sample(rng))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DistanceSample {
            distances,
            valid: true,
            iterations: 0,
        })
    }
}

/// How far a set of leg distances is from being able to connect two points
/// `direct_distance` apart. Zero means feasible.
///
/// Every leg must be bridgeable by the rest of the chain plus the direct
/// connection, and the chain as a whole must reach at least as far as the
/// direct distance.
pub fn feasibility_error(distances: &[f64], direct_distance: f64) -> f64 {
    let total: f64 = distances.iter().sum();
    let leg_violation = distances
        .iter()
        .map(|&d| d - (direct_distance + (total - d)))
        .fold(0.0, f64::max);
    let reach_violation = direct_distance - total;
    leg_violation.max(reach_violation).max(0.0)
}

pub fn is_feasible(distances: &[f64], direct_distance: f64) -> bool {
    feasibility_error(distances, direct_distance) == 0.0
}

/// Redraws distances from a base sampler until they can geometrically connect
/// both anchors of a chain. Tails and free problems have no such constraint
/// and accept the first draw.
#[derive(Debug, Clone, Copy)]
pub struct FeasibleDistanceSampler<S> {
    base: S,
    maximum_iterations: usize,
}

impl<S: DistanceSampler> FeasibleDistanceSampler<S> {
    pub fn new(base: S, maximum_iterations: usize) -> Self {
        Self {
            base,
            maximum_iterations: maximum_iterations.max(1),
        }
    }
}

impl<S: DistanceSampler> DistanceSampler for FeasibleDistanceSampler<S> {
    fn sample<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        rng: &mut R,
    ) -> Result<DistanceSample, AssignmentError> {
        let Anchors::Chain {
            origin,
            destination,
        } = problem.anchors
        else {
            let mut sample = self.base.sample(problem, rng)?;
            sample.valid = true;
            sample.iterations = 1;
            return Ok(sample);
        };

        let direct_distance = origin.distance(destination);
        let mut best: Option<(f64, Vec<f64>)> = None;

        for iteration in 1..=self.maximum_iterations {
            let distances = self.base.sample(problem, rng)?.distances;
            let error = feasibility_error(&distances, direct_distance);

            if error == 0.0 {
                return Ok(DistanceSample {
                    distances,
                    valid: true,
                    iterations: iteration,
                });
            }
            if best.as_ref().is_none_or(|(best_error, _)| error < *best_error) {
                best = Some((error, distances));
            }
        }

        let distances = best.map(|(_, distances)| distances).unwrap_or_default();
        Ok(DistanceSample {
            distances,
            valid: false,
            iterations: self.maximum_iterations,
        })
    }
}
