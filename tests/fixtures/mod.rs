//! Test fixtures for secondary-locations.
//!
//! Provides builders for daily trip schedules, candidate grids and simple
//! distance distributions.

#![allow(dead_code)]

use std::collections::BTreeMap;

use secondary_locations::distances::{DistanceBucket, ModeDistribution};
use secondary_locations::{
    Candidate, CandidateIndex, DistanceDistributions, FixedLocations, Mode, PersonId, Point,
    Purpose, Trip,
};

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builder for one person's day. Trip indices follow insertion order.
#[derive(Clone, Debug)]
pub struct DayBuilder {
    person: PersonId,
    current: Purpose,
    mode: Mode,
    travel_time: f64,
    trips: Vec<Trip>,
}

impl DayBuilder {
    /// Day starting at `start`, with walk trips of ten minutes by default.
    pub fn new(person: u64, start: Purpose) -> Self {
        Self {
            person: PersonId(person),
            current: start,
            mode: Mode::Walk,
            travel_time: 600.0,
            trips: Vec::new(),
        }
    }

    /// Mode and travel time for the following trips.
    pub fn by(mut self, mode: Mode, travel_time: f64) -> Self {
        self.mode = mode;
        self.travel_time = travel_time;
        self
    }

    pub fn to(mut self, purpose: Purpose) -> Self {
        self.trips.push(Trip {
            person_id: self.person,
            trip_index: self.trips.len(),
            preceding_purpose: self.current,
            following_purpose: purpose,
            mode: self.mode,
            travel_time: self.travel_time,
        });
        self.current = purpose;
        self
    }

    pub fn build(self) -> Vec<Trip> {
        self.trips
    }
}

/// Candidates of every given purpose on a square grid around the origin.
pub fn candidate_grid(purposes: &[Purpose], half_extent: f64, step: f64) -> CandidateIndex {
    let steps = (2.0 * half_extent / step).round() as usize;
    let mut candidates = Vec::new();
    for &purpose in purposes {
        for i in 0..=steps {
            for j in 0..=steps {
                let x = -half_extent + i as f64 * step;
                let y = -half_extent + j as f64 * step;
                candidates.push(Candidate::new(
                    purpose,
                    format!("{}-{}-{}", purpose, i, j),
                    Point::new(x, y),
                ));
            }
        }
    }
    CandidateIndex::new(candidates)
}

/// Every mode draws uniformly from `[min, max]` metres, whatever the travel time.
pub fn uniform_distributions(min: f64, max: f64) -> DistanceDistributions {
    let modes = Mode::ALL
        .iter()
        .map(|&mode| {
            let bucket = DistanceBucket {
                upper_bound: 7200.0,
                quantiles: vec![(min, 0.0), (max, 1.0)],
            };
            (mode, ModeDistribution { buckets: vec![bucket] })
        })
        .collect::<BTreeMap<_, _>>();
    DistanceDistributions::new(modes).expect("uniform distributions are valid")
}

/// Fixed locations from `(person, purpose, x, y)` rows.
pub fn fixed_locations(rows: &[(u64, Purpose, f64, f64)]) -> FixedLocations {
    let mut fixed = FixedLocations::new();
    for &(person, purpose, x, y) in rows {
        fixed.insert(PersonId(person), purpose, Point::new(x, y));
    }
    fixed
}
