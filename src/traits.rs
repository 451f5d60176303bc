//! Core domain vocabulary and solver capability traits.
//!
//! The traits are the seams of the assignment loop: the solver is generic over
//! how leg distances are drawn and how they are turned into coordinates, so
//! tests and callers can plug in their own implementations.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::distances::DistanceSample;
use crate::error::AssignmentError;
use crate::problem::AssignmentProblem;
use crate::relaxation::RelaxationResult;

/// Unique identifier of a synthetic person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub u64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a candidate location, unique within its activity type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Activity purpose at either end of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Home,
    Work,
    Education,
    Shop,
    Leisure,
    Other,
}

impl Purpose {
    /// Fixed purposes are located upstream and act as anchors.
    pub fn is_fixed(self) -> bool {
        matches!(self, Purpose::Home | Purpose::Work | Purpose::Education)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Home => "home",
            Purpose::Work => "work",
            Purpose::Education => "education",
            Purpose::Shop => "shop",
            Purpose::Leisure => "leisure",
            Purpose::Other => "other",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport mode of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Car,
    CarPassenger,
    Pt,
    Bike,
    Walk,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Car, Mode::CarPassenger, Mode::Pt, Mode::Bike, Mode::Walk];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Car => "car",
            Mode::CarPassenger => "car_passenger",
            Mode::Pt => "pt",
            Mode::Bike => "bike",
            Mode::Walk => "walk",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Draws one distance per leg of a problem.
pub trait DistanceSampler {
    fn sample<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        rng: &mut R,
    ) -> Result<DistanceSample, AssignmentError>;
}

/// Turns sampled leg distances into continuous coordinates, one per variable
/// activity of the problem.
pub trait RelaxationSolver {
    fn relax<R: Rng + ?Sized>(
        &self,
        problem: &AssignmentProblem,
        distances: &[f64],
        rng: &mut R,
    ) -> Result<RelaxationResult, AssignmentError>;
}
