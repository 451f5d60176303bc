//! secondary-locations
//!
//! Places the non-fixed activities of a synthetic population (shopping,
//! leisure, other) at real candidate locations, so that the leg distances of
//! each person's day match distances drawn from empirical mode and travel
//! time distributions.

pub mod candidates;
pub mod config;
pub mod discretization;
pub mod distances;
pub mod error;
pub mod geometry;
pub mod io;
pub mod objective;
pub mod population;
pub mod problem;
pub mod relaxation;
pub mod solver;
pub mod traits;

pub use candidates::{Candidate, CandidateIndex};
pub use config::{PipelineConfig, SolveOptions};
pub use distances::DistanceDistributions;
pub use error::AssignmentError;
pub use geometry::Point;
pub use population::{ConvergenceSummary, PopulationAssignment, assign_population};
pub use problem::{AssignmentProblem, FixedLocations, Trip};
pub use solver::{AssignmentResult, AssignmentSolver, DefaultAssignmentSolver};
pub use traits::{LocationId, Mode, PersonId, Purpose};
