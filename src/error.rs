//! Fatal configuration and input errors.
//!
//! A problem that fails to converge is not an error: it is reported through the
//! `valid` flag of its result. Everything here aborts a run.

use thiserror::Error;

use crate::traits::{Mode, PersonId, Purpose};

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("no candidate locations for activity type '{0}'")]
    NoCandidates(Purpose),
    #[error("no distance distribution for mode '{0}'")]
    MissingDistribution(Mode),
    #[error("no distance threshold configured for mode '{0}'")]
    MissingThreshold(Mode),
    #[error("person {person} has no fixed location for '{purpose}'")]
    MissingFixedLocation { person: PersonId, purpose: Purpose },
    #[error("invalid distance distribution: {0}")]
    InvalidDistribution(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
