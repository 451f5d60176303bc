//! Assignment problems and their extraction from a person's trip sequence.
//!
//! A person's day is cut at every fixed activity (home, work, education). Each
//! run of variable activities between two cuts becomes one problem, anchored
//! at whichever ends are fixed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AssignmentError;
use crate::geometry::Point;
use crate::traits::{Mode, PersonId, Purpose};

/// One trip of a person's daily schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub person_id: PersonId,
    pub trip_index: usize,
    pub preceding_purpose: Purpose,
    pub following_purpose: Purpose,
    pub mode: Mode,
    /// Travel time in seconds.
    pub travel_time: f64,
}

/// A fixed-activity location of one person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedLocationRecord {
    pub person_id: PersonId,
    pub purpose: Purpose,
    pub x: f64,
    pub y: f64,
}

/// Fixed-activity coordinates per person, looked up by purpose.
#[derive(Debug, Clone, Default)]
pub struct FixedLocations {
    locations: HashMap<(PersonId, Purpose), Point>,
}

impl FixedLocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, person: PersonId, purpose: Purpose, location: Point) {
        self.locations.insert((person, purpose), location);
    }

    pub fn get(&self, person: PersonId, purpose: Purpose) -> Option<Point> {
        self.locations.get(&(person, purpose)).copied()
    }

    fn require(&self, person: PersonId, purpose: Purpose) -> Result<Point, AssignmentError> {
        self.get(person, purpose)
            .ok_or(AssignmentError::MissingFixedLocation { person, purpose })
    }
}

impl FromIterator<FixedLocationRecord> for FixedLocations {
    fn from_iter<I: IntoIterator<Item = FixedLocationRecord>>(iter: I) -> Self {
        let mut locations = FixedLocations::new();
        for record in iter {
            locations.insert(record.person_id, record.purpose, Point::new(record.x, record.y));
        }
        locations
    }
}

/// Which ends of a problem are fixed. Decides the relaxation strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchors {
    /// Both ends fixed.
    Chain { origin: Point, destination: Point },
    /// Only the preceding activity is fixed; the day ends on a variable activity.
    Origin(Point),
    /// Only the following activity is fixed; the day starts on a variable activity.
    Destination(Point),
    /// No fixed activity at all.
    Free,
}

impl Anchors {
    fn new(origin: Option<Point>, destination: Option<Point>) -> Self {
        match (origin, destination) {
            (Some(origin), Some(destination)) => Anchors::Chain {
                origin,
                destination,
            },
            (Some(origin), None) => Anchors::Origin(origin),
            (None, Some(destination)) => Anchors::Destination(destination),
            (None, None) => Anchors::Free,
        }
    }

    pub fn origin(&self) -> Option<Point> {
        match *self {
            Anchors::Chain { origin, .. } | Anchors::Origin(origin) => Some(origin),
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<Point> {
        match *self {
            Anchors::Chain { destination, .. } | Anchors::Destination(destination) => {
                Some(destination)
            }
            _ => None,
        }
    }
}

/// One contiguous run of variable activities to be located.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentProblem {
    pub person_id: PersonId,
    /// Variable purposes in visiting order.
    pub purposes: Vec<Purpose>,
    /// Mode of each leg; see [`AssignmentProblem::leg_count`].
    pub modes: Vec<Mode>,
    /// Travel time of each leg in seconds.
    pub travel_times: Vec<f64>,
    pub anchors: Anchors,
    /// Index of the first variable activity within the person's day.
    pub activity_index: usize,
}

impl AssignmentProblem {
    /// Number of activities to locate.
    pub fn size(&self) -> usize {
        self.purposes.len()
    }

    /// Legs towards a missing anchor do not exist, so a chain has `size + 1`
    /// legs, a tail `size` and a free problem `size - 1`.
    pub fn leg_count(&self) -> usize {
        match self.anchors {
            Anchors::Chain { .. } => self.size() + 1,
            Anchors::Origin(_) | Anchors::Destination(_) => self.size(),
            Anchors::Free => self.size().saturating_sub(1),
        }
    }

    pub fn origin(&self) -> Option<Point> {
        self.anchors.origin()
    }

    pub fn destination(&self) -> Option<Point> {
        self.anchors.destination()
    }
}

#[derive(Debug)]
struct OpenProblem {
    trip_index: usize,
    purposes: Vec<Purpose>,
    modes: Vec<Mode>,
    travel_times: Vec<f64>,
}

impl OpenProblem {
    fn start(trip: &Trip) -> Self {
        Self {
            trip_index: trip.trip_index,
            purposes: vec![trip.preceding_purpose],
            modes: Vec::new(),
            travel_times: Vec::new(),
        }
    }

    fn push(&mut self, trip: &Trip) {
        self.purposes.push(trip.following_purpose);
        self.modes.push(trip.mode);
        self.travel_times.push(trip.travel_time);
    }

    fn close(
        mut self,
        person: PersonId,
        fixed: &FixedLocations,
    ) -> Result<Option<AssignmentProblem>, AssignmentError> {
        let mut activity_index = self.trip_index;

        let origin = match self.purposes.first() {
            Some(&purpose) if purpose.is_fixed() => {
                self.purposes.remove(0);
                activity_index += 1;
                Some(fixed.require(person, purpose)?)
            }
            _ => None,
        };
        let destination = match self.purposes.last() {
            Some(&purpose) if purpose.is_fixed() => {
                self.purposes.pop();
                Some(fixed.require(person, purpose)?)
            }
            _ => None,
        };

        if self.purposes.is_empty() {
            return Ok(None);
        }

        Ok(Some(AssignmentProblem {
            person_id: person,
            purposes: self.purposes,
            modes: self.modes,
            travel_times: self.travel_times,
            anchors: Anchors::new(origin, destination),
            activity_index,
        }))
    }
}

/// Splits one person's trips (ordered by trip index) into assignment problems.
pub fn person_problems(
    person: PersonId,
    trips: &[Trip],
    fixed: &FixedLocations,
) -> Result<Vec<AssignmentProblem>, AssignmentError> {
    let mut problems = Vec::new();
    let mut open: Option<OpenProblem> = None;

    for trip in trips {
        let current = open.get_or_insert_with(|| OpenProblem::start(trip));
        current.push(trip);

        if trip.following_purpose.is_fixed() {
            if let Some(done) = open.take() {
                problems.extend(done.close(person, fixed)?);
            }
        }
    }

    // Tail of the day that never returned to a fixed activity.
    if let Some(done) = open {
        problems.extend(done.close(person, fixed)?);
    }

    Ok(problems)
}

/// Extracts the problems of every person in `trips`.
///
/// Trips are grouped by person and ordered by trip index before extraction;
/// the output is ordered by person id.
pub fn find_problems(
    trips: &[Trip],
    fixed: &FixedLocations,
) -> Result<Vec<AssignmentProblem>, AssignmentError> {
    let mut problems = Vec::new();
    for (person, person_trips) in group_by_person(trips) {
        problems.extend(person_problems(person, &person_trips, fixed)?);
    }
    Ok(problems)
}

/// Groups trips per person, sorted by person id, each group by trip index.
pub fn group_by_person(trips: &[Trip]) -> Vec<(PersonId, Vec<Trip>)> {
    let mut grouped: HashMap<PersonId, Vec<Trip>> = HashMap::new();
    for trip in trips {
        grouped.entry(trip.person_id).or_default().push(trip.clone());
    }

    let mut grouped: Vec<_> = grouped.into_iter().collect();
    grouped.sort_by_key(|(person, _)| *person);
    for (_, person_trips) in grouped.iter_mut() {
        person_trips.sort_by_key(|trip| trip.trip_index);
    }
    grouped
}
