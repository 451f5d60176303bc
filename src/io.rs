//! CSV readers for the solver's input tables.
//!
//! Columns are matched by header name, so extra columns are ignored. Unknown
//! purposes or modes fail deserialization and abort the read.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::candidates::Candidate;
use crate::error::AssignmentError;
use crate::problem::{FixedLocationRecord, FixedLocations, Trip};

fn read_records<T, R>(reader: R) -> Result<Vec<T>, AssignmentError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut records = Vec::new();
    for record in csv::Reader::from_reader(reader).deserialize() {
        records.push(record?);
    }
    Ok(records)
}

fn open(path: &Path) -> Result<BufReader<File>, AssignmentError> {
    Ok(BufReader::new(File::open(path)?))
}

/// `activity_type, x, y, location_id`
pub fn read_candidates(path: impl AsRef<Path>) -> Result<Vec<Candidate>, AssignmentError> {
    let candidates = read_candidates_from(open(path.as_ref())?)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        candidates = candidates.len(),
        "read candidates"
    );
    Ok(candidates)
}

pub fn read_candidates_from(reader: impl Read) -> Result<Vec<Candidate>, AssignmentError> {
    read_records(reader)
}

/// `person_id, trip_index, preceding_purpose, following_purpose, mode, travel_time`
pub fn read_trips(path: impl AsRef<Path>) -> Result<Vec<Trip>, AssignmentError> {
    let trips = read_trips_from(open(path.as_ref())?)?;
    tracing::debug!(path = %path.as_ref().display(), trips = trips.len(), "read trips");
    Ok(trips)
}

pub fn read_trips_from(reader: impl Read) -> Result<Vec<Trip>, AssignmentError> {
    read_records(reader)
}

/// `person_id, purpose, x, y`, one row per fixed activity of a person.
pub fn read_fixed_locations(path: impl AsRef<Path>) -> Result<FixedLocations, AssignmentError> {
    read_fixed_locations_from(open(path.as_ref())?)
}

pub fn read_fixed_locations_from(reader: impl Read) -> Result<FixedLocations, AssignmentError> {
    let records: Vec<FixedLocationRecord> = read_records(reader)?;
    if let Some(record) = records.iter().find(|record| !record.purpose.is_fixed()) {
        return Err(AssignmentError::InvalidConfig(format!(
            "person {} has a fixed location for non-fixed purpose '{}'",
            record.person_id, record.purpose
        )));
    }
    Ok(records.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::traits::{LocationId, Mode, PersonId, Purpose};

    #[test]
    fn test_read_candidates() {
        let data = "activity_type,x,y,location_id\n\
                    shop,10.5,20.0,s1\n\
                    leisure,0,0,park\n";
        let candidates = read_candidates_from(data.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].purpose, Purpose::Shop);
        assert_eq!(candidates[0].location(), Point::new(10.5, 20.0));
        assert_eq!(candidates[1].location_id, LocationId::new("park"));
    }

    #[test]
    fn test_read_trips_ignores_extra_columns() {
        let data = "person_id,trip_index,preceding_purpose,following_purpose,\
                    mode,travel_time,weight\n\
                    7,0,home,shop,car_passenger,600,1.5\n\
                    7,1,shop,home,walk,300.5,1.5\n";
        let trips = read_trips_from(data.as_bytes()).unwrap();
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].person_id, PersonId(7));
        assert_eq!(trips[0].mode, Mode::CarPassenger);
        assert_eq!(trips[1].following_purpose, Purpose::Home);
        assert_eq!(trips[1].travel_time, 300.5);
    }

    #[test]
    fn test_unknown_purpose_is_fatal() {
        let data = "activity_type,x,y,location_id\nspa,0,0,x\n";
        assert!(matches!(
            read_candidates_from(data.as_bytes()),
            Err(AssignmentError::Csv(_))
        ));
    }

    #[test]
    fn test_read_fixed_locations() {
        let data = "person_id,purpose,x,y\n1,home,0,0\n1,work,5000,0\n";
        let fixed = read_fixed_locations_from(data.as_bytes()).unwrap();
        assert_eq!(fixed.get(PersonId(1), Purpose::Work), Some(Point::new(5000.0, 0.0)));
        assert_eq!(fixed.get(PersonId(1), Purpose::Education), None);

        let data = "person_id,purpose,x,y\n1,shop,0,0\n";
        assert!(read_fixed_locations_from(data.as_bytes()).is_err());
    }
}
