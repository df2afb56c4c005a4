//! The contract of a feed source
use crate::error::EntityError;
use crate::objects::*;
use crate::stream::EntityStream;
use crate::Error;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// An untyped line of a table, used for the tables contributed by extensions
#[derive(Debug, Clone)]
pub struct Row {
    headers: Arc<csv::StringRecord>,
    record: csv::StringRecord,
}

impl Row {
    /// Line `record` of a table whose header is `headers`
    pub fn new(headers: Arc<csv::StringRecord>, record: csv::StringRecord) -> Self {
        Self { headers, record }
    }

    /// Builds a row from `(column, value)` pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            headers: Arc::new(pairs.iter().map(|(c, _)| *c).collect()),
            record: pairs.iter().map(|(_, v)| *v).collect(),
        }
    }

    /// Value of a column, `None` if the column does not exist
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.record.get(i))
    }

    /// The column names of the table
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    /// Reads the row as a serde structure
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, EntityError> {
        self.record
            .deserialize(Some(&self.headers))
            .map_err(|e| EntityError::Parse(e.to_string()))
    }
}

/// Source of a feed
///
/// Every method returns a fresh stream, so a feed can be read several times (once to
/// select what to extract, once to copy it). A table absent from the feed yields an
/// empty stream; a fatal problem yields a stream whose first item is an error.
pub trait Reader {
    /// Prepares the reader, checking that the feed can be read
    fn open(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Releases what the reader holds
    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Hash identifying the content of the feed
    fn sha256(&self) -> Result<String, Error>;

    /// Does the feed contain this file
    fn contains(&self, filename: &str) -> bool;

    /// agency.txt
    fn agencies(&self) -> EntityStream<Agency>;
    /// routes.txt
    fn routes(&self) -> EntityStream<Route>;
    /// levels.txt
    fn levels(&self) -> EntityStream<Level>;
    /// stops.txt
    fn stops(&self) -> EntityStream<Stop>;
    /// calendar.txt
    fn calendars(&self) -> EntityStream<Calendar>;
    /// calendar_dates.txt
    fn calendar_dates(&self) -> EntityStream<CalendarDate>;
    /// shapes.txt, with the points grouped by shape
    fn shapes(&self) -> EntityStream<Shape>;
    /// trips.txt
    fn trips(&self) -> EntityStream<Trip>;
    /// stop_times.txt, line by line
    fn stop_times(&self) -> EntityStream<StopTime>;
    /// stop_times.txt, grouped by trip and ordered by `stop_sequence`
    fn stop_times_by_trip(&self) -> EntityStream<Vec<StopTime>>;
    /// frequencies.txt
    fn frequencies(&self) -> EntityStream<Frequency>;
    /// transfers.txt
    fn transfers(&self) -> EntityStream<Transfer>;
    /// pathways.txt
    fn pathways(&self) -> EntityStream<Pathway>;
    /// fare_attributes.txt
    fn fare_attributes(&self) -> EntityStream<FareAttribute>;
    /// fare_rules.txt
    fn fare_rules(&self) -> EntityStream<FareRule>;
    /// feed_info.txt
    fn feed_infos(&self) -> EntityStream<FeedInfo>;
    /// Any table, as untyped rows
    fn rows(&self, filename: &str) -> EntityStream<Row>;
}
