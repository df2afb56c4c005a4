//! In memory [Reader] and [Writer], mostly useful to test what is built on top of them
use crate::entity::{Entity, EntityKind, Record};
use crate::objects::*;
use crate::reader::{Reader, Row};
use crate::stream::EntityStream;
use crate::writer::Writer;
use crate::Error;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// A feed held in memory
#[derive(Debug, Clone, Default)]
pub struct DirectReader {
    /// agency.txt
    pub agencies: Vec<Agency>,
    /// routes.txt
    pub routes: Vec<Route>,
    /// levels.txt
    pub levels: Vec<Level>,
    /// stops.txt
    pub stops: Vec<Stop>,
    /// calendar.txt
    pub calendars: Vec<Calendar>,
    /// calendar_dates.txt
    pub calendar_dates: Vec<CalendarDate>,
    /// shapes.txt
    pub shapes: Vec<Shape>,
    /// trips.txt
    pub trips: Vec<Trip>,
    /// stop_times.txt
    pub stop_times: Vec<StopTime>,
    /// frequencies.txt
    pub frequencies: Vec<Frequency>,
    /// transfers.txt
    pub transfers: Vec<Transfer>,
    /// pathways.txt
    pub pathways: Vec<Pathway>,
    /// fare_attributes.txt
    pub fare_attributes: Vec<FareAttribute>,
    /// fare_rules.txt
    pub fare_rules: Vec<FareRule>,
    /// feed_info.txt
    pub feed_infos: Vec<FeedInfo>,
    /// Any other table, by file name
    pub extra: HashMap<String, Vec<Row>>,
}

fn hash_all<T: Serialize>(hasher: &mut Sha256, objs: &[T]) -> Result<(), Error> {
    for obj in objs {
        let bytes = serde_json::to_vec(obj).map_err(|e| Error::Storage(Box::new(e)))?;
        hasher.update(bytes);
    }
    Ok(())
}

impl Reader for DirectReader {
    fn sha256(&self) -> Result<String, Error> {
        let mut hasher = Sha256::new();
        hash_all(&mut hasher, &self.agencies)?;
        hash_all(&mut hasher, &self.routes)?;
        hash_all(&mut hasher, &self.levels)?;
        hash_all(&mut hasher, &self.stops)?;
        hash_all(&mut hasher, &self.calendars)?;
        hash_all(&mut hasher, &self.calendar_dates)?;
        hash_all(&mut hasher, &self.shapes)?;
        hash_all(&mut hasher, &self.trips)?;
        hash_all(&mut hasher, &self.stop_times)?;
        hash_all(&mut hasher, &self.frequencies)?;
        hash_all(&mut hasher, &self.transfers)?;
        hash_all(&mut hasher, &self.pathways)?;
        hash_all(&mut hasher, &self.fare_attributes)?;
        hash_all(&mut hasher, &self.fare_rules)?;
        hash_all(&mut hasher, &self.feed_infos)?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn contains(&self, filename: &str) -> bool {
        match EntityKind::from_filename(filename) {
            Some(EntityKind::Agency) => !self.agencies.is_empty(),
            Some(EntityKind::Route) => !self.routes.is_empty(),
            Some(EntityKind::Level) => !self.levels.is_empty(),
            Some(EntityKind::Stop) => !self.stops.is_empty(),
            Some(EntityKind::Calendar) => !self.calendars.is_empty(),
            Some(EntityKind::CalendarDate) => !self.calendar_dates.is_empty(),
            Some(EntityKind::Shape) => !self.shapes.is_empty(),
            Some(EntityKind::Trip) => !self.trips.is_empty(),
            Some(EntityKind::StopTime) => !self.stop_times.is_empty(),
            Some(EntityKind::Frequency) => !self.frequencies.is_empty(),
            Some(EntityKind::Transfer) => !self.transfers.is_empty(),
            Some(EntityKind::Pathway) => !self.pathways.is_empty(),
            Some(EntityKind::FareAttribute) => !self.fare_attributes.is_empty(),
            Some(EntityKind::FareRule) => !self.fare_rules.is_empty(),
            Some(EntityKind::FeedInfo) => !self.feed_infos.is_empty(),
            Some(EntityKind::Extension(_)) | None => self.extra.contains_key(filename),
        }
    }

    fn agencies(&self) -> EntityStream<Agency> {
        EntityStream::from_vec(self.agencies.clone())
    }

    fn routes(&self) -> EntityStream<Route> {
        EntityStream::from_vec(self.routes.clone())
    }

    fn levels(&self) -> EntityStream<Level> {
        EntityStream::from_vec(self.levels.clone())
    }

    fn stops(&self) -> EntityStream<Stop> {
        EntityStream::from_vec(self.stops.clone())
    }

    fn calendars(&self) -> EntityStream<Calendar> {
        EntityStream::from_vec(self.calendars.clone())
    }

    fn calendar_dates(&self) -> EntityStream<CalendarDate> {
        EntityStream::from_vec(self.calendar_dates.clone())
    }

    fn shapes(&self) -> EntityStream<Shape> {
        EntityStream::from_vec(self.shapes.clone())
    }

    fn trips(&self) -> EntityStream<Trip> {
        EntityStream::from_vec(self.trips.clone())
    }

    fn stop_times(&self) -> EntityStream<StopTime> {
        EntityStream::from_vec(self.stop_times.clone())
    }

    fn stop_times_by_trip(&self) -> EntityStream<Vec<StopTime>> {
        let mut order: Vec<&str> = vec![];
        let mut groups: HashMap<&str, Vec<StopTime>> = HashMap::new();
        for st in &self.stop_times {
            let group = groups.entry(st.trip_id.as_str()).or_insert_with(|| {
                order.push(st.trip_id.as_str());
                vec![]
            });
            group.push(st.clone());
        }
        let batches = order
            .into_iter()
            .filter_map(|trip_id| groups.remove(trip_id))
            .map(|mut batch| {
                batch.sort_by_key(|st| st.stop_sequence);
                batch
            })
            .collect();
        EntityStream::from_vec(batches)
    }

    fn frequencies(&self) -> EntityStream<Frequency> {
        EntityStream::from_vec(self.frequencies.clone())
    }

    fn transfers(&self) -> EntityStream<Transfer> {
        EntityStream::from_vec(self.transfers.clone())
    }

    fn pathways(&self) -> EntityStream<Pathway> {
        EntityStream::from_vec(self.pathways.clone())
    }

    fn fare_attributes(&self) -> EntityStream<FareAttribute> {
        EntityStream::from_vec(self.fare_attributes.clone())
    }

    fn fare_rules(&self) -> EntityStream<FareRule> {
        EntityStream::from_vec(self.fare_rules.clone())
    }

    fn feed_infos(&self) -> EntityStream<FeedInfo> {
        EntityStream::from_vec(self.feed_infos.clone())
    }

    fn rows(&self, filename: &str) -> EntityStream<Row> {
        EntityStream::from_vec(self.extra.get(filename).cloned().unwrap_or_default())
    }
}

/// Keeps the written records in memory
///
/// Every record is given a sequential numeric identifier, so that rewritten
/// references can be told apart from the keys of the source feed.
#[derive(Debug, Default)]
pub struct DirectWriter {
    /// Written records with their identifier, in write order
    pub entities: Vec<(String, Entity)>,
    /// Hashes of the feed versions created
    pub feed_versions: Vec<String>,
    /// Number of calls to [Writer::add_entities]
    pub batches: usize,
    /// Was the writer closed
    pub closed: bool,
    fail_on: Option<EntityKind>,
    next_id: u64,
}

impl DirectWriter {
    /// A writer refusing every record of `kind`
    pub fn failing_on(kind: EntityKind) -> Self {
        Self {
            fail_on: Some(kind),
            ..Default::default()
        }
    }

    /// Written records of one kind
    pub fn of_kind(&self, kind: EntityKind) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|(_, e)| e.kind() == kind)
            .map(|(_, e)| e)
            .collect()
    }

    /// Identifier given to the `n`-th written record of `kind`
    pub fn id_of(&self, kind: EntityKind, n: usize) -> Option<&str> {
        self.entities
            .iter()
            .filter(|(_, e)| e.kind() == kind)
            .nth(n)
            .map(|(id, _)| id.as_str())
    }
}

impl Writer for DirectWriter {
    fn close(&mut self) -> Result<(), Error> {
        self.closed = true;
        Ok(())
    }

    fn add_entity(&mut self, entity: &Entity) -> Result<String, Error> {
        let kind = entity.kind();
        if self.fail_on == Some(kind) {
            return Err(Error::Storage(
                format!("refusing to write {}", kind.filename()).into(),
            ));
        }
        self.next_id += 1;
        let id = self.next_id.to_string();
        self.entities.push((id.clone(), entity.clone()));
        Ok(id)
    }

    fn add_entities(&mut self, entities: &[Entity]) -> Result<Vec<String>, Error> {
        self.batches += 1;
        entities.iter().map(|e| self.add_entity(e)).collect()
    }

    fn create_feed_version(&mut self, reader: &dyn Reader) -> Result<i64, Error> {
        self.feed_versions.push(reader.sha256()?);
        Ok(self.feed_versions.len() as i64)
    }
}
