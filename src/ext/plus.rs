//! The `plus` extension: identifiers used by realtime feeds for the stops of a trip
use crate::extension::Extension;
use crate::filters::Filter;
use gtfs_structures::{
    update_key, Entity, EntityError, EntityKey, EntityKind, EntityStream, Error,
    ExtensionRecord, Reader, Record, Reference, ResolveKey,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::any::Any;

const REALTIME_STOPS: EntityKind = EntityKind::Extension("realtime_stops.txt");

/// A line of realtime_stops.txt
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RealtimeStop {
    pub trip_id: String,
    pub stop_id: String,
    #[serde(default)]
    pub realtime_stop_id: String,
}

impl Record for RealtimeStop {
    fn kind(&self) -> EntityKind {
        REALTIME_STOPS
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::composite([self.trip_id.as_str(), self.stop_id.as_str()])
    }

    fn references(&self) -> Vec<Reference<'_>> {
        vec![
            Reference {
                field: "trip_id",
                kind: EntityKind::Trip,
                key: &self.trip_id,
            },
            Reference {
                field: "stop_id",
                kind: EntityKind::Stop,
                key: &self.stop_id,
            },
        ]
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_key(keys, EntityKind::Trip, "trip_id", &mut self.trip_id, &mut errors);
        update_key(keys, EntityKind::Stop, "stop_id", &mut self.stop_id, &mut errors);
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        if self.realtime_stop_id.trim().is_empty() {
            vec![EntityError::RequiredFieldMissing("realtime_stop_id")]
        } else {
            vec![]
        }
    }
}

impl ExtensionRecord for RealtimeStop {
    fn columns(&self) -> Vec<(&'static str, String)> {
        vec![
            ("trip_id", self.trip_id.clone()),
            ("stop_id", self.stop_id.clone()),
            ("realtime_stop_id", self.realtime_stop_id.clone()),
        ]
    }

    fn set_column(&mut self, column: &str, value: &str) -> Result<(), EntityError> {
        let field = match column {
            "trip_id" => &mut self.trip_id,
            "stop_id" => &mut self.stop_id,
            "realtime_stop_id" => &mut self.realtime_stop_id,
            _ => return Err(EntityError::invalid_field(column, value, "unknown column")),
        };
        *field = value.to_owned();
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ExtensionRecord> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A realtime identifier must designate a single stop of a trip
#[derive(Debug, Default)]
pub struct RealtimeStopFilter {
    seen: FxHashMap<String, FxHashSet<String>>,
}

impl Filter for RealtimeStopFilter {
    fn name(&self) -> &str {
        "realtime_stops"
    }

    fn filter(&mut self, entity: &mut Entity) -> Vec<EntityError> {
        let Entity::Extension(record) = entity else {
            return vec![];
        };
        let Some(stop) = record.as_any().downcast_ref::<RealtimeStop>() else {
            return vec![];
        };
        if stop.realtime_stop_id.is_empty() {
            return vec![];
        }
        let fresh = self
            .seen
            .entry(stop.trip_id.clone())
            .or_default()
            .insert(stop.realtime_stop_id.clone());
        if fresh {
            vec![]
        } else {
            vec![EntityError::invalid_field(
                "realtime_stop_id",
                &stop.realtime_stop_id,
                format!("already used in trip {}", stop.trip_id),
            )]
        }
    }
}

pub struct Plus;

impl Extension for Plus {
    fn name(&self) -> &str {
        "plus"
    }

    fn kinds(&self) -> Vec<EntityKind> {
        vec![REALTIME_STOPS]
    }

    fn filters(&self) -> Vec<Box<dyn Filter>> {
        vec![Box::new(RealtimeStopFilter::default())]
    }

    fn entities(&self, reader: &dyn Reader, kind: EntityKind) -> EntityStream<Entity> {
        if kind != REALTIME_STOPS {
            return EntityStream::empty();
        }
        let file_name = kind.filename();
        let rows = reader.rows(file_name);
        EntityStream::from_iter(Iterator::map(rows, move |row| {
            let row = row?;
            row.deserialize::<RealtimeStop>()
                .map(|stop| Entity::Extension(Box::new(stop)))
                .map_err(|source| Error::InvalidRow {
                    file_name: file_name.to_owned(),
                    source,
                })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_structures::{DirectReader, Row};

    fn realtime_stop(trip: &str, stop: &str, rt: &str) -> Entity {
        Entity::Extension(Box::new(RealtimeStop {
            trip_id: trip.into(),
            stop_id: stop.into(),
            realtime_stop_id: rt.into(),
        }))
    }

    #[test]
    fn rows_are_read_as_records() {
        let mut reader = DirectReader::default();
        reader.extra.insert(
            "realtime_stops.txt".into(),
            vec![
                Row::from_pairs(&[("trip_id", "t1"), ("stop_id", "s1"), ("realtime_stop_id", "r1")]),
                Row::from_pairs(&[("trip_id", "t1"), ("stop_id", "s2")]),
                Row::from_pairs(&[("stop_id", "s3")]),
            ],
        );
        let items: Vec<_> = Plus.entities(&reader, REALTIME_STOPS).collect();
        assert_eq!(3, items.len());

        let first = items[0].as_ref().unwrap();
        assert_eq!("t1:s1", first.entity_key().to_string());
        assert!(first.errors().is_empty());
        assert_eq!(2, first.references().len());

        let second = items[1].as_ref().unwrap();
        assert_eq!(
            vec![EntityError::RequiredFieldMissing("realtime_stop_id")],
            second.errors()
        );

        assert!(items[2].as_ref().unwrap_err().is_row_error());
    }

    #[test]
    fn realtime_ids_are_unique_per_trip() {
        let mut filter = RealtimeStopFilter::default();
        assert!(filter.filter(&mut realtime_stop("t1", "s1", "a")).is_empty());
        assert!(filter.filter(&mut realtime_stop("t2", "s1", "a")).is_empty());
        assert_eq!(1, filter.filter(&mut realtime_stop("t1", "s2", "a")).len());
    }

    #[test]
    fn columns_can_be_set() {
        let mut entity = realtime_stop("t1", "s1", "a");
        entity.set_column("realtime_stop_id", "b").unwrap();
        assert!(entity.set_column("platform", "2").is_err());
        match &entity {
            Entity::Extension(e) => {
                let stop = e.as_any().downcast_ref::<RealtimeStop>().unwrap();
                assert_eq!("b", stop.realtime_stop_id);
            }
            _ => panic!("not an extension record"),
        }
    }
}
