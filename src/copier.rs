//! Copies a feed from a [Reader] to a [Writer], table after table
//!
//! Tables are copied in an order where every referenced record is written before the
//! records referencing it: agencies, routes, levels, stops (stations, then the other
//! stops, then boarding areas), calendars, calendar dates, shapes, trips, stop times
//! (one batch per trip), frequencies, transfers, pathways, fares, feed information and
//! finally the tables of the extensions.
//!
//! Every record goes through the filters, then has its references rewritten with the
//! identifiers given by the writer, then is validated. A record failing one of these
//! steps is not written, unless the options say to tolerate it. A writer failure stops
//! the whole copy.
use crate::entity_map::EntityMap;
use crate::error::CopyError;
use crate::extension::{get_extension, Extension};
use crate::filters::{
    ApplyParentTimezoneFilter, BasicRouteTypeFilter, Filter, NormalizeTimezoneFilter,
    SimplifyShapeFilter,
};
use crate::marker::MarkSet;
use crate::result::{CopyResult, IssueClass};
use crate::stop_times;
use chrono::NaiveDate;
use derivative::Derivative;
use gtfs_structures::{
    Calendar, Entity, EntityError, EntityKey, EntityKind, EntityStream, Error, LocationType,
    Reader, Record, Stop, StopTime, Writer,
};
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Derivative, Debug, Clone)]
#[derivative(Default)]
pub struct Options {
    /// Write the records rejected by a filter or breaking a rule, with warnings
    pub allow_entity_errors: bool,
    /// Write the records with unknown references, the references are left empty
    pub allow_reference_errors: bool,
    pub normalize_timezones: bool,
    pub use_basic_route_types: bool,
    /// Create a calendar for the services only defined in calendar_dates.txt
    pub normalize_service_ids: bool,
    pub interpolate_stop_times: bool,
    /// Douglas–Peucker tolerance, in degrees
    pub simplify_shapes: Option<f64>,
    /// Names of the extensions to enable
    pub extensions: Vec<String>,
    /// Issues kept in the result per kind, the counts are never limited
    #[derivative(Default(value = "1000"))]
    pub error_limit: usize,
}

/// One copy session
///
/// The filters hold state about the records already seen, a copier is used for one copy only.
pub struct Copier<'a> {
    reader: &'a dyn Reader,
    writer: &'a mut dyn Writer,
    options: Options,
    filters: Vec<Box<dyn Filter>>,
    extensions: Vec<Box<dyn Extension>>,
    marker: Option<MarkSet>,
    emap: EntityMap,
    result: CopyResult,
}

impl<'a> Copier<'a> {
    pub fn new(
        reader: &'a dyn Reader,
        writer: &'a mut dyn Writer,
        options: Options,
    ) -> Result<Self, CopyError> {
        let mut filters: Vec<Box<dyn Filter>> = vec![];
        if options.use_basic_route_types {
            filters.push(Box::new(BasicRouteTypeFilter));
        }
        if options.normalize_timezones {
            filters.push(Box::new(NormalizeTimezoneFilter));
            filters.push(Box::new(ApplyParentTimezoneFilter::default()));
        }
        if let Some(tolerance) = options.simplify_shapes {
            filters.push(Box::new(SimplifyShapeFilter::new(tolerance)));
        }
        let extensions = options
            .extensions
            .iter()
            .map(|name| get_extension(name).ok_or_else(|| CopyError::UnknownExtension(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut copier = Self {
            reader,
            writer,
            filters,
            extensions: vec![],
            marker: None,
            emap: EntityMap::new(),
            result: CopyResult::new(options.error_limit),
            options,
        };
        for extension in extensions {
            copier.add_extension(extension);
        }
        Ok(copier)
    }

    /// Runs after the filters already installed
    pub fn add_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn add_extension(&mut self, extension: Box<dyn Extension>) {
        info!("Using extension {}", extension.name());
        self.filters.extend(extension.filters());
        self.extensions.push(extension);
    }

    pub fn extensions(&self) -> &[Box<dyn Extension>] {
        &self.extensions
    }

    /// Only the records of `marks` will be copied
    pub fn set_marker(&mut self, marks: MarkSet) {
        self.marker = Some(marks);
    }

    pub fn copy(mut self) -> Result<CopyResult, CopyError> {
        let reader = self.reader;
        self.copy_kind(EntityKind::Agency, reader.agencies())?;
        self.copy_kind(EntityKind::Route, reader.routes())?;
        self.copy_kind(EntityKind::Level, reader.levels())?;
        self.copy_stops()?;

        self.copy_stream(EntityKind::Calendar, reader.calendars(), |_| true, true)?;
        if self.options.normalize_service_ids {
            self.create_missing_calendars()?;
        }
        self.log_phase(EntityKind::Calendar);

        self.copy_kind(EntityKind::CalendarDate, reader.calendar_dates())?;
        self.copy_kind(EntityKind::Shape, reader.shapes())?;
        self.copy_kind(EntityKind::Trip, reader.trips())?;
        self.copy_stop_times()?;
        self.copy_kind(EntityKind::Frequency, reader.frequencies())?;
        self.copy_kind(EntityKind::Transfer, reader.transfers())?;
        self.copy_kind(EntityKind::Pathway, reader.pathways())?;
        self.copy_kind(EntityKind::FareAttribute, reader.fare_attributes())?;
        self.copy_kind(EntityKind::FareRule, reader.fare_rules())?;
        self.copy_kind(EntityKind::FeedInfo, reader.feed_infos())?;

        let extensions = std::mem::take(&mut self.extensions);
        for extension in &extensions {
            for kind in extension.kinds() {
                self.copy_kind(kind, extension.entities(reader, kind))?;
            }
        }

        self.result.entity_map = self.emap;
        Ok(self.result)
    }

    fn copy_kind<T: Into<Entity>>(
        &mut self,
        kind: EntityKind,
        stream: EntityStream<T>,
    ) -> Result<(), CopyError> {
        self.copy_stream(kind, stream, |_| true, true)?;
        self.log_phase(kind);
        Ok(())
    }

    /// Copies the records of `stream` accepted by `keep`
    fn copy_stream<T, F>(
        &mut self,
        kind: EntityKind,
        mut stream: EntityStream<T>,
        keep: F,
        report_load_errors: bool,
    ) -> Result<(), CopyError>
    where
        T: Into<Entity>,
        F: Fn(&T) -> bool,
    {
        while let Some(item) = stream.next() {
            let record = match item {
                Ok(record) => record,
                Err(e) if e.is_row_error() => {
                    if report_load_errors {
                        self.load_error(kind, e);
                    }
                    continue;
                }
                Err(source) => {
                    stream.close();
                    return Err(CopyError::Read {
                        file_name: kind.filename(),
                        source,
                    });
                }
            };
            if !keep(&record) {
                continue;
            }
            if let Err(e) = self.copy_entity(record.into()) {
                stream.close();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stations come first as the other stops reference them, and boarding areas last
    /// as their parent is a platform
    fn copy_stops(&mut self) -> Result<(), CopyError> {
        let is_station = |s: &Stop| s.location_type == LocationType::StopArea;
        let is_boarding_area = |s: &Stop| s.location_type == LocationType::BoardingArea;
        let reader = self.reader;
        self.copy_stream(EntityKind::Stop, reader.stops(), is_station, true)?;
        self.copy_stream(
            EntityKind::Stop,
            reader.stops(),
            |s| !is_station(s) && !is_boarding_area(s),
            false,
        )?;
        self.copy_stream(EntityKind::Stop, reader.stops(), is_boarding_area, false)?;
        self.log_phase(EntityKind::Stop);
        Ok(())
    }

    /// A calendar without weekdays for every service only found in calendar_dates.txt,
    /// spanning from its first to its last date
    fn create_missing_calendars(&mut self) -> Result<(), CopyError> {
        let mut calendars = FxHashSet::default();
        scan(EntityKind::Calendar, self.reader.calendars(), |c: Calendar| {
            calendars.insert(c.id);
        })?;

        let mut order = vec![];
        let mut spans: FxHashMap<String, (NaiveDate, NaiveDate)> = FxHashMap::default();
        scan(EntityKind::CalendarDate, self.reader.calendar_dates(), |d| {
            if calendars.contains(&d.service_id) {
                return;
            }
            let span = spans.entry(d.service_id.clone()).or_insert_with(|| {
                order.push(d.service_id.clone());
                (d.date, d.date)
            });
            span.0 = span.0.min(d.date);
            span.1 = span.1.max(d.date);
        })?;

        for service_id in order {
            if let Some((start, end)) = spans.remove(&service_id) {
                debug!("creating calendar {} from {} to {}", service_id, start, end);
                self.copy_entity(Calendar::without_weekdays(service_id, start, end).into())?;
            }
        }
        Ok(())
    }

    fn copy_stop_times(&mut self) -> Result<(), CopyError> {
        let mut batches = self.reader.stop_times_by_trip();
        while let Some(item) = batches.next() {
            let batch = match item {
                Ok(batch) => batch,
                Err(e) if e.is_row_error() => {
                    self.load_error(EntityKind::StopTime, e);
                    continue;
                }
                Err(source) => {
                    batches.close();
                    return Err(CopyError::Read {
                        file_name: EntityKind::StopTime.filename(),
                        source,
                    });
                }
            };
            if let Err(e) = self.copy_trip_stop_times(batch) {
                batches.close();
                return Err(e);
            }
        }
        self.log_phase(EntityKind::StopTime);
        Ok(())
    }

    /// The stop times of one trip are checked together and written in one call
    ///
    /// The filters run first so that the schedule checked is the one written.
    fn copy_trip_stop_times(&mut self, batch: Vec<StopTime>) -> Result<(), CopyError> {
        let kind = EntityKind::StopTime;
        let mut keys: Vec<EntityKey> = vec![];
        let mut stop_times: Vec<StopTime> = vec![];
        for st in batch {
            let key = st.entity_key();
            if !self.admit(kind, &key) {
                continue;
            }
            if keys.contains(&key) || self.emap.contains(kind, key.as_str()) {
                self.reject_duplicate(kind, &key);
                continue;
            }
            let mut entity = Entity::StopTime(st);
            if !self.apply_filters(&key, &mut entity) {
                continue;
            }
            if let Entity::StopTime(st) = entity {
                keys.push(key);
                stop_times.push(st);
            }
        }
        let Some(trip_id) = stop_times.first().map(|st| st.trip_id.clone()) else {
            return Ok(());
        };

        if self.options.interpolate_stop_times {
            stop_times::interpolate(&mut stop_times);
        }
        let errors = stop_times::validate(&stop_times);
        if !errors.is_empty() {
            if !self.options.allow_entity_errors {
                debug!("rejecting the stop times of trip {}: {:?}", trip_id, errors);
                self.result.counts(kind).rejected_by_validation += stop_times.len();
                for error in errors {
                    self.result
                        .add_error(kind, &trip_id, IssueClass::ValidationError, error);
                }
                return Ok(());
            }
            for error in errors {
                self.result
                    .add_warning(kind, &trip_id, IssueClass::ValidationError, error);
            }
        }

        let mut written = vec![];
        let mut entities = vec![];
        for (key, st) in keys.into_iter().zip(stop_times) {
            if let Some(entity) = self.resolve(&key, st.into()) {
                written.push(key);
                entities.push(entity);
            }
        }
        if entities.is_empty() {
            return Ok(());
        }
        let ids = self
            .writer
            .add_entities(&entities)
            .map_err(|source| CopyError::Write { kind, source })?;
        if ids.len() != written.len() {
            return Err(CopyError::Write {
                kind,
                source: Error::Storage(
                    format!(
                        "{} identifiers returned for {} stop times of trip {}",
                        ids.len(),
                        written.len(),
                        trip_id
                    )
                    .into(),
                ),
            });
        }
        self.result.counts(kind).written += ids.len();
        for (key, id) in written.into_iter().zip(ids) {
            self.emap.set(kind, key, id);
        }
        Ok(())
    }

    fn copy_entity(&mut self, entity: Entity) -> Result<(), CopyError> {
        let kind = entity.kind();
        let key = entity.entity_key();
        if !self.admit(kind, &key) {
            return Ok(());
        }
        let Some(entity) = self.prepare(&key, entity) else {
            return Ok(());
        };
        let id = self
            .writer
            .add_entity(&entity)
            .map_err(|source| CopyError::Write { kind, source })?;
        self.emap.set(kind, key, id);
        self.result.counts(kind).written += 1;
        Ok(())
    }

    /// Counts the record, false if it is not part of the extraction
    fn admit(&mut self, kind: EntityKind, key: &EntityKey) -> bool {
        self.result.counts(kind).read += 1;
        match &self.marker {
            Some(marks) if !marks.contains(kind, key.as_str()) => {
                self.result.counts(kind).skipped_by_mark += 1;
                false
            }
            _ => true,
        }
    }

    /// Filters the record, rewrites its references and validates it
    ///
    /// `None` if the record must not be written.
    fn prepare(&mut self, key: &EntityKey, mut entity: Entity) -> Option<Entity> {
        let kind = entity.kind();
        if self.emap.contains(kind, key.as_str()) {
            self.reject_duplicate(kind, key);
            return None;
        }
        if !self.apply_filters(key, &mut entity) {
            return None;
        }
        self.resolve(key, entity)
    }

    /// Runs every filter, false if the record is rejected
    fn apply_filters(&mut self, key: &EntityKey, entity: &mut Entity) -> bool {
        let kind = entity.kind();
        let mut rejections = vec![];
        for filter in self.filters.iter_mut() {
            rejections.extend(filter.filter(entity));
        }
        if rejections.is_empty() {
            return true;
        }
        let display_key = key.to_string();
        if !self.options.allow_entity_errors {
            debug!("{} {} rejected by a filter: {:?}", kind, display_key, rejections);
            self.result.counts(kind).rejected_by_filter += 1;
            for cause in rejections {
                self.result
                    .add_error(kind, &display_key, IssueClass::FilterRejection, cause);
            }
            return false;
        }
        for cause in rejections {
            self.result
                .add_warning(kind, &display_key, IssueClass::FilterRejection, cause);
        }
        true
    }

    /// Rewrites the references of a filtered record and validates it
    fn resolve(&mut self, key: &EntityKey, mut entity: Entity) -> Option<Entity> {
        let kind = entity.kind();
        let display_key = key.to_string();
        let reference_errors = entity.update_keys(&self.emap);
        if !reference_errors.is_empty() {
            if !self.options.allow_reference_errors {
                debug!("{} {} has unknown references: {:?}", kind, display_key, reference_errors);
                self.result.counts(kind).rejected_by_reference += 1;
                for cause in reference_errors {
                    self.result
                        .add_error(kind, &display_key, IssueClass::ReferenceError, cause);
                }
                return None;
            }
            for cause in reference_errors {
                self.result
                    .add_warning(kind, &display_key, IssueClass::ReferenceError, cause);
            }
        }

        let errors = entity.errors();
        if !errors.is_empty() {
            if !self.options.allow_entity_errors {
                debug!("{} {} is invalid: {:?}", kind, display_key, errors);
                self.result.counts(kind).rejected_by_validation += 1;
                for cause in errors {
                    self.result
                        .add_error(kind, &display_key, IssueClass::ValidationError, cause);
                }
                return None;
            }
            for cause in errors {
                self.result
                    .add_warning(kind, &display_key, IssueClass::ValidationError, cause);
            }
        }
        for cause in entity.warnings() {
            self.result
                .add_warning(kind, &display_key, IssueClass::ValidationWarning, cause);
        }
        Some(entity)
    }

    /// Duplicates are never written, whatever the options, a key has a single identifier
    fn reject_duplicate(&mut self, kind: EntityKind, key: &EntityKey) {
        let display_key = key.to_string();
        debug!("{} {} is a duplicate", kind, display_key);
        self.result.counts(kind).rejected_by_validation += 1;
        self.result.add_error(
            kind,
            &display_key,
            IssueClass::ValidationError,
            EntityError::DuplicateKey(display_key.clone()),
        );
    }

    fn load_error(&mut self, kind: EntityKind, error: Error) {
        debug!("unreadable row in {}: {}", kind, error);
        self.result.counts(kind).load_errors += 1;
        self.result
            .add_error(kind, "", IssueClass::LoadError, load_error_cause(error));
    }

    fn log_phase(&self, kind: EntityKind) {
        let summary = self.result.summary(kind);
        if summary.read == 0 && summary.load_errors == 0 {
            return;
        }
        info!(
            "{}: {} read, {} written, {} skipped, {} rejected",
            kind,
            summary.read,
            summary.written,
            summary.skipped_by_mark,
            summary.rejected_by_filter + summary.rejected_by_reference + summary.rejected_by_validation
        );
    }
}

/// Reads a whole table, skipping the unreadable rows
fn scan<T>(
    kind: EntityKind,
    mut stream: EntityStream<T>,
    mut f: impl FnMut(T),
) -> Result<(), CopyError> {
    while let Some(item) = stream.next() {
        match item {
            Ok(record) => f(record),
            Err(e) if e.is_row_error() => {}
            Err(source) => {
                stream.close();
                return Err(CopyError::Read {
                    file_name: kind.filename(),
                    source,
                });
            }
        }
    }
    Ok(())
}

fn load_error_cause(error: Error) -> EntityError {
    match error {
        Error::InvalidRow { source, .. } => source,
        other => {
            let mut message = other.to_string();
            let mut source = std::error::Error::source(&other);
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = std::error::Error::source(cause);
            }
            EntityError::Parse(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::SetterFilter;
    use crate::marker::{EntityRef, Marker};
    use crate::testutil::{self, *};
    use gtfs_structures::{CsvReader, DirectReader, DirectWriter, Route, RouteType, Shape, ShapePoint};

    fn copy(reader: &dyn Reader, writer: &mut DirectWriter, options: Options) -> CopyResult {
        Copier::new(reader, writer, options).unwrap().copy().unwrap()
    }

    fn basic() -> CsvReader {
        CsvReader::new("gtfs-structure/fixtures/basic").unwrap()
    }

    fn trips(writer: &DirectWriter) -> Vec<&gtfs_structures::Trip> {
        writer
            .of_kind(EntityKind::Trip)
            .into_iter()
            .filter_map(|e| match e {
                Entity::Trip(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn stops(writer: &DirectWriter) -> Vec<&Stop> {
        writer
            .of_kind(EntityKind::Stop)
            .into_iter()
            .filter_map(|e| match e {
                Entity::Stop(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn copy_basic_feed() {
        let mut writer = DirectWriter::default();
        let options = Options {
            normalize_service_ids: true,
            extensions: vec!["plus".into()],
            ..Default::default()
        };
        let result = copy(&basic(), &mut writer, options);

        let expected = [
            (EntityKind::Agency, 1),
            (EntityKind::Route, 3),
            (EntityKind::Level, 2),
            (EntityKind::Stop, 5),
            (EntityKind::Calendar, 2),
            (EntityKind::CalendarDate, 3),
            (EntityKind::Shape, 2),
            (EntityKind::Trip, 2),
            (EntityKind::StopTime, 5),
            (EntityKind::Frequency, 1),
            (EntityKind::Transfer, 2),
            (EntityKind::Pathway, 1),
            (EntityKind::FareAttribute, 1),
            (EntityKind::FareRule, 1),
            (EntityKind::FeedInfo, 1),
            (EntityKind::Extension("realtime_stops.txt"), 2),
        ];
        for (kind, count) in expected {
            assert_eq!(count, result.written(kind), "{}", kind);
            assert_eq!(count, writer.of_kind(kind).len(), "{}", kind);
            assert_eq!(count, result.summary(kind).read, "{}", kind);
        }
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(5, result.entity_map.len(EntityKind::Stop));
        assert_eq!(2, writer.batches);
    }

    #[test]
    fn references_are_rewritten() {
        let mut writer = DirectWriter::default();
        let result = copy(&basic(), &mut writer, Options::default());

        let route_id = result.entity_map.get(EntityKind::Route, "1").unwrap();
        assert_eq!(Some(route_id), writer.id_of(EntityKind::Route, 0));
        let trip = trips(&writer).into_iter().find(|t| t.id == "trip1").unwrap();
        assert_eq!(route_id, trip.route_id);
        assert_eq!(result.entity_map.get(EntityKind::Calendar, "service1").unwrap(), trip.service_id);
        assert_eq!(
            result.entity_map.get(EntityKind::Shape, "A_shp"),
            trip.shape_id.as_deref()
        );
    }

    #[test]
    fn referenced_records_are_written_first() {
        let mut writer = DirectWriter::default();
        let options = Options {
            normalize_service_ids: true,
            extensions: vec!["plus".into()],
            ..Default::default()
        };
        copy(&basic(), &mut writer, options);

        let mut written: FxHashSet<(EntityKind, &str)> = FxHashSet::default();
        for (id, entity) in &writer.entities {
            for reference in entity.references() {
                assert!(
                    written.contains(&(reference.kind, reference.key)),
                    "{} {} references {} {} before it is written",
                    entity.kind(),
                    entity.entity_key(),
                    reference.kind,
                    reference.key
                );
            }
            written.insert((entity.kind(), id.as_str()));
        }
    }

    #[test]
    fn services_only_in_calendar_dates() {
        let mut writer = DirectWriter::default();
        let result = copy(&basic(), &mut writer, Options::default());
        assert_eq!(1, result.written(EntityKind::Calendar));
        assert_eq!(2, result.summary(EntityKind::CalendarDate).rejected_by_reference);
        assert_eq!(1, result.summary(EntityKind::Trip).rejected_by_reference);
        assert_eq!(2, result.summary(EntityKind::StopTime).rejected_by_reference);
        assert_eq!(3, result.written(EntityKind::StopTime));

        let mut writer = DirectWriter::default();
        let options = Options {
            normalize_service_ids: true,
            ..Default::default()
        };
        copy(&basic(), &mut writer, options);
        let generated = writer
            .of_kind(EntityKind::Calendar)
            .into_iter()
            .find_map(|e| match e {
                Entity::Calendar(c) if c.id == "service2" => Some(c.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            Calendar::without_weekdays("service2", date(2017, 1, 1), date(2017, 1, 5)),
            generated
        );
    }

    #[test]
    fn missing_calendar_is_a_reference_error() {
        let feed = DirectReader {
            agencies: vec![agency("A")],
            routes: vec![route("R", "A")],
            trips: vec![testutil::trip("T", "R", "missing")],
            ..Default::default()
        };

        let mut writer = DirectWriter::default();
        let result = copy(&feed, &mut writer, Options::default());
        assert_eq!(0, result.written(EntityKind::Trip));
        assert_eq!(1, result.summary(EntityKind::Trip).rejected_by_reference);
        let errors: Vec<_> = result.errors_of(EntityKind::Trip).collect();
        assert_eq!(1, errors.len());
        assert_eq!(IssueClass::ReferenceError, errors[0].class);
        assert_eq!("T", errors[0].entity_key);
        assert_eq!(
            EntityError::InvalidReference {
                field: "service_id",
                value: "missing".into()
            },
            errors[0].cause
        );

        let mut writer = DirectWriter::default();
        let options = Options {
            allow_reference_errors: true,
            ..Default::default()
        };
        let result = copy(&feed, &mut writer, options);
        assert_eq!(1, result.written(EntityKind::Trip));
        assert_eq!("", trips(&writer)[0].service_id);
        assert!(result.errors.is_empty());
        assert_eq!(1, result.warnings.len());
        assert_eq!(IssueClass::ReferenceError, result.warnings[0].class);
    }

    #[test]
    fn stations_and_boarding_areas_order() {
        let boarding_area = Stop {
            id: "B".into(),
            location_type: LocationType::BoardingArea,
            parent_station: Some("P".into()),
            ..Default::default()
        };
        let feed = DirectReader {
            stops: vec![boarding_area, platform("P", "ST"), station("ST"), stop("S")],
            ..Default::default()
        };
        let mut writer = DirectWriter::default();
        let result = copy(&feed, &mut writer, Options::default());

        let order: Vec<&str> = stops(&writer).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(vec!["ST", "P", "S", "B"], order);
        assert_eq!(4, result.summary(EntityKind::Stop).read);
        let platform = stops(&writer)[1];
        assert_eq!(
            result.entity_map.get(EntityKind::Stop, "ST"),
            platform.parent_station.as_deref()
        );
    }

    #[test]
    fn write_failure_stops_the_copy() {
        let feed = testutil::two_trips();
        let mut writer = DirectWriter::failing_on(EntityKind::Trip);
        let result = Copier::new(&feed, &mut writer, Options::default())
            .unwrap()
            .copy();
        assert!(matches!(result, Err(CopyError::Write { kind: EntityKind::Trip, .. })));
        assert_eq!(2, writer.of_kind(EntityKind::Route).len());
        assert!(writer.of_kind(EntityKind::StopTime).is_empty());
        assert!(writer.of_kind(EntityKind::FeedInfo).is_empty());
    }

    #[test]
    fn extraction_copies_the_marked_records() {
        let feed = testutil::two_trips();
        let marks = Marker::build(&feed, &[])
            .unwrap()
            .mark([EntityRef::new(EntityKind::Trip, "T1")]);
        let mut writer = DirectWriter::default();
        let mut copier = Copier::new(&feed, &mut writer, Options::default()).unwrap();
        copier.set_marker(marks);
        let result = copier.copy().unwrap();

        assert_eq!(1, result.written(EntityKind::Agency));
        assert_eq!(1, result.written(EntityKind::Route));
        assert_eq!(1, result.written(EntityKind::Calendar));
        assert_eq!(1, result.written(EntityKind::Trip));
        assert_eq!(2, result.written(EntityKind::StopTime));
        assert_eq!(1, result.written(EntityKind::FeedInfo));
        let ids: Vec<&str> = stops(&writer).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(vec!["S1", "S2"], ids);
        assert_eq!(1, result.summary(EntityKind::Trip).skipped_by_mark);
        assert_eq!(3, result.summary(EntityKind::Stop).skipped_by_mark);
        assert_eq!(3, result.summary(EntityKind::StopTime).skipped_by_mark);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn extraction_of_the_basic_feed() {
        let feed = basic();
        let mut writer = DirectWriter::default();
        let mut copier = Copier::new(&feed, &mut writer, Options::default()).unwrap();
        let marks = Marker::build(&feed, copier.extensions())
            .unwrap()
            .mark([EntityRef::new(EntityKind::Route, "1")]);
        copier.set_marker(marks);
        let result = copier.copy().unwrap();

        assert_eq!(1, result.written(EntityKind::Route));
        assert_eq!(1, result.written(EntityKind::Trip));
        assert_eq!(3, result.written(EntityKind::StopTime));
        assert_eq!(4, result.written(EntityKind::Stop));
        assert_eq!(1, result.written(EntityKind::CalendarDate));
        // fare rules only require the route, they are not part of it
        assert_eq!(0, result.written(EntityKind::FareRule));
        assert_eq!(0, result.written(EntityKind::Transfer));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    #[test]
    fn filter_rejection() {
        let mut feed = testutil::two_trips();
        feed.routes[1].route_type = RouteType::Extended(1100);

        let mut writer = DirectWriter::default();
        let options = Options {
            use_basic_route_types: true,
            ..Default::default()
        };
        let result = copy(&feed, &mut writer, options.clone());
        assert_eq!(1, result.written(EntityKind::Route));
        assert_eq!(1, result.summary(EntityKind::Route).rejected_by_filter);
        assert_eq!(1, result.summary(EntityKind::Trip).rejected_by_reference);
        assert_eq!(
            IssueClass::FilterRejection,
            result.errors_of(EntityKind::Route).next().unwrap().class
        );

        let mut writer = DirectWriter::default();
        let options = Options {
            allow_entity_errors: true,
            ..options
        };
        let result = copy(&feed, &mut writer, options);
        assert_eq!(2, result.written(EntityKind::Route));
        assert_eq!(2, result.written(EntityKind::Trip));
        assert_eq!(1, result.summary(EntityKind::Route).warnings);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn timezones_are_normalized_and_inherited() {
        let mut feed = testutil::two_trips();
        feed.agencies[0].timezone = "US/Pacific".into();
        feed.stops[3].timezone = Some("us/eastern".into());

        let mut writer = DirectWriter::default();
        let options = Options {
            normalize_timezones: true,
            ..Default::default()
        };
        copy(&feed, &mut writer, options);
        match writer.of_kind(EntityKind::Agency)[0] {
            Entity::Agency(a) => assert_eq!("America/Los_Angeles", a.timezone),
            e => panic!("unexpected {:?}", e),
        }
        let timezones: FxHashMap<&str, Option<&str>> = stops(&writer)
            .into_iter()
            .map(|s| (s.id.as_str(), s.timezone.as_deref()))
            .collect();
        assert_eq!(Some("America/New_York"), timezones["ST"]);
        assert_eq!(Some("America/New_York"), timezones["S4"]);
        assert_eq!(Some("America/Los_Angeles"), timezones["S1"]);
    }

    #[test]
    fn stop_times_interpolation() {
        let mut feed = testutil::two_trips();
        feed.stop_times[3].arrival_time = None;
        feed.stop_times[3].departure_time = None;

        let mut writer = DirectWriter::default();
        copy(&feed, &mut writer, Options::default());
        let middle = |writer: &DirectWriter| {
            writer
                .of_kind(EntityKind::StopTime)
                .into_iter()
                .find_map(|e| match e {
                    Entity::StopTime(st) if st.stop_id == "S3" => Some(st.arrival_time),
                    _ => None,
                })
                .unwrap()
        };
        assert_eq!(None, middle(&writer));

        let mut writer = DirectWriter::default();
        let options = Options {
            interpolate_stop_times: true,
            ..Default::default()
        };
        copy(&feed, &mut writer, options);
        assert_eq!(Some(9 * 3600 + 600), middle(&writer));
    }

    #[test]
    fn invalid_trip_schedule_rejects_all_its_stop_times() {
        let mut feed = testutil::two_trips();
        feed.stop_times[1].arrival_time = Some(7 * 3600);
        feed.stop_times[1].departure_time = Some(7 * 3600);

        let mut writer = DirectWriter::default();
        let result = copy(&feed, &mut writer, Options::default());
        assert_eq!(3, result.written(EntityKind::StopTime));
        assert_eq!(2, result.summary(EntityKind::StopTime).rejected_by_validation);
        let errors: Vec<_> = result.errors_of(EntityKind::StopTime).collect();
        assert_eq!(1, errors.len());
        assert_eq!("T1", errors[0].entity_key);

        let mut writer = DirectWriter::default();
        let options = Options {
            allow_entity_errors: true,
            ..Default::default()
        };
        let result = copy(&feed, &mut writer, options);
        assert_eq!(5, result.written(EntityKind::StopTime));
        assert_eq!(1, result.summary(EntityKind::StopTime).warnings);
    }

    #[test]
    fn schedules_are_checked_after_the_filters() {
        let feed = testutil::two_trips();
        let mut writer = DirectWriter::default();
        let mut copier = Copier::new(&feed, &mut writer, Options::default()).unwrap();
        let mut setter = SetterFilter::new();
        setter.add_value("stop_times.txt", "T1:2", "arrival_time", "07:00:00");
        copier.add_filter(Box::new(setter));
        let result = copier.copy().unwrap();
        assert_eq!(3, result.written(EntityKind::StopTime));
        assert_eq!(2, result.summary(EntityKind::StopTime).rejected_by_validation);

        let mut feed = testutil::two_trips();
        feed.stop_times[1].arrival_time = Some(7 * 3600);
        feed.stop_times[1].departure_time = Some(7 * 3600);
        let mut writer = DirectWriter::default();
        let mut copier = Copier::new(&feed, &mut writer, Options::default()).unwrap();
        let mut setter = SetterFilter::new();
        setter.add_value("stop_times.txt", "T1:2", "arrival_time", "08:20:00");
        setter.add_value("stop_times.txt", "T1:2", "departure_time", "08:20:00");
        copier.add_filter(Box::new(setter));
        let result = copier.copy().unwrap();
        assert_eq!(5, result.written(EntityKind::StopTime));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    /// Loses the last identifier of every batch
    struct LossyWriter(DirectWriter);

    impl Writer for LossyWriter {
        fn add_entity(&mut self, entity: &Entity) -> Result<String, Error> {
            self.0.add_entity(entity)
        }

        fn add_entities(&mut self, entities: &[Entity]) -> Result<Vec<String>, Error> {
            let mut ids = self.0.add_entities(entities)?;
            ids.pop();
            Ok(ids)
        }
    }

    #[test]
    fn missing_batch_identifiers_stop_the_copy() {
        let feed = testutil::two_trips();
        let mut writer = LossyWriter(DirectWriter::default());
        let result = Copier::new(&feed, &mut writer, Options::default())
            .unwrap()
            .copy();
        assert!(matches!(
            result,
            Err(CopyError::Write {
                kind: EntityKind::StopTime,
                ..
            })
        ));
        assert!(writer.0.of_kind(EntityKind::Frequency).is_empty());
        assert!(writer.0.of_kind(EntityKind::FeedInfo).is_empty());
    }

    #[test]
    fn extraction_keeps_the_single_agency_without_id() {
        let mut feed = testutil::two_trips();
        feed.agencies[0].id = None;
        for route in feed.routes.iter_mut() {
            route.agency_id = None;
        }
        let marks = Marker::build(&feed, &[])
            .unwrap()
            .mark([EntityRef::new(EntityKind::Trip, "T1")]);
        let mut writer = DirectWriter::default();
        let mut copier = Copier::new(&feed, &mut writer, Options::default()).unwrap();
        copier.set_marker(marks);
        let result = copier.copy().unwrap();

        assert_eq!(1, result.written(EntityKind::Agency));
        assert_eq!(1, result.written(EntityKind::Route));
        assert_eq!(2, result.written(EntityKind::StopTime));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    #[test]
    fn issues_are_limited_but_counted() {
        let feed = DirectReader {
            trips: (0..5)
                .map(|i| testutil::trip(&format!("T{}", i), "R", "WK"))
                .collect(),
            ..Default::default()
        };
        let mut writer = DirectWriter::default();
        let options = Options {
            error_limit: 2,
            ..Default::default()
        };
        let result = copy(&feed, &mut writer, options);
        assert_eq!(5, result.summary(EntityKind::Trip).rejected_by_reference);
        assert_eq!(2, result.errors_of(EntityKind::Trip).count());
    }

    #[test]
    fn unreadable_rows_are_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        for file in std::fs::read_dir("gtfs-structure/fixtures/basic").unwrap() {
            let path = file.unwrap().path();
            std::fs::copy(&path, dir.path().join(path.file_name().unwrap())).unwrap();
        }
        std::fs::write(
            dir.path().join("routes.txt"),
            "route_id,agency_id,route_short_name,route_long_name,route_desc,route_type,route_url,route_color,route_text_color,route_sort_order\n\
             1,1,1,Sorano - Gare,,3,,000000,FFFFFF,1\n\
             default_colors,1,2,Airport,,3,,,,\n\
             shuttle,1,N,Night shuttle,,bus,,,,\n",
        )
        .unwrap();

        let feed = CsvReader::new(dir.path()).unwrap();
        let mut writer = DirectWriter::default();
        let result = copy(&feed, &mut writer, Options::default());
        assert_eq!(2, result.written(EntityKind::Route));
        assert_eq!(1, result.summary(EntityKind::Route).load_errors);
        assert_eq!(2, result.summary(EntityKind::Route).read);
        let error = result.errors_of(EntityKind::Route).next().unwrap();
        assert_eq!(IssueClass::LoadError, error.class);
        assert_eq!(1, result.written(EntityKind::Trip));
    }

    #[test]
    fn columns_can_be_overridden() {
        let feed = testutil::two_trips();
        let mut setter = SetterFilter::new();
        setter.add_value("stops.txt", "S1", "stop_name", "Central");
        setter.add_value("stops.txt", "S3", "stop_color", "red");

        let mut writer = DirectWriter::default();
        let mut copier = Copier::new(&feed, &mut writer, Options::default()).unwrap();
        copier.add_filter(Box::new(setter));
        let result = copier.copy().unwrap();

        let s1 = stops(&writer).into_iter().find(|s| s.id == "S1").unwrap();
        assert_eq!("Central", s1.name);
        assert_eq!(1, result.summary(EntityKind::Stop).rejected_by_filter);
        assert_eq!(4, result.written(EntityKind::Stop));
    }

    #[test]
    fn unknown_extension() {
        let feed = DirectReader::default();
        let mut writer = DirectWriter::default();
        let options = Options {
            extensions: vec!["nope".into()],
            ..Default::default()
        };
        assert!(matches!(
            Copier::new(&feed, &mut writer, options),
            Err(CopyError::UnknownExtension(name)) if name == "nope"
        ));
    }

    #[test]
    fn shapes_are_simplified() {
        let point = |sequence: usize, lon: f64| ShapePoint {
            shape_id: "SH".into(),
            latitude: 37.0,
            longitude: lon,
            sequence,
            dist_traveled: None,
        };
        let feed = DirectReader {
            shapes: vec![Shape::from_points(
                "SH",
                vec![point(1, -122.0), point(2, -122.1), point(3, -122.2)],
            )],
            ..Default::default()
        };
        let mut writer = DirectWriter::default();
        let options = Options {
            simplify_shapes: Some(0.0001),
            ..Default::default()
        };
        copy(&feed, &mut writer, options);
        match writer.of_kind(EntityKind::Shape)[0] {
            Entity::Shape(shape) => assert_eq!(2, shape.points.len()),
            e => panic!("unexpected {:?}", e),
        }
    }

    #[test]
    fn duplicates_are_rejected() {
        let feed = DirectReader {
            agencies: vec![agency("A"), agency("A")],
            routes: vec![
                route("R", "A"),
                Route {
                    long_name: "Again".into(),
                    ..route("R", "A")
                },
            ],
            ..Default::default()
        };
        let mut writer = DirectWriter::default();
        let options = Options {
            allow_entity_errors: true,
            ..Default::default()
        };
        let result = copy(&feed, &mut writer, options);
        assert_eq!(1, result.written(EntityKind::Agency));
        assert_eq!(1, result.written(EntityKind::Route));
        assert_eq!(1, result.summary(EntityKind::Route).rejected_by_validation);
        assert_eq!(
            EntityError::DuplicateKey("A".into()),
            result.errors_of(EntityKind::Agency).next().unwrap().cause
        );
    }

    #[test]
    fn copies_are_repeatable() {
        let options = Options {
            normalize_service_ids: true,
            ..Default::default()
        };
        let mut first = DirectWriter::default();
        let mut second = DirectWriter::default();
        let a = copy(&basic(), &mut first, options.clone());
        let b = copy(&basic(), &mut second, options);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        let ids = |w: &DirectWriter| -> Vec<String> {
            w.entities.iter().map(|(id, e)| format!("{}={}", e.entity_key(), id)).collect()
        };
        assert_eq!(ids(&first), ids(&second));
    }
}
