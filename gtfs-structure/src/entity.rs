//! Record kinds and the capabilities every record exposes to the copier
//!
//! The kind-specific behaviour (natural key, foreign keys, validation) lives behind
//! the [Record] trait. [Entity] is the closed set of record kinds known by this crate,
//! plus an escape hatch for the kinds contributed by extensions.
use crate::error::EntityError;
use crate::objects::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::borrow::{Borrow, Cow};
use std::fmt;

/// The tables of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EntityKind {
    /// [Agency], agency.txt
    Agency,
    /// [Route], routes.txt
    Route,
    /// [Level], levels.txt
    Level,
    /// [Stop], stops.txt
    Stop,
    /// [Calendar], calendar.txt
    Calendar,
    /// [CalendarDate], calendar_dates.txt
    CalendarDate,
    /// [Shape], shapes.txt
    Shape,
    /// [Trip], trips.txt
    Trip,
    /// [StopTime], stop_times.txt
    StopTime,
    /// [Frequency], frequencies.txt
    Frequency,
    /// [Transfer], transfers.txt
    Transfer,
    /// [Pathway], pathways.txt
    Pathway,
    /// [FareAttribute], fare_attributes.txt
    FareAttribute,
    /// [FareRule], fare_rules.txt
    FareRule,
    /// [FeedInfo], feed_info.txt
    FeedInfo,
    /// A kind contributed by an extension, named after its file
    Extension(&'static str),
}

impl EntityKind {
    /// The kinds of the base specification, in the order they are copied
    pub const BASE: [EntityKind; 15] = [
        EntityKind::Agency,
        EntityKind::Route,
        EntityKind::Level,
        EntityKind::Stop,
        EntityKind::Calendar,
        EntityKind::CalendarDate,
        EntityKind::Shape,
        EntityKind::Trip,
        EntityKind::StopTime,
        EntityKind::Frequency,
        EntityKind::Transfer,
        EntityKind::Pathway,
        EntityKind::FareAttribute,
        EntityKind::FareRule,
        EntityKind::FeedInfo,
    ];

    /// Name of the file holding this kind
    pub fn filename(&self) -> &'static str {
        match self {
            EntityKind::Agency => "agency.txt",
            EntityKind::Route => "routes.txt",
            EntityKind::Level => "levels.txt",
            EntityKind::Stop => "stops.txt",
            EntityKind::Calendar => "calendar.txt",
            EntityKind::CalendarDate => "calendar_dates.txt",
            EntityKind::Shape => "shapes.txt",
            EntityKind::Trip => "trips.txt",
            EntityKind::StopTime => "stop_times.txt",
            EntityKind::Frequency => "frequencies.txt",
            EntityKind::Transfer => "transfers.txt",
            EntityKind::Pathway => "pathways.txt",
            EntityKind::FareAttribute => "fare_attributes.txt",
            EntityKind::FareRule => "fare_rules.txt",
            EntityKind::FeedInfo => "feed_info.txt",
            EntityKind::Extension(filename) => filename,
        }
    }

    /// Finds a base kind from its file name
    pub fn from_filename(filename: &str) -> Option<EntityKind> {
        Self::BASE.iter().copied().find(|k| k.filename() == filename)
    }

    /// Name of the table used by relational backends
    pub fn table_name(&self) -> Cow<'static, str> {
        match self {
            EntityKind::Agency => "gtfs_agencies".into(),
            EntityKind::Route => "gtfs_routes".into(),
            EntityKind::Level => "gtfs_levels".into(),
            EntityKind::Stop => "gtfs_stops".into(),
            EntityKind::Calendar => "gtfs_calendars".into(),
            EntityKind::CalendarDate => "gtfs_calendar_dates".into(),
            EntityKind::Shape => "gtfs_shapes".into(),
            EntityKind::Trip => "gtfs_trips".into(),
            EntityKind::StopTime => "gtfs_stop_times".into(),
            EntityKind::Frequency => "gtfs_frequencies".into(),
            EntityKind::Transfer => "gtfs_transfers".into(),
            EntityKind::Pathway => "gtfs_pathways".into(),
            EntityKind::FareAttribute => "gtfs_fare_attributes".into(),
            EntityKind::FareRule => "gtfs_fare_rules".into(),
            EntityKind::FeedInfo => "gtfs_feed_infos".into(),
            EntityKind::Extension(filename) => {
                format!("ext_{}", filename.trim_end_matches(".txt")).into()
            }
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.filename())
    }
}

const KEY_SEPARATOR: char = '\u{1f}';

/// Natural key of a record, as given in the source feed
///
/// Most kinds are identified by a single column. Kinds without an identifier column
/// (e.g. [Transfer]) use a composite key made of several columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityKey(String);

impl EntityKey {
    /// Key made of a single column
    pub fn new(key: impl Into<String>) -> Self {
        EntityKey(key.into())
    }

    /// Key made of several columns
    pub fn composite<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut key = String::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(part);
        }
        EntityKey(key)
    }

    /// Raw representation, the one used for lookups
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The columns composing the key
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.0.split(KEY_SEPARATOR)
    }
}

impl Borrow<str> for EntityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityKey {
    fn from(key: &str) -> Self {
        EntityKey::new(key)
    }
}

impl From<String> for EntityKey {
    fn from(key: String) -> Self {
        EntityKey(key)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, part) in self.parts().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// A foreign key held by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Column holding the reference
    pub field: &'static str,
    /// Kind of the referenced record
    pub kind: EntityKind,
    /// Natural key of the referenced record
    pub key: &'a str,
}

/// Resolves the natural key of an already written record into the identifier given by the writer
pub trait ResolveKey {
    /// `None` if `(kind, key)` was not written
    fn resolve(&self, kind: EntityKind, key: &str) -> Option<&str>;
}

/// Capabilities of a record
pub trait Record {
    /// Table of the record
    fn kind(&self) -> EntityKind;

    /// Natural key of the record in the source feed
    fn entity_key(&self) -> EntityKey;

    /// All the foreign keys of the record that are set
    fn references(&self) -> Vec<Reference<'_>> {
        Vec::new()
    }

    /// Rewrites every foreign key with the identifier of the referenced record
    ///
    /// A reference that can not be resolved is cleared and reported.
    fn update_keys(&mut self, _keys: &dyn ResolveKey) -> Vec<EntityError> {
        Vec::new()
    }

    /// Business rules violations that should prevent the record from being written
    fn errors(&self) -> Vec<EntityError> {
        Vec::new()
    }

    /// Business rules violations that never block the record
    fn warnings(&self) -> Vec<EntityError> {
        Vec::new()
    }
}

/// Rewrites a mandatory foreign key
pub fn update_key(
    keys: &dyn ResolveKey,
    kind: EntityKind,
    field: &'static str,
    value: &mut String,
    errors: &mut Vec<EntityError>,
) {
    match keys.resolve(kind, value) {
        Some(id) => *value = id.to_owned(),
        None => errors.push(EntityError::InvalidReference {
            field,
            value: std::mem::take(value),
        }),
    }
}

/// Rewrites an optional foreign key, an empty value is not a reference
pub fn update_optional_key(
    keys: &dyn ResolveKey,
    kind: EntityKind,
    field: &'static str,
    value: &mut Option<String>,
    errors: &mut Vec<EntityError>,
) {
    let Some(key) = value.as_deref().filter(|v| !v.is_empty()) else {
        *value = None;
        return;
    };
    match keys.resolve(kind, key) {
        Some(id) => *value = Some(id.to_owned()),
        None => errors.push(EntityError::InvalidReference {
            field,
            value: value.take().unwrap_or_default(),
        }),
    }
}

/// A record whose kind is not part of the base specification
pub trait ExtensionRecord: Record + fmt::Debug + Send {
    /// Column names and values, in output order
    fn columns(&self) -> Vec<(&'static str, String)>;

    /// Overrides the value of a column
    fn set_column(&mut self, column: &str, value: &str) -> Result<(), EntityError> {
        Err(EntityError::invalid_field(column, value, "unknown column"))
    }

    /// Clones the record behind the trait object
    fn clone_box(&self) -> Box<dyn ExtensionRecord>;

    /// To get back the concrete record
    fn as_any(&self) -> &dyn Any;

    /// To get back the concrete record, mutably
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn ExtensionRecord> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Any record of a feed
#[derive(Debug, Clone)]
pub enum Entity {
    /// See [Agency]
    Agency(Agency),
    /// See [Route]
    Route(Route),
    /// See [Level]
    Level(Level),
    /// See [Stop]
    Stop(Stop),
    /// See [Calendar]
    Calendar(Calendar),
    /// See [CalendarDate]
    CalendarDate(CalendarDate),
    /// See [Shape]
    Shape(Shape),
    /// See [Trip]
    Trip(Trip),
    /// See [StopTime]
    StopTime(StopTime),
    /// See [Frequency]
    Frequency(Frequency),
    /// See [Transfer]
    Transfer(Transfer),
    /// See [Pathway]
    Pathway(Pathway),
    /// See [FareAttribute]
    FareAttribute(FareAttribute),
    /// See [FareRule]
    FareRule(FareRule),
    /// See [FeedInfo]
    FeedInfo(FeedInfo),
    /// A record contributed by an extension
    Extension(Box<dyn ExtensionRecord>),
}

macro_rules! dispatch {
    ($entity:expr, $e:ident => $body:expr, $ext:ident => $ext_body:expr) => {
        match $entity {
            Entity::Agency($e) => $body,
            Entity::Route($e) => $body,
            Entity::Level($e) => $body,
            Entity::Stop($e) => $body,
            Entity::Calendar($e) => $body,
            Entity::CalendarDate($e) => $body,
            Entity::Shape($e) => $body,
            Entity::Trip($e) => $body,
            Entity::StopTime($e) => $body,
            Entity::Frequency($e) => $body,
            Entity::Transfer($e) => $body,
            Entity::Pathway($e) => $body,
            Entity::FareAttribute($e) => $body,
            Entity::FareRule($e) => $body,
            Entity::FeedInfo($e) => $body,
            Entity::Extension($ext) => $ext_body,
        }
    };
    ($entity:expr, $e:ident => $body:expr) => {
        dispatch!($entity, $e => $body, $e => $body)
    };
}

macro_rules! impl_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(e: $variant) -> Self {
                    Entity::$variant(e)
                }
            }
        )*
    };
}

impl_from!(
    Agency,
    Route,
    Level,
    Stop,
    Calendar,
    CalendarDate,
    Shape,
    Trip,
    StopTime,
    Frequency,
    Transfer,
    Pathway,
    FareAttribute,
    FareRule,
    FeedInfo
);

impl From<Box<dyn ExtensionRecord>> for Entity {
    fn from(e: Box<dyn ExtensionRecord>) -> Self {
        Entity::Extension(e)
    }
}

impl Record for Entity {
    fn kind(&self) -> EntityKind {
        dispatch!(self, e => e.kind())
    }

    fn entity_key(&self) -> EntityKey {
        dispatch!(self, e => e.entity_key())
    }

    fn references(&self) -> Vec<Reference<'_>> {
        dispatch!(self, e => e.references())
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        dispatch!(self, e => e.update_keys(keys))
    }

    fn errors(&self) -> Vec<EntityError> {
        dispatch!(self, e => e.errors())
    }

    fn warnings(&self) -> Vec<EntityError> {
        dispatch!(self, e => e.warnings())
    }
}

impl Entity {
    /// Header of the file for records that are not serialized with serde
    pub fn csv_header(&self) -> Option<Vec<&'static str>> {
        match self {
            Entity::Extension(e) => Some(e.columns().into_iter().map(|(c, _)| c).collect()),
            _ => None,
        }
    }

    /// Writes the record as one (or more, for shapes) CSV lines
    pub fn write_csv<W: std::io::Write>(&self, wtr: &mut csv::Writer<W>) -> csv::Result<()> {
        match self {
            Entity::Shape(shape) => {
                for point in &shape.points {
                    wtr.serialize(point)?;
                }
                Ok(())
            }
            Entity::Extension(e) => wtr.write_record(e.columns().iter().map(|(_, v)| v)),
            _ => dispatch!(self, e => wtr.serialize(e), _e => unreachable!()),
        }
    }

    /// JSON representation, used by the relational backends
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Entity::Extension(e) => Ok(serde_json::Value::Object(
                e.columns()
                    .into_iter()
                    .map(|(c, v)| (c.to_owned(), serde_json::Value::String(v)))
                    .collect(),
            )),
            _ => dispatch!(self, e => serde_json::to_value(e), _e => unreachable!()),
        }
    }

    /// Overrides the value of one column, given as it would appear in the CSV file
    pub fn set_column(&mut self, column: &str, value: &str) -> Result<(), EntityError> {
        match self {
            Entity::Shape(_) => Err(EntityError::invalid_field(
                column,
                value,
                "shapes can not be edited column by column",
            )),
            Entity::Extension(e) => e.set_column(column, value),
            _ => dispatch!(self, e => {
                *e = with_column(&*e, column, value)?;
                Ok(())
            }, _e => unreachable!()),
        }
    }
}

/// Serializes a record as a CSV line, replaces one column and reads it back
fn with_column<T: Serialize + DeserializeOwned>(
    obj: &T,
    column: &str,
    value: &str,
) -> Result<T, EntityError> {
    let parse_error = |e: csv::Error| EntityError::Parse(e.to_string());
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.serialize(obj).map_err(parse_error)?;
    let data = wtr
        .into_inner()
        .map_err(|e| EntityError::Parse(e.to_string()))?;

    let mut rdr = csv::Reader::from_reader(data.as_slice());
    let headers = rdr.headers().map_err(parse_error)?.clone();
    let record = rdr
        .records()
        .next()
        .transpose()
        .map_err(parse_error)?
        .unwrap_or_default();
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| EntityError::invalid_field(column, value, "unknown column"))?;

    let updated: csv::StringRecord = record
        .iter()
        .enumerate()
        .map(|(i, v)| if i == index { value } else { v })
        .collect();
    updated
        .deserialize(Some(&headers))
        .map_err(|e| EntityError::invalid_field(column, value, e.to_string()))
}
