//! Hooks run on every record before its references are rewritten
//!
//! A filter can fix a record in place, remember what it has seen in previous records,
//! or reject the record by returning errors. Filters are created for one copy and
//! never shared between copies.
use geo::SimplifyIdx;
use geo_types::LineString;
use gtfs_structures::timezones;
use gtfs_structures::{Entity, EntityError, LocationType, Record, ShapePoint};
use rustc_hash::FxHashMap;

pub trait Filter {
    fn name(&self) -> &str;

    /// Inspects and possibly modifies a record, returns why it should not be written
    fn filter(&mut self, entity: &mut Entity) -> Vec<EntityError>;
}

/// Replaces the extended route types by their basic equivalent
#[derive(Debug, Default)]
pub struct BasicRouteTypeFilter;

impl Filter for BasicRouteTypeFilter {
    fn name(&self) -> &str {
        "basic_route_types"
    }

    fn filter(&mut self, entity: &mut Entity) -> Vec<EntityError> {
        let Entity::Route(route) = entity else {
            return vec![];
        };
        match route.route_type.basic() {
            Some(basic) => {
                route.route_type = basic;
                vec![]
            }
            None => vec![EntityError::invalid_field(
                "route_type",
                route.route_type.code(),
                format!(
                    "cannot convert route_type {} to a basic route type",
                    route.route_type.code()
                ),
            )],
        }
    }
}

/// Replaces timezone aliases by their canonical name, e.g. `US/Pacific` by `America/Los_Angeles`
#[derive(Debug, Default)]
pub struct NormalizeTimezoneFilter;

impl Filter for NormalizeTimezoneFilter {
    fn name(&self) -> &str {
        "normalize_timezones"
    }

    fn filter(&mut self, entity: &mut Entity) -> Vec<EntityError> {
        let (field, timezone) = match entity {
            Entity::Agency(agency) => ("agency_timezone", &mut agency.timezone),
            Entity::Stop(stop) => match stop.timezone.as_mut() {
                Some(tz) if !tz.is_empty() => ("stop_timezone", tz),
                _ => return vec![],
            },
            _ => return vec![],
        };
        match timezones::normalize(timezone) {
            Some(canonical) => {
                *timezone = canonical.to_owned();
                vec![]
            }
            None => vec![EntityError::InvalidTimezone {
                field,
                value: timezone.clone(),
            }],
        }
    }
}

/// Gives a timezone to the stops that have none
///
/// A stop inherits the timezone of its parent station, or else the one of the first agency.
/// Stations are copied before the other stops, so their timezone is known when their
/// children come.
#[derive(Debug, Default)]
pub struct ApplyParentTimezoneFilter {
    default_timezone: Option<String>,
    station_timezones: FxHashMap<String, String>,
}

impl Filter for ApplyParentTimezoneFilter {
    fn name(&self) -> &str {
        "apply_parent_timezones"
    }

    fn filter(&mut self, entity: &mut Entity) -> Vec<EntityError> {
        match entity {
            Entity::Agency(agency) => {
                if self.default_timezone.is_none() && !agency.timezone.is_empty() {
                    self.default_timezone = Some(agency.timezone.clone());
                }
            }
            Entity::Stop(stop) => {
                if stop.timezone.as_deref().map_or(true, str::is_empty) {
                    let parent_timezone = stop
                        .parent_station
                        .as_deref()
                        .and_then(|p| self.station_timezones.get(p));
                    stop.timezone = parent_timezone
                        .or(self.default_timezone.as_ref())
                        .cloned();
                }
                if stop.location_type == LocationType::StopArea {
                    if let Some(tz) = &stop.timezone {
                        self.station_timezones.insert(stop.id.clone(), tz.clone());
                    }
                }
            }
            _ => {}
        }
        vec![]
    }
}

/// Douglas–Peucker simplification of the shapes
#[derive(Debug)]
pub struct SimplifyShapeFilter {
    tolerance: f64,
}

impl SimplifyShapeFilter {
    /// `tolerance` is in degrees, e.g. 0.000005
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl Filter for SimplifyShapeFilter {
    fn name(&self) -> &str {
        "simplify_shapes"
    }

    fn filter(&mut self, entity: &mut Entity) -> Vec<EntityError> {
        let Entity::Shape(shape) = entity else {
            return vec![];
        };
        let line: LineString<f64> = shape
            .points
            .iter()
            .map(|p| (p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .into();
        let kept = line.simplify_idx(&self.tolerance);
        if kept.len() < shape.points.len() {
            let mut points: Vec<Option<ShapePoint>> =
                std::mem::take(&mut shape.points).into_iter().map(Some).collect();
            shape.points = kept
                .into_iter()
                .filter_map(|i| points.get_mut(i).and_then(Option::take))
                .collect();
        }
        vec![]
    }
}

/// Overrides columns of given records, `--set filename,id,column,value`
#[derive(Debug, Default)]
pub struct SetterFilter {
    values: FxHashMap<(String, String), Vec<(String, String)>>,
}

impl SetterFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `id` is the key of the record in the source feed
    pub fn add_value(&mut self, filename: &str, id: &str, column: &str, value: &str) {
        self.values
            .entry((filename.to_owned(), id.to_owned()))
            .or_default()
            .push((column.to_owned(), value.to_owned()));
    }

    /// Parses a `filename,id,column,value` argument
    pub fn add_argument(&mut self, argument: &str) -> Option<()> {
        let parts: Vec<&str> = argument.splitn(4, ',').collect();
        match parts[..] {
            [filename, id, column, value] => {
                self.add_value(filename, id, column, value);
                Some(())
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Filter for SetterFilter {
    fn name(&self) -> &str {
        "set"
    }

    fn filter(&mut self, entity: &mut Entity) -> Vec<EntityError> {
        let lookup = (
            entity.kind().filename().to_owned(),
            entity.entity_key().to_string(),
        );
        let Some(values) = self.values.get(&lookup) else {
            return vec![];
        };
        values
            .iter()
            .filter_map(|(column, value)| entity.set_column(column, value).err())
            .collect()
    }
}
