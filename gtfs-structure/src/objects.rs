pub use crate::enums::*;
use crate::entity::{
    update_key, update_optional_key, EntityKey, EntityKind, Record, Reference, ResolveKey,
};
use crate::error::EntityError;
use crate::serde_helpers::{
    coordinate, date, flag, option_date, option_time, route_color, text_color, time,
};
use crate::timezones;
use chrono::{Datelike, NaiveDate, Weekday};
use rgb::RGB8;

use std::fmt;

fn required(field: &'static str, value: &str, errors: &mut Vec<EntityError>) {
    if value.trim().is_empty() {
        errors.push(EntityError::RequiredFieldMissing(field));
    }
}

fn valid_timezone(field: &'static str, value: &str, errors: &mut Vec<EntityError>) {
    if !value.is_empty() && !timezones::is_valid(value) {
        errors.push(EntityError::InvalidTimezone {
            field,
            value: value.to_owned(),
        });
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64, errors: &mut Vec<EntityError>) {
    if !(min..=max).contains(&value) {
        errors.push(EntityError::invalid_field(
            field,
            value,
            format!("must be between {} and {}", min, max),
        ));
    }
}

fn reference<'a>(field: &'static str, kind: EntityKind, key: &'a str) -> Reference<'a> {
    Reference { field, kind, key }
}

fn optional_reference<'a>(
    field: &'static str,
    kind: EntityKind,
    key: &'a Option<String>,
) -> Option<Reference<'a>> {
    key.as_deref()
        .filter(|k| !k.is_empty())
        .map(|key| Reference { field, kind, key })
}

/// A calender describes on which days the vehicle runs. See <https://gtfs.org/reference/static/#calendartxt>
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Calendar {
    /// Unique technical identifier (not for the traveller) of this calendar
    #[serde(rename = "service_id")]
    pub id: String,
    /// Does the service run on mondays
    #[serde(with = "flag")]
    pub monday: bool,
    /// Does the service run on tuesdays
    #[serde(with = "flag")]
    pub tuesday: bool,
    /// Does the service run on wednesdays
    #[serde(with = "flag")]
    pub wednesday: bool,
    /// Does the service run on thursdays
    #[serde(with = "flag")]
    pub thursday: bool,
    /// Does the service run on fridays
    #[serde(with = "flag")]
    pub friday: bool,
    /// Does the service run on saturdays
    #[serde(with = "flag")]
    pub saturday: bool,
    /// Does the service run on sundays
    #[serde(with = "flag")]
    pub sunday: bool,
    /// Start service day for the service interval
    #[serde(with = "date")]
    pub start_date: NaiveDate,
    /// End service day for the service interval. This service day is included in the interval
    #[serde(with = "date")]
    pub end_date: NaiveDate,
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}—{}", self.start_date, self.end_date)
    }
}

impl Calendar {
    /// A calendar running on no weekday, its days only come from [CalendarDate]
    pub fn without_weekdays(
        id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            monday: false,
            tuesday: false,
            wednesday: false,
            thursday: false,
            friday: false,
            saturday: false,
            sunday: false,
            start_date,
            end_date,
        }
    }

    /// Returns true if there is a service running on that day
    pub fn valid_weekday(&self, date: NaiveDate) -> bool {
        match date.weekday() {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

impl Record for Calendar {
    fn kind(&self) -> EntityKind {
        EntityKind::Calendar
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_str())
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("service_id", &self.id, &mut errors);
        if self.end_date < self.start_date {
            errors.push(EntityError::invalid_field(
                "end_date",
                self.end_date.format("%Y%m%d"),
                "ends before start_date",
            ));
        }
        errors
    }
}

/// Defines a specific date that can be added or removed from a [Calendar]. See <https://gtfs.org/reference/static/#calendar_datestxt>
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CalendarDate {
    /// Identifier of the service that is modified at this date
    pub service_id: String,
    #[serde(with = "date")]
    /// Date where the service will be added or deleted
    pub date: NaiveDate,
    /// Is the service added or deleted
    pub exception_type: Exception,
}

impl Record for CalendarDate {
    fn kind(&self) -> EntityKind {
        EntityKind::CalendarDate
    }

    fn entity_key(&self) -> EntityKey {
        let date = self.date.format("%Y%m%d").to_string();
        EntityKey::composite([self.service_id.as_str(), date.as_str()])
    }

    fn references(&self) -> Vec<Reference<'_>> {
        vec![reference(
            "service_id",
            EntityKind::Calendar,
            &self.service_id,
        )]
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_key(
            keys,
            EntityKind::Calendar,
            "service_id",
            &mut self.service_id,
            &mut errors,
        );
        errors
    }
}

/// A level in a station. See <https://gtfs.org/reference/static/#levelstxt>
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Level {
    /// Unique technical identifier of the level
    #[serde(rename = "level_id")]
    pub id: String,
    /// Numeric index of the level, 0 is the ground level
    #[serde(rename = "level_index")]
    pub index: f64,
    /// Name of the level as seen by the riders
    #[serde(rename = "level_name")]
    pub name: Option<String>,
}

impl Record for Level {
    fn kind(&self) -> EntityKind {
        EntityKind::Level
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_str())
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("level_id", &self.id, &mut errors);
        errors
    }
}

/// A physical stop, station or area. See <https://gtfs.org/reference/static/#stopstxt>
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Stop {
    /// Unique technical identifier (not for the traveller) of the stop
    #[serde(rename = "stop_id")]
    pub id: String,
    /// Short text or a number that identifies the location for riders
    #[serde(rename = "stop_code")]
    pub code: Option<String>,
    ///Name of the location. Use a name that people will understand in the local and tourist vernacular
    #[serde(rename = "stop_name", default)]
    pub name: String,
    /// Description of the location that provides useful, quality information
    #[serde(default, rename = "stop_desc")]
    pub description: String,
    /// Type of the location
    #[serde(default)]
    pub location_type: LocationType,
    /// Defines hierarchy between the different locations
    pub parent_station: Option<String>,
    /// Identifies the fare zone for a stop
    pub zone_id: Option<String>,
    /// URL of a web page about the location
    #[serde(rename = "stop_url")]
    pub url: Option<String>,
    /// Longitude of the stop
    #[serde(with = "coordinate")]
    #[serde(rename = "stop_lon", default)]
    pub longitude: Option<f64>,
    /// Latitude of the stop
    #[serde(with = "coordinate")]
    #[serde(rename = "stop_lat", default)]
    pub latitude: Option<f64>,
    /// Timezone of the location
    #[serde(rename = "stop_timezone")]
    pub timezone: Option<String>,
    /// Indicates whether wheelchair boardings are possible from the location
    #[serde(default)]
    pub wheelchair_boarding: Availability,
    /// Level of the location. The same level can be used by multiple unlinked stations
    pub level_id: Option<String>,
    /// Platform identifier for a platform stop (a stop belonging to a station)
    pub platform_code: Option<String>,
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Stop {
    /// Stops, stations and entrances are located and named, generic nodes and boarding areas need not be
    fn is_located(&self) -> bool {
        matches!(
            self.location_type,
            LocationType::StopPoint | LocationType::StopArea | LocationType::StationEntrance
        )
    }
}

impl Record for Stop {
    fn kind(&self) -> EntityKind {
        EntityKind::Stop
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_str())
    }

    fn references(&self) -> Vec<Reference<'_>> {
        [
            optional_reference("parent_station", EntityKind::Stop, &self.parent_station),
            optional_reference("level_id", EntityKind::Level, &self.level_id),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_optional_key(
            keys,
            EntityKind::Stop,
            "parent_station",
            &mut self.parent_station,
            &mut errors,
        );
        update_optional_key(
            keys,
            EntityKind::Level,
            "level_id",
            &mut self.level_id,
            &mut errors,
        );
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("stop_id", &self.id, &mut errors);
        if let LocationType::Unknown(t) = self.location_type {
            errors.push(EntityError::invalid_field(
                "location_type",
                t,
                "unknown location type",
            ));
        }
        if self.is_located() {
            required("stop_name", &self.name, &mut errors);
            match (self.latitude, self.longitude) {
                (Some(lat), Some(lon)) => {
                    in_range("stop_lat", lat, -90.0, 90.0, &mut errors);
                    in_range("stop_lon", lon, -180.0, 180.0, &mut errors);
                }
                (None, _) => errors.push(EntityError::ConditionallyRequiredField("stop_lat")),
                (_, None) => errors.push(EntityError::ConditionallyRequiredField("stop_lon")),
            }
        }
        let has_parent = self
            .parent_station
            .as_deref()
            .map_or(false, |p| !p.is_empty());
        match self.location_type {
            LocationType::StopArea if has_parent => errors.push(EntityError::invalid_field(
                "parent_station",
                self.parent_station.as_deref().unwrap_or_default(),
                "a station can not have a parent station",
            )),
            LocationType::StationEntrance | LocationType::GenericNode | LocationType::BoardingArea
                if !has_parent =>
            {
                errors.push(EntityError::ConditionallyRequiredField("parent_station"))
            }
            _ => {}
        }
        if let Some(tz) = &self.timezone {
            valid_timezone("stop_timezone", tz, &mut errors);
        }
        errors
    }
}

/// The moment where a vehicle, running on [Trip] stops at a [Stop]. See <https://gtfs.org/reference/static/#stop_timestxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct StopTime {
    /// [Trip] to which this stop time belongs to
    pub trip_id: String,
    /// Arrival time of the stop time.
    /// It's an option since the intermediate stops can have have no arrival
    /// and this arrival needs to be interpolated
    #[serde(
        with = "option_time",
        default
    )]
    pub arrival_time: Option<u32>,
    /// Departure time of the stop time.
    /// It's an option since the intermediate stops can have have no departure
    /// and this departure needs to be interpolated
    #[serde(
        with = "option_time",
        default
    )]
    pub departure_time: Option<u32>,
    /// Identifier of the [Stop] where the vehicle stops
    pub stop_id: String,
    /// Order of stops for a particular trip. The values must increase along the trip but do not need to be consecutive
    pub stop_sequence: u32,
    /// Text that appears on signage identifying the trip's destination to riders
    pub stop_headsign: Option<String>,
    /// Indicates pickup method
    #[serde(default)]
    pub pickup_type: PickupDropOffType,
    /// Indicates drop off method
    #[serde(default)]
    pub drop_off_type: PickupDropOffType,
    /// Indicates whether a rider can board the transit vehicle anywhere along the vehicle’s travel path
    #[serde(default)]
    pub continuous_pickup: ContinuousPickupDropOff,
    /// Indicates whether a rider can alight from the transit vehicle at any point along the vehicle’s travel path
    #[serde(default)]
    pub continuous_drop_off: ContinuousPickupDropOff,
    /// Actual distance traveled along the associated shape, from the first stop to the stop specified in this record. This field specifies how much of the shape to draw between any two stops during a trip
    pub shape_dist_traveled: Option<f32>,
    /// Indicates if arrival and departure times for a stop are strictly adhered to by the vehicle or if they are instead approximate and/or interpolated times
    #[serde(default)]
    pub timepoint: TimepointType,
}

impl Record for StopTime {
    fn kind(&self) -> EntityKind {
        EntityKind::StopTime
    }

    fn entity_key(&self) -> EntityKey {
        let sequence = self.stop_sequence.to_string();
        EntityKey::composite([self.trip_id.as_str(), sequence.as_str()])
    }

    fn references(&self) -> Vec<Reference<'_>> {
        vec![
            reference("trip_id", EntityKind::Trip, &self.trip_id),
            reference("stop_id", EntityKind::Stop, &self.stop_id),
        ]
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_key(
            keys,
            EntityKind::Trip,
            "trip_id",
            &mut self.trip_id,
            &mut errors,
        );
        update_key(
            keys,
            EntityKind::Stop,
            "stop_id",
            &mut self.stop_id,
            &mut errors,
        );
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        if let (Some(arrival), Some(departure)) = (self.arrival_time, self.departure_time) {
            if departure < arrival {
                errors.push(EntityError::invalid_field(
                    "departure_time",
                    departure,
                    "departs before arrival_time",
                ));
            }
        }
        errors
    }

    fn warnings(&self) -> Vec<EntityError> {
        let mut warnings = vec![];
        if self.timepoint == TimepointType::Exact {
            if self.arrival_time.is_none() {
                warnings.push(EntityError::ConditionallyRequiredField("arrival_time"));
            }
            if self.departure_time.is_none() {
                warnings.push(EntityError::ConditionallyRequiredField("departure_time"));
            }
        }
        warnings
    }
}

/// A route is a commercial line (there can be various stop sequences for a same line). See <https://gtfs.org/reference/static/#routestxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Route {
    /// Unique technical (not for the traveller) identifier for the route
    #[serde(rename = "route_id")]
    pub id: String,
    /// Short name of a route. This will often be a short, abstract identifier like "32", "100X", or "Green" that riders use to identify a route, but which doesn't give any indication of what places the route serves
    #[serde(rename = "route_short_name", default)]
    pub short_name: String,
    /// Full name of a route. This name is generally more descriptive than the [Route::short_name]] and often includes the route's destination or stop
    #[serde(rename = "route_long_name", default)]
    pub long_name: String,
    /// Description of a route that provides useful, quality information
    #[serde(rename = "route_desc")]
    pub desc: Option<String>,
    /// Indicates the type of transportation used on a route
    pub route_type: RouteType,
    /// URL of a web page about the particular route
    #[serde(rename = "route_url")]
    pub url: Option<String>,
    /// Agency for the specified route
    pub agency_id: Option<String>,
    /// Orders the routes in a way which is ideal for presentation to customers. Routes with smaller route_sort_order values should be displayed first.
    #[serde(rename = "route_sort_order")]
    pub order: Option<u32>,
    /// Route color designation that matches public facing material
    #[serde(
        with = "route_color",
        rename = "route_color",
        default = "route_color::default"
    )]
    pub color: RGB8,
    /// Legible color to use for text drawn against a background of [Route::color]
    #[serde(
        with = "text_color",
        rename = "route_text_color",
        default
    )]
    pub text_color: RGB8,
    /// Indicates whether a rider can board the transit vehicle anywhere along the vehicle’s travel path
    #[serde(default)]
    pub continuous_pickup: ContinuousPickupDropOff,
    /// Indicates whether a rider can alight from the transit vehicle at any point along the vehicle’s travel path
    #[serde(default)]
    pub continuous_drop_off: ContinuousPickupDropOff,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.long_name.is_empty() {
            write!(f, "{}", self.long_name)
        } else {
            write!(f, "{}", self.short_name)
        }
    }
}

impl Record for Route {
    fn kind(&self) -> EntityKind {
        EntityKind::Route
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_str())
    }

    fn references(&self) -> Vec<Reference<'_>> {
        optional_reference("agency_id", EntityKind::Agency, &self.agency_id)
            .into_iter()
            .collect()
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_optional_key(
            keys,
            EntityKind::Agency,
            "agency_id",
            &mut self.agency_id,
            &mut errors,
        );
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("route_id", &self.id, &mut errors);
        if self.short_name.trim().is_empty() && self.long_name.trim().is_empty() {
            errors.push(EntityError::ConditionallyRequiredField("route_short_name"));
        }
        if !self.route_type.is_known() {
            errors.push(EntityError::invalid_field(
                "route_type",
                self.route_type.code(),
                "unknown route type",
            ));
        }
        errors
    }

    fn warnings(&self) -> Vec<EntityError> {
        let mut warnings = vec![];
        if !self.short_name.is_empty() && self.short_name == self.long_name {
            warnings.push(EntityError::invalid_field(
                "route_long_name",
                &self.long_name,
                "same as route_short_name",
            ));
        }
        warnings
    }
}

/// A Trip is a vehicle that follows a sequence of [StopTime] on certain days. See <https://gtfs.org/reference/static/#tripstxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Trip {
    /// Unique technical (not for the traveller) identifier for the Trip
    #[serde(rename = "trip_id")]
    pub id: String,
    /// References the [Calendar] on which this trip runs
    pub service_id: String,
    /// References along which [Route] this trip runs
    pub route_id: String,
    /// Shape of the trip
    pub shape_id: Option<String>,
    /// Text that appears on signage identifying the trip's destination to riders
    pub trip_headsign: Option<String>,
    /// Public facing text used to identify the trip to riders, for instance, to identify train numbers for commuter rail trips
    pub trip_short_name: Option<String>,
    /// Indicates the direction of travel for a trip. This field is not used in routing; it provides a way to separate trips by direction when publishing time tables
    pub direction_id: Option<DirectionType>,
    /// Identifies the block to which the trip belongs. A block consists of a single trip or many sequential trips made using the same vehicle, defined by shared service days and block_id. A block_id can have trips with different service days, making distinct blocks
    pub block_id: Option<String>,
    /// Indicates wheelchair accessibility
    #[serde(default)]
    pub wheelchair_accessible: Availability,
    /// Indicates whether bikes are allowed
    #[serde(default)]
    pub bikes_allowed: BikesAllowedType,
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "route id: {}, service id: {}",
            self.route_id, self.service_id
        )
    }
}

impl Record for Trip {
    fn kind(&self) -> EntityKind {
        EntityKind::Trip
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_str())
    }

    fn references(&self) -> Vec<Reference<'_>> {
        let mut refs = vec![
            reference("route_id", EntityKind::Route, &self.route_id),
            reference("service_id", EntityKind::Calendar, &self.service_id),
        ];
        refs.extend(optional_reference(
            "shape_id",
            EntityKind::Shape,
            &self.shape_id,
        ));
        refs
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_key(
            keys,
            EntityKind::Route,
            "route_id",
            &mut self.route_id,
            &mut errors,
        );
        update_key(
            keys,
            EntityKind::Calendar,
            "service_id",
            &mut self.service_id,
            &mut errors,
        );
        update_optional_key(
            keys,
            EntityKind::Shape,
            "shape_id",
            &mut self.shape_id,
            &mut errors,
        );
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("trip_id", &self.id, &mut errors);
        errors
    }
}

/// General informations about the agency running the network. See <https://gtfs.org/reference/static/#agencytxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Agency {
    /// Unique technical (not for the traveller) identifier for the Agency
    #[serde(rename = "agency_id")]
    pub id: Option<String>,
    ///Full name of the transit agency
    #[serde(rename = "agency_name")]
    pub name: String,
    /// Full name of the transit agency.
    #[serde(rename = "agency_url")]
    pub url: String,
    /// Timezone where the transit agency is located
    #[serde(rename = "agency_timezone")]
    pub timezone: String,
    /// Primary language used by this transit agency
    #[serde(rename = "agency_lang")]
    pub lang: Option<String>,
    /// A voice telephone number for the specified agency
    #[serde(rename = "agency_phone")]
    pub phone: Option<String>,
    /// URL of a web page that allows a rider to purchase tickets or other fare instruments for that agency online
    #[serde(rename = "agency_fare_url")]
    pub fare_url: Option<String>,
    /// Email address actively monitored by the agency’s customer service department
    #[serde(rename = "agency_email")]
    pub email: Option<String>,
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Record for Agency {
    fn kind(&self) -> EntityKind {
        EntityKind::Agency
    }

    /// A feed with a single agency can omit `agency_id`, the key is then empty
    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_deref().unwrap_or_default())
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("agency_name", &self.name, &mut errors);
        required("agency_url", &self.url, &mut errors);
        required("agency_timezone", &self.timezone, &mut errors);
        valid_timezone("agency_timezone", &self.timezone, &mut errors);
        errors
    }
}

/// A single geographical point decribing the shape of a [Trip]. See <https://gtfs.org/reference/static/#shapestxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct ShapePoint {
    /// Identifier of the [Shape] the point belongs to
    #[serde(rename = "shape_id")]
    pub shape_id: String,
    #[serde(rename = "shape_pt_lat", default)]
    /// Latitude of a shape point
    pub latitude: f64,
    /// Longitude of a shape point
    #[serde(rename = "shape_pt_lon", default)]
    pub longitude: f64,
    /// Sequence in which the shape points connect to form the shape. Values increase along the trip but do not need to be consecutive.
    #[serde(rename = "shape_pt_sequence")]
    pub sequence: usize,
    /// Actual distance traveled along the shape from the first shape point to the point specified in this record. Used by trip planners to show the correct portion of the shape on a map
    #[serde(rename = "shape_dist_traveled")]
    pub dist_traveled: Option<f32>,
}

/// All the points of a shape, ordered by sequence
///
/// shapes.txt has one line per point, the reader groups them by `shape_id`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Shape {
    /// Unique technical (not for the traveller) identifier for the Shape
    #[serde(rename = "shape_id")]
    pub id: String,
    /// Points of the shape
    pub points: Vec<ShapePoint>,
}

impl Shape {
    /// Builds a shape from its points, in any order
    pub fn from_points(id: impl Into<String>, mut points: Vec<ShapePoint>) -> Self {
        points.sort_by_key(|p| p.sequence);
        Self {
            id: id.into(),
            points,
        }
    }
}

impl Record for Shape {
    fn kind(&self) -> EntityKind {
        EntityKind::Shape
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_str())
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("shape_id", &self.id, &mut errors);
        if self.points.len() < 2 {
            errors.push(EntityError::invalid_field(
                "shape_id",
                &self.id,
                "a shape needs at least two points",
            ));
        }
        for point in &self.points {
            in_range("shape_pt_lat", point.latitude, -90.0, 90.0, &mut errors);
            in_range("shape_pt_lon", point.longitude, -180.0, 180.0, &mut errors);
        }
        errors
    }
}

/// Defines one possible fare. See <https://gtfs.org/reference/static/#fare_attributestxt>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FareAttribute {
    /// Unique technical (not for the traveller) identifier for the FareAttribute
    #[serde(rename = "fare_id")]
    pub id: String,
    /// Fare price, in the unit specified by [FareAttribute::currency]
    pub price: String,
    /// Currency used to pay the fare.
    #[serde(rename = "currency_type")]
    pub currency: String,
    ///Indicates when the fare must be paid
    pub payment_method: PaymentMethod,
    /// Indicates the number of transfers permitted on this fare
    pub transfers: Transfers,
    /// Identifies the relevant agency for a fare
    pub agency_id: Option<String>,
    /// Length of time in seconds before a transfer expires
    pub transfer_duration: Option<usize>,
}

impl Record for FareAttribute {
    fn kind(&self) -> EntityKind {
        EntityKind::FareAttribute
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_str())
    }

    fn references(&self) -> Vec<Reference<'_>> {
        optional_reference("agency_id", EntityKind::Agency, &self.agency_id)
            .into_iter()
            .collect()
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_optional_key(
            keys,
            EntityKind::Agency,
            "agency_id",
            &mut self.agency_id,
            &mut errors,
        );
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("fare_id", &self.id, &mut errors);
        required("currency_type", &self.currency, &mut errors);
        match self.price.trim().parse::<f64>() {
            Ok(price) if price >= 0.0 => {}
            _ => errors.push(EntityError::invalid_field(
                "price",
                &self.price,
                "must be a non negative number",
            )),
        }
        errors
    }

    fn warnings(&self) -> Vec<EntityError> {
        let mut warnings = vec![];
        if self.transfers == Transfers::NoTransfer && self.transfer_duration.is_some() {
            warnings.push(EntityError::invalid_field(
                "transfer_duration",
                self.transfer_duration.unwrap_or_default(),
                "set on a fare without transfers",
            ));
        }
        warnings
    }
}

/// Assigns a [FareAttribute] to itineraries. See <https://gtfs.org/reference/static/#fare_rulestxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct FareRule {
    /// The [FareAttribute] this rule applies
    pub fare_id: String,
    /// The [Route] on which the fare applies
    pub route_id: Option<String>,
    /// Fare zone of the origin stop
    pub origin_id: Option<String>,
    /// Fare zone of the destination stop
    pub destination_id: Option<String>,
    /// Fare zone that the itinerary passes through
    pub contains_id: Option<String>,
}

impl Record for FareRule {
    fn kind(&self) -> EntityKind {
        EntityKind::FareRule
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::composite([
            self.fare_id.as_str(),
            self.route_id.as_deref().unwrap_or_default(),
            self.origin_id.as_deref().unwrap_or_default(),
            self.destination_id.as_deref().unwrap_or_default(),
            self.contains_id.as_deref().unwrap_or_default(),
        ])
    }

    fn references(&self) -> Vec<Reference<'_>> {
        let mut refs = vec![reference(
            "fare_id",
            EntityKind::FareAttribute,
            &self.fare_id,
        )];
        refs.extend(optional_reference(
            "route_id",
            EntityKind::Route,
            &self.route_id,
        ));
        refs
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_key(
            keys,
            EntityKind::FareAttribute,
            "fare_id",
            &mut self.fare_id,
            &mut errors,
        );
        update_optional_key(
            keys,
            EntityKind::Route,
            "route_id",
            &mut self.route_id,
            &mut errors,
        );
        errors
    }
}

/// Timetables can be defined by the frequency of their vehicles. See <<https://gtfs.org/reference/static/#frequenciestxt>>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Frequency {
    /// References the [Trip] that uses frequency
    pub trip_id: String,
    /// Time at which the first vehicle departs from the first stop of the trip
    #[serde(with = "time")]
    pub start_time: u32,
    /// Time at which service changes to a different headway (or ceases) at the first stop in the trip
    #[serde(with = "time")]
    pub end_time: u32,
    /// Time, in seconds, between departures from the same stop (headway) for the trip, during the time interval specified by start_time and end_time
    pub headway_secs: u32,
    /// Indicates the type of service for a trip
    pub exact_times: Option<ExactTimes>,
}

impl Record for Frequency {
    fn kind(&self) -> EntityKind {
        EntityKind::Frequency
    }

    fn entity_key(&self) -> EntityKey {
        let start = self.start_time.to_string();
        EntityKey::composite([self.trip_id.as_str(), start.as_str()])
    }

    fn references(&self) -> Vec<Reference<'_>> {
        vec![reference("trip_id", EntityKind::Trip, &self.trip_id)]
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_key(
            keys,
            EntityKind::Trip,
            "trip_id",
            &mut self.trip_id,
            &mut errors,
        );
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        if self.headway_secs == 0 {
            errors.push(EntityError::invalid_field(
                "headway_secs",
                self.headway_secs,
                "must be positive",
            ));
        }
        if self.end_time < self.start_time {
            errors.push(EntityError::invalid_field(
                "end_time",
                self.end_time,
                "ends before start_time",
            ));
        }
        errors
    }
}

/// Transfer information between stops. See <https://gtfs.org/reference/static/#transferstxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Transfer {
    /// Stop from which to leave
    pub from_stop_id: String,
    /// Stop which to transfer to
    pub to_stop_id: String,
    /// Type of the transfer
    pub transfer_type: TransferType,
    /// Minimum time needed to make the transfer in seconds
    pub min_transfer_time: Option<u32>,
}

impl Record for Transfer {
    fn kind(&self) -> EntityKind {
        EntityKind::Transfer
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::composite([self.from_stop_id.as_str(), self.to_stop_id.as_str()])
    }

    fn references(&self) -> Vec<Reference<'_>> {
        vec![
            reference("from_stop_id", EntityKind::Stop, &self.from_stop_id),
            reference("to_stop_id", EntityKind::Stop, &self.to_stop_id),
        ]
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_key(
            keys,
            EntityKind::Stop,
            "from_stop_id",
            &mut self.from_stop_id,
            &mut errors,
        );
        update_key(
            keys,
            EntityKind::Stop,
            "to_stop_id",
            &mut self.to_stop_id,
            &mut errors,
        );
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        if self.transfer_type == TransferType::MinTime && self.min_transfer_time.is_none() {
            errors.push(EntityError::ConditionallyRequiredField("min_transfer_time"));
        }
        errors
    }
}

/// Meta-data about the feed. See <https://gtfs.org/reference/static/#feed_infotxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct FeedInfo {
    /// Full name of the organization that publishes the dataset.
    #[serde(rename = "feed_publisher_name")]
    pub name: String,
    /// URL of the dataset publishing organization's website
    #[serde(rename = "feed_publisher_url")]
    pub url: String,
    /// Default language used for the text in this dataset
    #[serde(rename = "feed_lang")]
    pub lang: String,
    /// Defines the language that should be used when the data consumer doesn’t know the language of the rider
    pub default_lang: Option<String>,
    /// The dataset provides complete and reliable schedule information for service in the period from this date
    #[serde(
        with = "option_date",
        rename = "feed_start_date",
        default
    )]
    pub start_date: Option<NaiveDate>,
    ///The dataset provides complete and reliable schedule information for service in the period until this date
    #[serde(
        with = "option_date",
        rename = "feed_end_date",
        default
    )]
    pub end_date: Option<NaiveDate>,
    /// String that indicates the current version of their GTFS dataset
    #[serde(rename = "feed_version")]
    pub version: Option<String>,
    /// Email address for communication regarding the GTFS dataset and data publishing practices
    #[serde(rename = "feed_contact_email")]
    pub contact_email: Option<String>,
    /// URL for contact information, a web-form, support desk, or other tools for communication regarding the GTFS dataset and data publishing practices
    #[serde(rename = "feed_contact_url")]
    pub contact_url: Option<String>,
}

impl fmt::Display for FeedInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Record for FeedInfo {
    fn kind(&self) -> EntityKind {
        EntityKind::FeedInfo
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::composite([
            self.name.as_str(),
            self.version.as_deref().unwrap_or_default(),
        ])
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("feed_publisher_name", &self.name, &mut errors);
        required("feed_publisher_url", &self.url, &mut errors);
        required("feed_lang", &self.lang, &mut errors);
        errors
    }
}

/// A graph representation to describe subway or train, with nodes (the locations) and edges (the pathways). See <https://gtfs.org/reference/static/#pathwaystxt>
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Pathway {
    /// Uniquely identifies the pathway
    #[serde(rename = "pathway_id")]
    pub id: String,
    /// Location at which the pathway begins
    pub from_stop_id: String,
    /// Location at which the pathway ends
    pub to_stop_id: String,
    /// Type of pathway between the specified (from_stop_id, to_stop_id) pair
    #[serde(rename = "pathway_mode")]
    pub mode: PathwayMode,
    /// Indicates in which direction the pathway can be used
    pub is_bidirectional: PathwayDirectionType,
    /// Horizontal length in meters of the pathway from the origin location to the destination location
    pub length: Option<f32>,
    /// Average time in seconds needed to walk through the pathway from the origin location to the destination location
    pub traversal_time: Option<u32>,
    /// Number of stairs of the pathway
    pub stair_count: Option<i32>,
    /// Maximum slope ratio of the pathway
    pub max_slope: Option<f32>,
    /// Minimum width of the pathway in meters
    pub min_width: Option<f32>,
    /// String of text from physical signage visible to transit riders
    pub signposted_as: Option<String>,
    /// Same than the signposted_as field, but when the pathways is used backward
    pub reversed_signposted_as: Option<String>,
}

impl Record for Pathway {
    fn kind(&self) -> EntityKind {
        EntityKind::Pathway
    }

    fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.id.as_str())
    }

    fn references(&self) -> Vec<Reference<'_>> {
        vec![
            reference("from_stop_id", EntityKind::Stop, &self.from_stop_id),
            reference("to_stop_id", EntityKind::Stop, &self.to_stop_id),
        ]
    }

    fn update_keys(&mut self, keys: &dyn ResolveKey) -> Vec<EntityError> {
        let mut errors = vec![];
        update_key(
            keys,
            EntityKind::Stop,
            "from_stop_id",
            &mut self.from_stop_id,
            &mut errors,
        );
        update_key(
            keys,
            EntityKind::Stop,
            "to_stop_id",
            &mut self.to_stop_id,
            &mut errors,
        );
        errors
    }

    fn errors(&self) -> Vec<EntityError> {
        let mut errors = vec![];
        required("pathway_id", &self.id, &mut errors);
        if self.from_stop_id == self.to_stop_id {
            errors.push(EntityError::invalid_field(
                "to_stop_id",
                &self.to_stop_id,
                "a pathway must link two different locations",
            ));
        }
        errors
    }
}
