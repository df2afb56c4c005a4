//! Columns holding one of a fixed set of integer codes
//!
//! Every enumeration reads and writes its code through [Coded]. The ones with a catch-all
//! variant keep the codes they do not know, so that a copy writes them back unchanged.
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// An enumeration stored as an integer code
pub trait Coded: Sized {
    /// Column name, for the error messages
    const COLUMN: &'static str;

    /// `None` is an empty cell. Returns `None` when the code is not acceptable
    fn decode(code: Option<i32>) -> Option<Self>;

    /// `None` writes an empty cell
    fn encode(&self) -> Option<i32>;
}

fn read_code<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Coded,
{
    let cell = Option::<String>::deserialize(deserializer)?;
    let cell = cell.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let code = cell
        .map(|c| {
            c.parse::<i32>().map_err(|_| {
                <D::Error as de::Error>::custom(format!(
                    "invalid value for {}, must be an integer: {}",
                    T::COLUMN,
                    c
                ))
            })
        })
        .transpose()?;
    T::decode(code).ok_or_else(|| match cell {
        Some(c) => de::Error::custom(format!("invalid value for {}: {}", T::COLUMN, c)),
        None => de::Error::custom(format!("{} is required", T::COLUMN)),
    })
}

macro_rules! coded_serde {
    ($($t:ty),+ $(,)?) => {$(
        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                read_code(deserializer)
            }
        }

        impl Serialize for $t {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.encode() {
                    Some(code) => serializer.serialize_str(&code.to_string()),
                    None => serializer.serialize_none(),
                }
            }
        }
    )+};
}

coded_serde!(
    LocationType,
    RouteType,
    PickupDropOffType,
    ContinuousPickupDropOff,
    TimepointType,
    Availability,
    Exception,
    DirectionType,
    BikesAllowedType,
    PaymentMethod,
    ExactTimes,
    Transfers,
    TransferType,
    PathwayMode,
    PathwayDirectionType,
);

/// `location_type` of a [Stop](crate::Stop)
#[derive(Derivative, Debug, Copy, Clone, PartialEq, Eq)]
#[derivative(Default(bound = ""))]
pub enum LocationType {
    /// Where passengers board or alight, a platform when it has a parent station
    #[derivative(Default)]
    StopPoint,
    /// Station, the parent of platforms, entrances and nodes
    StopArea,
    /// Entrance or exit of a station
    StationEntrance,
    /// Node of the pathway graph of a station
    GenericNode,
    /// Part of a platform
    BoardingArea,
    /// Any other code
    Unknown(i32),
}

impl Coded for LocationType {
    const COLUMN: &'static str = "location_type";

    fn decode(code: Option<i32>) -> Option<Self> {
        Some(match code {
            None | Some(0) => LocationType::StopPoint,
            Some(1) => LocationType::StopArea,
            Some(2) => LocationType::StationEntrance,
            Some(3) => LocationType::GenericNode,
            Some(4) => LocationType::BoardingArea,
            Some(c) => LocationType::Unknown(c),
        })
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            LocationType::StopPoint => 0,
            LocationType::StopArea => 1,
            LocationType::StationEntrance => 2,
            LocationType::GenericNode => 3,
            LocationType::BoardingArea => 4,
            LocationType::Unknown(c) => *c,
        })
    }
}

/// `route_type` of a [Route](crate::Route)
///
/// Extended route types (<https://developers.google.com/transit/gtfs/reference/extended-route-types>)
/// are kept with their exact code so they can be written back unchanged,
/// [RouteType::basic] collapses them into the closest basic type.
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq, Hash)]
#[derivative(Default(bound = ""))]
pub enum RouteType {
    /// Tram, streetcar, light rail
    Tramway,
    /// Subway, metro
    Subway,
    /// Intercity or long distance rail
    Rail,
    /// Bus
    #[derivative(Default)]
    Bus,
    /// Ferry
    Ferry,
    /// Street level rail car pulled by a cable
    CableCar,
    /// Aerial lift, suspended cable car
    Gondola,
    /// Rail system for steep inclines
    Funicular,
    /// Trolleybus
    Trolleybus,
    /// Monorail
    Monorail,
    /// Any code outside of the basic values, kept as is
    Extended(i32),
}

impl RouteType {
    /// Builds the route type from its `route_type` code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => RouteType::Tramway,
            1 => RouteType::Subway,
            2 => RouteType::Rail,
            3 => RouteType::Bus,
            4 => RouteType::Ferry,
            5 => RouteType::CableCar,
            6 => RouteType::Gondola,
            7 => RouteType::Funicular,
            11 => RouteType::Trolleybus,
            12 => RouteType::Monorail,
            c => RouteType::Extended(c),
        }
    }

    /// The `route_type` code as found in the feed
    pub fn code(&self) -> i32 {
        match self {
            RouteType::Tramway => 0,
            RouteType::Subway => 1,
            RouteType::Rail => 2,
            RouteType::Bus => 3,
            RouteType::Ferry => 4,
            RouteType::CableCar => 5,
            RouteType::Gondola => 6,
            RouteType::Funicular => 7,
            RouteType::Trolleybus => 11,
            RouteType::Monorail => 12,
            RouteType::Extended(c) => *c,
        }
    }

    /// Is this one of the route types of the base specification
    pub fn is_basic(&self) -> bool {
        !matches!(self, RouteType::Extended(_))
    }

    /// Basic types, extended codes with a basic equivalent, air service and miscellaneous service
    pub fn is_known(&self) -> bool {
        self.basic().is_some() || matches!(self.code(), 1100..=1199 | 1700..=1799)
    }

    /// Closest basic route type, `None` if the extended code has no equivalent (e.g. air service)
    pub fn basic(&self) -> Option<RouteType> {
        let code = match self {
            RouteType::Extended(c) => *c,
            basic => return Some(*basic),
        };
        match code {
            100..=199 => Some(RouteType::Rail),
            200..=299 => Some(RouteType::Bus),
            405 => Some(RouteType::Monorail),
            400..=499 => Some(RouteType::Subway),
            700..=799 => Some(RouteType::Bus),
            800..=899 => Some(RouteType::Trolleybus),
            900..=999 => Some(RouteType::Tramway),
            1000..=1099 | 1200..=1299 => Some(RouteType::Ferry),
            1300..=1399 => Some(RouteType::Gondola),
            1400..=1499 => Some(RouteType::Funicular),
            1500..=1599 => Some(RouteType::Bus),
            _ => None,
        }
    }
}

impl Coded for RouteType {
    const COLUMN: &'static str = "route_type";

    fn decode(code: Option<i32>) -> Option<Self> {
        code.map(RouteType::from_code)
    }

    fn encode(&self) -> Option<i32> {
        Some(self.code())
    }
}

/// `pickup_type` and `drop_off_type` of a [StopTime](crate::StopTime)
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq)]
#[derivative(Default(bound = ""))]
pub enum PickupDropOffType {
    /// Regularly scheduled, the default
    #[derivative(Default)]
    Regular,
    /// Not possible
    NotAvailable,
    /// The agency must be called
    ArrangeByPhone,
    /// The driver must be told
    CoordinateWithDriver,
    /// Any other code
    Unknown(i32),
}

impl Coded for PickupDropOffType {
    const COLUMN: &'static str = "pickup_type";

    fn decode(code: Option<i32>) -> Option<Self> {
        Some(match code {
            None | Some(0) => PickupDropOffType::Regular,
            Some(1) => PickupDropOffType::NotAvailable,
            Some(2) => PickupDropOffType::ArrangeByPhone,
            Some(3) => PickupDropOffType::CoordinateWithDriver,
            Some(c) => PickupDropOffType::Unknown(c),
        })
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            PickupDropOffType::Regular => 0,
            PickupDropOffType::NotAvailable => 1,
            PickupDropOffType::ArrangeByPhone => 2,
            PickupDropOffType::CoordinateWithDriver => 3,
            PickupDropOffType::Unknown(c) => *c,
        })
    }
}

/// `continuous_pickup` and `continuous_drop_off`, boarding or alighting anywhere along the path
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq)]
#[derivative(Default(bound = ""))]
pub enum ContinuousPickupDropOff {
    /// Possible anywhere
    Continuous,
    /// Only at the stops, the default
    #[derivative(Default)]
    NotAvailable,
    /// The agency must be called
    ArrangeByPhone,
    /// The driver must be told
    CoordinateWithDriver,
    /// Any other code
    Unknown(i32),
}

impl Coded for ContinuousPickupDropOff {
    const COLUMN: &'static str = "continuous_pickup";

    fn decode(code: Option<i32>) -> Option<Self> {
        Some(match code {
            Some(0) => ContinuousPickupDropOff::Continuous,
            None | Some(1) => ContinuousPickupDropOff::NotAvailable,
            Some(2) => ContinuousPickupDropOff::ArrangeByPhone,
            Some(3) => ContinuousPickupDropOff::CoordinateWithDriver,
            Some(c) => ContinuousPickupDropOff::Unknown(c),
        })
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            ContinuousPickupDropOff::Continuous => 0,
            ContinuousPickupDropOff::NotAvailable => 1,
            ContinuousPickupDropOff::ArrangeByPhone => 2,
            ContinuousPickupDropOff::CoordinateWithDriver => 3,
            ContinuousPickupDropOff::Unknown(c) => *c,
        })
    }
}

/// `timepoint` of a [StopTime](crate::StopTime)
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq)]
#[derivative(Default)]
pub enum TimepointType {
    /// The times are approximate
    Approximate,
    /// The times are exact, the default
    #[derivative(Default)]
    Exact,
}

impl Coded for TimepointType {
    const COLUMN: &'static str = "timepoint";

    fn decode(code: Option<i32>) -> Option<Self> {
        match code {
            Some(0) => Some(TimepointType::Approximate),
            None | Some(1) => Some(TimepointType::Exact),
            Some(_) => None,
        }
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            TimepointType::Approximate => 0,
            TimepointType::Exact => 1,
        })
    }
}

/// Whether a service, like wheelchair boarding, is available
#[derive(Debug, Derivative, PartialEq, Eq, Hash, Clone, Copy)]
#[derivative(Default)]
pub enum Availability {
    /// Unknown, the default
    #[derivative(Default)]
    InformationNotAvailable,
    /// Available
    Available,
    /// Not available
    NotAvailable,
    /// Any other code
    Unknown(i32),
}

impl Coded for Availability {
    const COLUMN: &'static str = "wheelchair_boarding";

    fn decode(code: Option<i32>) -> Option<Self> {
        Some(match code {
            None | Some(0) => Availability::InformationNotAvailable,
            Some(1) => Availability::Available,
            Some(2) => Availability::NotAvailable,
            Some(c) => Availability::Unknown(c),
        })
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            Availability::InformationNotAvailable => 0,
            Availability::Available => 1,
            Availability::NotAvailable => 2,
            Availability::Unknown(c) => *c,
        })
    }
}

/// `exception_type` of a [CalendarDate](crate::CalendarDate)
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Exception {
    /// The service runs on that day
    Added,
    /// The service does not run on that day
    Deleted,
}

impl Coded for Exception {
    const COLUMN: &'static str = "exception_type";

    fn decode(code: Option<i32>) -> Option<Self> {
        match code? {
            1 => Some(Exception::Added),
            2 => Some(Exception::Deleted),
            _ => None,
        }
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            Exception::Added => 1,
            Exception::Deleted => 2,
        })
    }
}

/// `direction_id` of a [Trip](crate::Trip), only for display
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DirectionType {
    /// One direction, e.g. outbound
    Outbound,
    /// The opposite one
    Inbound,
}

impl Coded for DirectionType {
    const COLUMN: &'static str = "direction_id";

    fn decode(code: Option<i32>) -> Option<Self> {
        match code? {
            0 => Some(DirectionType::Outbound),
            1 => Some(DirectionType::Inbound),
            _ => None,
        }
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            DirectionType::Outbound => 0,
            DirectionType::Inbound => 1,
        })
    }
}

/// `bikes_allowed` of a [Trip](crate::Trip)
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq)]
#[derivative(Default())]
pub enum BikesAllowedType {
    /// Unknown, the default
    #[derivative(Default)]
    NoBikeInfo,
    /// At least one bike can be carried
    AtLeastOneBike,
    /// No bike
    NoBikesAllowed,
    /// Any other code
    Unknown(i32),
}

impl Coded for BikesAllowedType {
    const COLUMN: &'static str = "bikes_allowed";

    fn decode(code: Option<i32>) -> Option<Self> {
        Some(match code {
            None | Some(0) => BikesAllowedType::NoBikeInfo,
            Some(1) => BikesAllowedType::AtLeastOneBike,
            Some(2) => BikesAllowedType::NoBikesAllowed,
            Some(c) => BikesAllowedType::Unknown(c),
        })
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            BikesAllowedType::NoBikeInfo => 0,
            BikesAllowedType::AtLeastOneBike => 1,
            BikesAllowedType::NoBikesAllowed => 2,
            BikesAllowedType::Unknown(c) => *c,
        })
    }
}

/// `payment_method` of a [FareAttribute](crate::FareAttribute)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Paid on board
    Aboard,
    /// Paid before boarding
    PreBoarding,
}

impl Coded for PaymentMethod {
    const COLUMN: &'static str = "payment_method";

    fn decode(code: Option<i32>) -> Option<Self> {
        match code? {
            0 => Some(PaymentMethod::Aboard),
            1 => Some(PaymentMethod::PreBoarding),
            _ => None,
        }
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            PaymentMethod::Aboard => 0,
            PaymentMethod::PreBoarding => 1,
        })
    }
}

/// `exact_times` of a [Frequency](crate::Frequency)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExactTimes {
    /// Only the headway is given
    FrequencyBased,
    /// The departures are exactly every headway
    ScheduleBased,
}

impl Coded for ExactTimes {
    const COLUMN: &'static str = "exact_times";

    fn decode(code: Option<i32>) -> Option<Self> {
        match code {
            None | Some(0) => Some(ExactTimes::FrequencyBased),
            Some(1) => Some(ExactTimes::ScheduleBased),
            Some(_) => None,
        }
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            ExactTimes::FrequencyBased => 0,
            ExactTimes::ScheduleBased => 1,
        })
    }
}

/// `transfers` of a [FareAttribute](crate::FareAttribute), written empty when unlimited
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq)]
#[derivative(Default(bound = ""))]
pub enum Transfers {
    /// No limit, the default
    #[derivative(Default)]
    Unlimited,
    /// No transfer
    NoTransfer,
    /// One transfer
    UniqueTransfer,
    /// Two transfers
    TwoTransfers,
    /// Any other count
    Other(i32),
}

impl Coded for Transfers {
    const COLUMN: &'static str = "transfers";

    fn decode(code: Option<i32>) -> Option<Self> {
        Some(match code {
            None => Transfers::Unlimited,
            Some(0) => Transfers::NoTransfer,
            Some(1) => Transfers::UniqueTransfer,
            Some(2) => Transfers::TwoTransfers,
            Some(c) => Transfers::Other(c),
        })
    }

    fn encode(&self) -> Option<i32> {
        match self {
            Transfers::Unlimited => None,
            Transfers::NoTransfer => Some(0),
            Transfers::UniqueTransfer => Some(1),
            Transfers::TwoTransfers => Some(2),
            Transfers::Other(c) => Some(*c),
        }
    }
}

/// `transfer_type` of a [Transfer](crate::Transfer)
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq)]
#[derivative(Default)]
pub enum TransferType {
    /// Recommended transfer point, the default
    #[derivative(Default)]
    Recommended,
    /// The departing vehicle waits for the arriving one
    Timed,
    /// Needs at least `min_transfer_time`
    MinTime,
    /// Not possible
    Impossible,
}

impl Coded for TransferType {
    const COLUMN: &'static str = "transfer_type";

    fn decode(code: Option<i32>) -> Option<Self> {
        match code {
            None | Some(0) => Some(TransferType::Recommended),
            Some(1) => Some(TransferType::Timed),
            Some(2) => Some(TransferType::MinTime),
            Some(3) => Some(TransferType::Impossible),
            Some(_) => None,
        }
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            TransferType::Recommended => 0,
            TransferType::Timed => 1,
            TransferType::MinTime => 2,
            TransferType::Impossible => 3,
        })
    }
}

/// `pathway_mode` of a [Pathway](crate::Pathway)
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq)]
#[derivative(Default)]
pub enum PathwayMode {
    /// Walkway
    #[derivative(Default)]
    Walkway,
    /// Stairs
    Stairs,
    /// Moving sidewalk
    MovingSidewalk,
    /// Escalator
    Escalator,
    /// Elevator
    Elevator,
    /// Entering the area where a proof of payment is needed
    FareGate,
    /// Leaving the area where a proof of payment is needed
    ExitGate,
}

impl Coded for PathwayMode {
    const COLUMN: &'static str = "pathway_mode";

    fn decode(code: Option<i32>) -> Option<Self> {
        match code? {
            1 => Some(PathwayMode::Walkway),
            2 => Some(PathwayMode::Stairs),
            3 => Some(PathwayMode::MovingSidewalk),
            4 => Some(PathwayMode::Escalator),
            5 => Some(PathwayMode::Elevator),
            6 => Some(PathwayMode::FareGate),
            7 => Some(PathwayMode::ExitGate),
            _ => None,
        }
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            PathwayMode::Walkway => 1,
            PathwayMode::Stairs => 2,
            PathwayMode::MovingSidewalk => 3,
            PathwayMode::Escalator => 4,
            PathwayMode::Elevator => 5,
            PathwayMode::FareGate => 6,
            PathwayMode::ExitGate => 7,
        })
    }
}

/// `is_bidirectional` of a [Pathway](crate::Pathway)
#[derive(Debug, Derivative, Copy, Clone, PartialEq, Eq)]
#[derivative(Default)]
pub enum PathwayDirectionType {
    /// Only from `from_stop_id` to `to_stop_id`
    #[derivative(Default)]
    Unidirectional,
    /// Both ways
    Bidirectional,
}

impl Coded for PathwayDirectionType {
    const COLUMN: &'static str = "is_bidirectional";

    fn decode(code: Option<i32>) -> Option<Self> {
        match code? {
            0 => Some(PathwayDirectionType::Unidirectional),
            1 => Some(PathwayDirectionType::Bidirectional),
            _ => None,
        }
    }

    fn encode(&self) -> Option<i32> {
        Some(match self {
            PathwayDirectionType::Unidirectional => 0,
            PathwayDirectionType::Bidirectional => 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        location_type: LocationType,
        transfers: Transfers,
        transfer_type: TransferType,
        exception_type: Exception,
    }

    fn read(data: &str) -> Result<Row, csv::Error> {
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        rdr.deserialize().next().unwrap_or_else(|| panic!("no row in {}", data))
    }

    #[test]
    fn empty_cells_take_the_default() {
        let row = read("location_type,transfers,transfer_type,exception_type\n,,,1\n").unwrap();
        assert_eq!(LocationType::StopPoint, row.location_type);
        assert_eq!(Transfers::Unlimited, row.transfers);
        assert_eq!(TransferType::Recommended, row.transfer_type);
        assert_eq!(Exception::Added, row.exception_type);
    }

    #[test]
    fn unknown_codes_are_kept_when_possible() {
        let data = "location_type,transfers,transfer_type,exception_type\n7,5,3,2\n";
        let row = read(data).unwrap();
        assert_eq!(LocationType::Unknown(7), row.location_type);
        assert_eq!(Transfers::Other(5), row.transfers);

        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(&row).unwrap();
        assert_eq!(data, String::from_utf8(wtr.into_inner().unwrap()).unwrap());
    }

    #[test]
    fn invalid_codes_are_rejected() {
        assert!(read("location_type,transfers,transfer_type,exception_type\n0,,9,1\n").is_err());
        assert!(read("location_type,transfers,transfer_type,exception_type\n0,,0,\n").is_err());
        assert!(read("location_type,transfers,transfer_type,exception_type\nx,,0,1\n").is_err());
    }

    #[test]
    fn codes_survive_json() {
        let row = Row {
            location_type: LocationType::StopArea,
            transfers: Transfers::TwoTransfers,
            transfer_type: TransferType::Timed,
            exception_type: Exception::Deleted,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(row, serde_json::from_str(&json).unwrap());
    }

    #[test]
    fn extended_route_types() {
        assert_eq!(Some(RouteType::Bus), RouteType::from_code(715).basic());
        assert_eq!(None, RouteType::from_code(1100).basic());
        assert!(RouteType::from_code(1100).is_known());
        assert!(!RouteType::from_code(42).is_known());
        assert_eq!(RouteType::Monorail, RouteType::from_code(12));
    }
}
