//! Small in-memory feeds for the tests
use chrono::NaiveDate;
use gtfs_structures::*;

pub fn agency(id: &str) -> Agency {
    Agency {
        id: Some(id.into()),
        name: format!("Agency {}", id),
        url: "https://transit.example".into(),
        timezone: "America/Los_Angeles".into(),
        ..Default::default()
    }
}

pub fn route(id: &str, agency_id: &str) -> Route {
    Route {
        id: id.into(),
        short_name: id.into(),
        agency_id: Some(agency_id.into()),
        route_type: RouteType::Bus,
        ..Default::default()
    }
}

pub fn stop(id: &str) -> Stop {
    Stop {
        id: id.into(),
        name: format!("Stop {}", id),
        latitude: Some(37.77),
        longitude: Some(-122.42),
        ..Default::default()
    }
}

pub fn station(id: &str) -> Stop {
    Stop {
        location_type: LocationType::StopArea,
        ..stop(id)
    }
}

pub fn platform(id: &str, parent: &str) -> Stop {
    Stop {
        parent_station: Some(parent.into()),
        ..stop(id)
    }
}

pub fn calendar(id: &str) -> Calendar {
    Calendar {
        monday: true,
        tuesday: true,
        wednesday: true,
        thursday: true,
        friday: true,
        ..Calendar::without_weekdays(id, date(2024, 1, 1), date(2024, 12, 31))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn trip(id: &str, route_id: &str, service_id: &str) -> Trip {
    Trip {
        id: id.into(),
        route_id: route_id.into(),
        service_id: service_id.into(),
        ..Default::default()
    }
}

pub fn stop_time(trip_id: &str, stop_id: &str, sequence: u32, time: Option<u32>) -> StopTime {
    StopTime {
        trip_id: trip_id.into(),
        stop_id: stop_id.into(),
        stop_sequence: sequence,
        arrival_time: time,
        departure_time: time,
        ..Default::default()
    }
}

pub fn feed_info() -> FeedInfo {
    FeedInfo {
        name: "Transit".into(),
        url: "https://transit.example".into(),
        lang: "en".into(),
        ..Default::default()
    }
}

/// One agency running two routes, with one weekday trip each
///
/// T1 serves S1 and S2, T2 serves S2, S3 and the platform S4 of the station ST.
pub fn two_trips() -> DirectReader {
    DirectReader {
        agencies: vec![agency("A")],
        routes: vec![route("R1", "A"), route("R2", "A")],
        stops: vec![
            stop("S1"),
            stop("S2"),
            stop("S3"),
            station("ST"),
            platform("S4", "ST"),
        ],
        calendars: vec![calendar("WK")],
        trips: vec![trip("T1", "R1", "WK"), trip("T2", "R2", "WK")],
        stop_times: vec![
            stop_time("T1", "S1", 1, Some(8 * 3600)),
            stop_time("T1", "S2", 2, Some(8 * 3600 + 600)),
            stop_time("T2", "S2", 1, Some(9 * 3600)),
            stop_time("T2", "S3", 2, Some(9 * 3600 + 600)),
            stop_time("T2", "S4", 3, Some(9 * 3600 + 1200)),
        ],
        feed_infos: vec![feed_info()],
        ..Default::default()
    }
}
