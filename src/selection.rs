//! The records a user asks to extract
use crate::error::CopyError;
use crate::marker::EntityRef;
use gtfs_structures::{EntityKind, Reader, RouteType};
use log::debug;

/// Keys of the source feed, by kind
#[derive(Debug, Default, Clone)]
pub struct Selection {
    pub agencies: Vec<String>,
    pub routes: Vec<String>,
    pub stops: Vec<String>,
    pub trips: Vec<String>,
    pub calendars: Vec<String>,
    /// Every route of one of these `route_type` codes
    pub route_types: Vec<i32>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.agencies.is_empty()
            && self.routes.is_empty()
            && self.stops.is_empty()
            && self.trips.is_empty()
            && self.calendars.is_empty()
            && self.route_types.is_empty()
    }

    /// The records to start the marking from
    ///
    /// Route types are expanded into the routes of the feed having them.
    pub fn seeds(&self, reader: &dyn Reader) -> Result<Vec<EntityRef>, CopyError> {
        let keyed = [
            (EntityKind::Agency, &self.agencies),
            (EntityKind::Route, &self.routes),
            (EntityKind::Stop, &self.stops),
            (EntityKind::Trip, &self.trips),
            (EntityKind::Calendar, &self.calendars),
        ];
        let mut seeds: Vec<EntityRef> = keyed
            .iter()
            .flat_map(|(kind, keys)| keys.iter().map(|key| EntityRef::new(*kind, key.as_str())))
            .collect();

        if self.route_types.is_empty() {
            return Ok(seeds);
        }
        if let Some(code) = self
            .route_types
            .iter()
            .find(|code| !RouteType::from_code(**code).is_known())
        {
            return Err(CopyError::InvalidSelection(format!(
                "unknown route_type {}",
                code
            )));
        }

        let mut routes = reader.routes();
        while let Some(route) = routes.next() {
            match route {
                Ok(route) if self.route_types.contains(&route.route_type.code()) => {
                    seeds.push(EntityRef::new(EntityKind::Route, route.id.as_str()))
                }
                Ok(_) => {}
                Err(e) if e.is_row_error() => debug!("unreadable route: {}", e),
                Err(source) => {
                    routes.close();
                    return Err(CopyError::Read {
                        file_name: EntityKind::Route.filename(),
                        source,
                    });
                }
            }
        }
        Ok(seeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_structures::CsvReader;

    fn basic() -> CsvReader {
        CsvReader::new("gtfs-structure/fixtures/basic").unwrap()
    }

    fn keys(seeds: &[EntityRef]) -> Vec<String> {
        seeds.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keys_become_seeds() {
        let selection = Selection {
            trips: vec!["trip1".into()],
            stops: vec!["stop5".into(), "stop2".into()],
            ..Default::default()
        };
        assert!(!selection.is_empty());
        assert!(Selection::default().is_empty());
        assert_eq!(
            vec!["stops.txt 'stop5'", "stops.txt 'stop2'", "trips.txt 'trip1'"],
            keys(&selection.seeds(&basic()).unwrap())
        );
    }

    #[test]
    fn route_types_are_expanded() {
        let extended = Selection {
            route_types: vec![715],
            ..Default::default()
        };
        assert_eq!(
            vec!["routes.txt 'shuttle'"],
            keys(&extended.seeds(&basic()).unwrap())
        );

        let buses = Selection {
            route_types: vec![3],
            ..Default::default()
        };
        assert_eq!(
            vec!["routes.txt '1'", "routes.txt 'default_colors'"],
            keys(&buses.seeds(&basic()).unwrap())
        );
    }

    #[test]
    fn unknown_route_type() {
        let selection = Selection {
            route_types: vec![42],
            ..Default::default()
        };
        assert!(matches!(
            selection.seeds(&basic()),
            Err(CopyError::InvalidSelection(_))
        ));
    }
}
