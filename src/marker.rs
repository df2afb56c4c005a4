//! Selective extraction: the records to keep so that a subset of a feed stays consistent
//!
//! The whole feed is read once to build a graph of the references between records.
//! Every foreign key gives a `Requires` edge from the record to the referenced one, and
//! the foreign keys expressing ownership (a trip and its stop times, a station and its
//! platforms) also give a `Contains` edge the other way.
//!
//! The closure of a selection follows `Requires` edges from every marked record, and
//! `Contains` edges only from selected records: the seeds and what they contain. A
//! route kept because a selected trip runs on it does not bring its other trips.
use crate::error::CopyError;
use crate::extension::Extension;
use gtfs_structures::{Entity, EntityKey, EntityKind, EntityStream, Reader, Record};
use log::{debug, info, warn};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The source can not exist without the target
    Requires,
    /// The target belongs to the source and follows it when the source is selected
    Contains,
}

/// A record of the source feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub key: EntityKey,
}

impl EntityRef {
    pub fn new(kind: EntityKind, key: impl Into<EntityKey>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.key)
    }
}

/// Is the reference held by `kind` in `field` a link from an owner to what it owns
fn is_ownership(kind: EntityKind, field: &str) -> bool {
    use EntityKind::*;
    matches!(
        (kind, field),
        (Route, "agency_id")
            | (Trip, "route_id")
            | (Trip, "service_id")
            | (CalendarDate, "service_id")
            | (StopTime, "trip_id")
            | (Frequency, "trip_id")
            | (Stop, "parent_station")
            | (Transfer, "from_stop_id")
            | (Pathway, "from_stop_id")
            | (FareRule, "fare_id")
    )
}

struct PendingEdge {
    from: NodeIndex,
    from_kind: EntityKind,
    field: &'static str,
    to: EntityRef,
}

/// Reference graph of a whole feed
pub struct Marker {
    graph: DiGraph<EntityRef, Relation>,
    index: FxHashMap<EntityRef, NodeIndex>,
    pending: Vec<PendingEdge>,
    dangling: usize,
    agencies: Vec<NodeIndex>,
    /// Routes and fares leaving `agency_id` empty
    agencyless: Vec<(NodeIndex, EntityKind)>,
}

impl Marker {
    /// Reads every record of the feed, extension kinds included
    pub fn build(
        reader: &dyn Reader,
        extensions: &[Box<dyn Extension>],
    ) -> Result<Self, CopyError> {
        let mut marker = Marker {
            graph: DiGraph::new(),
            index: FxHashMap::default(),
            pending: vec![],
            dangling: 0,
            agencies: vec![],
            agencyless: vec![],
        };
        marker.visit(EntityKind::Agency, reader.agencies())?;
        marker.visit(EntityKind::Route, reader.routes())?;
        marker.visit(EntityKind::Level, reader.levels())?;
        marker.visit(EntityKind::Stop, reader.stops())?;
        marker.visit(EntityKind::Calendar, reader.calendars())?;
        marker.visit(EntityKind::CalendarDate, reader.calendar_dates())?;
        marker.visit(EntityKind::Shape, reader.shapes())?;
        marker.visit(EntityKind::Trip, reader.trips())?;
        marker.visit(EntityKind::StopTime, reader.stop_times())?;
        marker.visit(EntityKind::Frequency, reader.frequencies())?;
        marker.visit(EntityKind::Transfer, reader.transfers())?;
        marker.visit(EntityKind::Pathway, reader.pathways())?;
        marker.visit(EntityKind::FareAttribute, reader.fare_attributes())?;
        marker.visit(EntityKind::FareRule, reader.fare_rules())?;
        marker.visit(EntityKind::FeedInfo, reader.feed_infos())?;
        for extension in extensions {
            for kind in extension.kinds() {
                marker.visit(kind, extension.entities(reader, kind))?;
            }
        }
        marker.link();
        info!(
            "Reference graph: {} records, {} links, {} dangling references",
            marker.graph.node_count(),
            marker.graph.edge_count(),
            marker.dangling
        );
        Ok(marker)
    }

    fn visit<T: Into<Entity>>(
        &mut self,
        kind: EntityKind,
        mut stream: EntityStream<T>,
    ) -> Result<(), CopyError> {
        while let Some(item) = stream.next() {
            match item {
                Ok(record) => self.add(record.into()),
                Err(e) if e.is_row_error() => debug!("unreadable row in {}: {}", kind, e),
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

    fn node(&mut self, entity: EntityRef) -> NodeIndex {
        if let Some(&node) = self.index.get(&entity) {
            return node;
        }
        let node = self.graph.add_node(entity.clone());
        self.index.insert(entity, node);
        node
    }

    fn add(&mut self, entity: Entity) {
        let kind = entity.kind();
        let from = self.node(EntityRef::new(kind, entity.entity_key()));
        for reference in entity.references() {
            self.pending.push(PendingEdge {
                from,
                from_kind: kind,
                field: reference.field,
                to: EntityRef::new(reference.kind, reference.key),
            });
        }
        let blank = |id: &Option<String>| id.as_deref().map_or(true, str::is_empty);
        match &entity {
            // services only defined by their exceptions
            Entity::CalendarDate(date) => {
                self.node(EntityRef::new(EntityKind::Calendar, date.service_id.as_str()));
            }
            Entity::Agency(_) if !self.agencies.contains(&from) => self.agencies.push(from),
            Entity::Route(route) if blank(&route.agency_id) => self.agencyless.push((from, kind)),
            Entity::FareAttribute(fare) if blank(&fare.agency_id) => {
                self.agencyless.push((from, kind))
            }
            _ => {}
        }
    }

    fn link(&mut self) {
        for edge in std::mem::take(&mut self.pending) {
            let Some(&to) = self.index.get(&edge.to) else {
                warn!(
                    "{} references unknown {} in {}",
                    self.graph[edge.from], edge.to, edge.field
                );
                self.dangling += 1;
                continue;
            };
            self.graph.add_edge(edge.from, to, Relation::Requires);
            if is_ownership(edge.from_kind, edge.field) {
                self.graph.add_edge(to, edge.from, Relation::Contains);
            }
            // a service is its calendar and all its exceptions
            if edge.from_kind == EntityKind::CalendarDate {
                self.graph.add_edge(to, edge.from, Relation::Requires);
            }
        }

        // agency_id can be left empty when the feed has a single agency
        let agencyless = std::mem::take(&mut self.agencyless);
        let [agency] = self.agencies[..] else {
            if !agencyless.is_empty() {
                debug!(
                    "{} records without agency_id in a feed with {} agencies",
                    agencyless.len(),
                    self.agencies.len()
                );
            }
            return;
        };
        for (from, kind) in agencyless {
            self.graph.add_edge(from, agency, Relation::Requires);
            if is_ownership(kind, "agency_id") {
                self.graph.add_edge(agency, from, Relation::Contains);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// References to records absent from the feed
    pub fn dangling(&self) -> usize {
        self.dangling
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.index.contains_key(entity)
    }

    /// Computes the records to keep for the given seeds
    ///
    /// Seeds absent from the feed are ignored.
    pub fn mark(&self, seeds: impl IntoIterator<Item = EntityRef>) -> MarkSet {
        let mut marked = vec![false; self.graph.node_count()];
        let mut selected = vec![false; self.graph.node_count()];
        let mut queue = VecDeque::new();
        for seed in seeds {
            match self.index.get(&seed) {
                Some(&node) => queue.push_back((node, true)),
                None => warn!("{} is not in the feed, ignored", seed),
            }
        }

        while let Some((node, select)) = queue.pop_front() {
            let newly_marked = !marked[node.index()];
            let newly_selected = select && !selected[node.index()];
            if !newly_marked && !newly_selected {
                continue;
            }
            marked[node.index()] = true;
            selected[node.index()] |= select;
            for edge in self.graph.edges(node) {
                match edge.weight() {
                    Relation::Requires if newly_marked => queue.push_back((edge.target(), false)),
                    Relation::Contains if newly_selected => queue.push_back((edge.target(), true)),
                    _ => {}
                }
            }
        }

        let mut marks = MarkSet::default();
        for node in self.graph.node_indices().filter(|n| marked[n.index()]) {
            marks.insert(self.graph[node].clone());
        }
        info!("{} records marked for extraction", marks.len());
        marks
    }
}

/// The records of the source feed to copy, the others are skipped
///
/// The feed information is always kept.
#[derive(Debug, Default, Clone)]
pub struct MarkSet {
    marks: FxHashMap<EntityKind, FxHashSet<EntityKey>>,
}

impl MarkSet {
    pub fn insert(&mut self, entity: EntityRef) {
        self.marks.entry(entity.kind).or_default().insert(entity.key);
    }

    pub fn contains(&self, kind: EntityKind, key: &str) -> bool {
        kind == EntityKind::FeedInfo
            || self
                .marks
                .get(&kind)
                .map_or(false, |keys| keys.contains(key))
    }

    pub fn len(&self) -> usize {
        self.marks.values().map(|keys| keys.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marked keys of one kind, sorted
    pub fn keys(&self, kind: EntityKind) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .marks
            .get(&kind)
            .into_iter()
            .flatten()
            .map(EntityKey::as_str)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Every marked record, sorted
    pub fn entities(&self) -> Vec<EntityRef> {
        let mut entities: Vec<EntityRef> = self
            .marks
            .iter()
            .flat_map(|(kind, keys)| keys.iter().map(|key| EntityRef::new(*kind, key.clone())))
            .collect();
        entities.sort();
        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use gtfs_structures::{CsvReader, EntityKind::*};

    fn marked(marks: &MarkSet) -> Vec<String> {
        marks.entities().iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn trip_brings_what_it_needs_and_what_it_contains() {
        let feed = testutil::two_trips();
        let marker = Marker::build(&feed, &[]).unwrap();
        let marks = marker.mark([EntityRef::new(Trip, "T1")]);

        let mut expected = vec![
            EntityRef::new(Agency, "A"),
            EntityRef::new(Route, "R1"),
            EntityRef::new(Stop, "S1"),
            EntityRef::new(Stop, "S2"),
            EntityRef::new(Calendar, "WK"),
            EntityRef::new(Trip, "T1"),
            EntityRef::new(StopTime, EntityKey::composite(["T1", "1"])),
            EntityRef::new(StopTime, EntityKey::composite(["T1", "2"])),
        ];
        expected.sort();
        assert_eq!(expected, marks.entities());

        assert!(!marks.contains(Trip, "T2"));
        assert!(!marks.contains(Route, "R2"));
        assert!(!marks.contains(Stop, "S3"));
        assert!(marks.contains(FeedInfo, "anything"));
    }

    #[test]
    fn parent_station_is_required() {
        let feed = testutil::two_trips();
        let marker = Marker::build(&feed, &[]).unwrap();
        let marks = marker.mark([EntityRef::new(Stop, "S4")]);
        assert_eq!(vec!["stops.txt 'S4'", "stops.txt 'ST'"], marked(&marks));
    }

    #[test]
    fn selected_station_brings_its_platforms() {
        let feed = testutil::two_trips();
        let marker = Marker::build(&feed, &[]).unwrap();
        let marks = marker.mark([EntityRef::new(Stop, "ST")]);
        assert_eq!(vec!["S4", "ST"], marks.keys(Stop));
        assert!(marks.keys(StopTime).is_empty());
    }

    #[test]
    fn marking_is_an_idempotent_union() {
        let feed = testutil::two_trips();
        let marker = Marker::build(&feed, &[]).unwrap();
        let both = marker.mark([EntityRef::new(Trip, "T1"), EntityRef::new(Trip, "T2")]);
        let t1 = marker.mark([EntityRef::new(Trip, "T1")]);
        let t2 = marker.mark([EntityRef::new(Trip, "T2"), EntityRef::new(Trip, "T2")]);
        let mut union: Vec<EntityRef> = t1.entities().into_iter().chain(t2.entities()).collect();
        union.sort();
        union.dedup();
        assert_eq!(union, both.entities());
        assert_eq!(vec!["A"], both.keys(Agency));
    }

    #[test]
    fn unknown_seeds_are_ignored() {
        let feed = testutil::two_trips();
        let marker = Marker::build(&feed, &[]).unwrap();
        let marks = marker.mark([EntityRef::new(Trip, "nope")]);
        assert!(marks.is_empty());
        assert!(marks.contains(FeedInfo, ""));
    }

    #[test]
    fn single_agency_without_id() {
        let mut feed = testutil::two_trips();
        feed.agencies[0].id = None;
        for route in feed.routes.iter_mut() {
            route.agency_id = None;
        }
        let marker = Marker::build(&feed, &[]).unwrap();
        assert_eq!(0, marker.dangling());

        let marks = marker.mark([EntityRef::new(Trip, "T1")]);
        assert_eq!(vec![""], marks.keys(Agency));
        assert_eq!(vec!["R1"], marks.keys(Route));

        let marks = marker.mark([EntityRef::new(Agency, "")]);
        assert_eq!(vec!["R1", "R2"], marks.keys(Route));
        assert_eq!(vec!["T1", "T2"], marks.keys(Trip));
    }

    #[test]
    fn routes_without_agency_in_a_feed_with_several_agencies() {
        let mut feed = testutil::two_trips();
        feed.agencies.push(testutil::agency("B"));
        feed.routes[0].agency_id = None;
        let marker = Marker::build(&feed, &[]).unwrap();

        let marks = marker.mark([EntityRef::new(Trip, "T1")]);
        assert!(marks.keys(Agency).is_empty());
        let marks = marker.mark([EntityRef::new(Trip, "T2")]);
        assert_eq!(vec!["A"], marks.keys(Agency));
    }

    #[test]
    fn dangling_references_are_counted() {
        let mut feed = testutil::two_trips();
        feed.trips.push(testutil::trip("T3", "R9", "WK"));
        let marker = Marker::build(&feed, &[]).unwrap();
        assert_eq!(1, marker.dangling());

        let marks = marker.mark([EntityRef::new(Trip, "T3")]);
        assert_eq!(vec!["T3"], marks.keys(Trip));
        assert!(marks.keys(Route).is_empty());
        assert_eq!(vec!["WK"], marks.keys(Calendar));
    }

    #[test]
    fn services_without_calendar() {
        let feed = CsvReader::new("gtfs-structure/fixtures/basic").unwrap();
        let marker = Marker::build(&feed, &[]).unwrap();
        assert!(marker.contains(&EntityRef::new(Calendar, "service2")));
        assert_eq!(0, marker.dangling());

        let marks = marker.mark([EntityRef::new(Trip, "trip2")]);
        assert_eq!(vec!["service2"], marks.keys(Calendar));
        assert_eq!(2, marks.keys(CalendarDate).len());
        assert_eq!(vec!["default_colors"], marks.keys(Route));
        // trip2 has no shape, its stops are children of stop1 or on their own
        assert!(marks.keys(Shape).is_empty());
        assert_eq!(vec!["stop1", "stop2", "stop3"], marks.keys(Stop));
        assert_eq!(vec!["L0", "L1"], marks.keys(Level));
    }

    #[test]
    fn closure_is_sound_and_minimal() {
        let feed = CsvReader::new("gtfs-structure/fixtures/basic").unwrap();
        let marker = Marker::build(&feed, &[]).unwrap();
        let marks = marker.mark([EntityRef::new(Trip, "trip1"), EntityRef::new(Stop, "stop5")]);

        for node in marker.graph.node_indices() {
            let entity = &marker.graph[node];
            let requires = marker
                .graph
                .edges(node)
                .filter(|e| *e.weight() == Relation::Requires)
                .map(|e| &marker.graph[e.target()]);
            if marks.contains(entity.kind, entity.key.as_str()) {
                for target in requires {
                    assert!(
                        marks.contains(target.kind, target.key.as_str()),
                        "{} requires {}",
                        entity,
                        target
                    );
                }
            }
        }

        // no other trip, and none of the things only trip2 uses
        assert_eq!(vec!["trip1"], marks.keys(Trip));
        assert_eq!(vec!["1"], marks.keys(Route));
        assert_eq!(vec!["service1"], marks.keys(Calendar));
        assert!(!marks.contains(Route, "default_colors"));
        assert!(!marks.contains(Calendar, "service2"));
        assert_eq!(vec!["A_shp"], marks.keys(Shape));
        assert_eq!(1, marks.keys(Frequency).len());
        assert_eq!(1, marks.keys(Pathway).len());
    }
}
