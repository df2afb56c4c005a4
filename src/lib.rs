/*! Copies GTFS feeds between storage backends, validating them on the way, and
extracts consistent subsets of them.

A [Copier] reads every table of a feed from a [Reader](gtfs_structures::Reader) and
writes it to a [Writer](gtfs_structures::Writer). The writer gives each record its own
identifier, and the references between records are rewritten with these identifiers.

A [Marker] computes the records to keep when only a part of a feed is wanted, from a
[Selection] of agencies, routes, stops, trips or calendars.
*/
pub mod copier;
pub mod entity_map;
pub mod error;
pub mod ext;
pub mod extension;
pub mod filters;
pub mod marker;
pub mod result;
pub mod selection;
pub mod sqlite;
pub mod stop_times;

#[cfg(test)]
mod testutil;

pub use copier::{Copier, Options};
pub use entity_map::EntityMap;
pub use error::CopyError;
pub use extension::{extension_names, get_extension, Extension};
pub use filters::{Filter, SetterFilter};
pub use marker::{EntityRef, MarkSet, Marker};
pub use result::{CopyResult, EntityIssue, IssueClass, KindSummary};
pub use selection::Selection;
pub use sqlite::SqliteWriter;
