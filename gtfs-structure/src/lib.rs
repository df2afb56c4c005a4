/*! The [General Transit Feed Specification](https://gtfs.org/) (GTFS) is a commonly used model to represent public transit data.

This crates brings [serde](https://serde.rs) structures of this model, and the streaming readers and writers
used to copy a feed from one storage to another.

To get started, see [CsvReader] and [Entity].

## What is GTFS

A Gtfs feed is a collection of CSV files (often bundled as a zip file).
Each file represents a collection of one type (stops, lines, etc.) that have relationships through unique identifiers.

## Design decisions

### Streaming

Feeds can hold millions of stop times, so no table is ever fully loaded in memory.
A [Reader] gives, for each table, an [EntityStream]: a lazy sequence of records that can be
closed before its end. Grouped tables (stop times by trip, shape points by shape) are built chunk by chunk.

### Records

Every record implements [Record]: it knows its natural key, the references it holds toward other records,
how to rewrite those references once the referenced records have been written elsewhere, and which
business rules it breaks. [Entity] is the closed set of all records, extensions included.

### Use of Enum

Many values are integers that are actually enumerations of certain values. We always use Rust enums, like [LocationType] to represent them, and not the integer value.

### Reference

We try to stick as closely as possible to the reference. Optional fields are [std::option], while missing mandatory elements will result in an error.
If a default value is defined, we will use it.

There are two references <https://gtfs.org/reference/static> and <https://developers.google.com/transit/gtfs/reference>. They are mostly the same, even if google’s specification has some extensions.

### Renaming

We kept some names even if they can be confusing (a [Calendar] will be referenced by `service_id`), but we strip the object type (`route_short_name` is [Route::short_name]).

*/
#![warn(missing_docs)]

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate serde_derive;

mod csv_reader;
mod csv_writer;
pub mod direct;
pub mod entity;
mod enums;
pub mod error;
pub(crate) mod objects;
pub mod reader;
mod serde_helpers;
pub mod stream;
pub mod timezones;
pub mod writer;


pub use csv_reader::{CsvOptions, CsvReader};
pub use csv_writer::CsvWriter;
pub use direct::{DirectReader, DirectWriter};
pub use entity::{
    update_key, update_optional_key, Entity, EntityKey, EntityKind, ExtensionRecord, Record,
    Reference, ResolveKey,
};
pub use error::{EntityError, Error};
pub use objects::*;
pub use reader::{Reader, Row};
pub use stream::{EntityStream, Sink};
pub use writer::Writer;
