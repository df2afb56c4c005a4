//! Errors that stop a whole copy
use gtfs_structures::{EntityKind, Error};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopyError {
    /// A table could not be read at all
    #[error("impossible to read '{file_name}'")]
    Read {
        file_name: &'static str,
        #[source]
        source: Error,
    },
    /// The writer refused a record, nothing after it is copied
    #[error("impossible to write {kind}")]
    Write {
        kind: EntityKind,
        #[source]
        source: Error,
    },
    #[error("unknown extension '{0}'")]
    UnknownExtension(String),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}
