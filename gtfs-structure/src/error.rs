//! Module for the error management
use serde::Serialize;
use thiserror::Error;

/// Specific line from a CSV file that could not be read
#[derive(Debug, Clone)]
pub struct LineError {
    /// Headers of the CSV file
    pub headers: Vec<String>,
    /// Values of the line that could not be parsed
    pub values: Vec<String>,
}

/// An error that can occur when reading or writing GTFS data.
#[derive(Error, Debug)]
pub enum Error {
    /// A mandatory file is not present in the archive
    #[error("Cound not find file {0}")]
    MissingFile(String),
    /// The given path to the GTFS is neither a file nor a directory
    #[error("Could not read GTFS: {0} is neither a file nor a directory")]
    NotFileNorDirectory(String),
    /// Generic Input/Output error while reading a file
    #[error("impossible to read file")]
    IO(#[from] std::io::Error),
    /// Impossible to read a file
    #[error("impossible to read '{file_name}'")]
    NamedFileIO {
        /// The file name that could not be read
        file_name: String,
        /// The inital error that caused the unability to read the file
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Impossible to read a CSV file
    #[error("impossible to read csv file '{file_name}'")]
    CSVError {
        /// File name that could not be parsed as CSV
        file_name: String,
        /// The initial error by the csv library
        #[source]
        source: csv::Error,
        /// The line that could not be parsed by the csv library
        line_in_error: Option<LineError>,
    },
    /// Impossible to write a CSV file
    #[error("impossible to write csv file '{file_name}'")]
    CSVWrite {
        /// File name that could not be written
        file_name: String,
        /// The initial error by the csv library
        #[source]
        source: csv::Error,
    },
    /// Error when trying to unzip the GTFS archive
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// A row of a table that could not be turned into a record
    #[error("invalid row in '{file_name}'")]
    InvalidRow {
        /// File holding the row
        file_name: String,
        /// What is wrong with the row
        #[source]
        source: EntityError,
    },
    /// The storage backend refused an operation
    #[error("storage backend error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The reader or writer does not provide this capability
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
}

impl Error {
    /// True when the error concerns a single row that could not be deserialized.
    ///
    /// Such errors are local to one record: the rest of the file is still readable.
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            Error::CSVError {
                line_in_error: Some(_),
                ..
            } | Error::InvalidRow { .. }
        )
    }
}

/// A problem found on a single record: a broken reference, a missing or invalid value.
///
/// These are never fatal by themselves, the copier decides if the record is kept.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum EntityError {
    /// A foreign key points to a record that was not written
    #[error("invalid reference in {field}: '{value}' is not known")]
    InvalidReference {
        /// Column holding the reference
        field: &'static str,
        /// Value of the reference in the source feed
        value: String,
    },
    /// A mandatory value is empty
    #[error("required field {0} is missing")]
    RequiredFieldMissing(&'static str),
    /// A value is mandatory given the other values of the record
    #[error("conditionally required field {0} is missing")]
    ConditionallyRequiredField(&'static str),
    /// A value is present but not acceptable
    #[error("invalid value '{value}' for {field}: {reason}")]
    InvalidField {
        /// Column holding the value
        field: String,
        /// The offending value
        value: String,
        /// Why the value is rejected
        reason: String,
    },
    /// A timezone that is not in the tz database
    #[error("invalid timezone '{value}' for {field}")]
    InvalidTimezone {
        /// Column holding the timezone
        field: &'static str,
        /// The unknown timezone
        value: String,
    },
    /// The row could not be turned into a record
    #[error("could not parse row: {0}")]
    Parse(String),
    /// Another record of the same kind has the same key
    #[error("duplicate key '{0}'")]
    DuplicateKey(String),
}

impl EntityError {
    /// Shorthand to build an [EntityError::InvalidField]
    pub fn invalid_field(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        EntityError::InvalidField {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
