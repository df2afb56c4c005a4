//! The contract of a feed destination
use crate::entity::Entity;
use crate::reader::Reader;
use crate::Error;

/// Destination of a copy
///
/// The writer gives every record an identifier, which can differ from its key in the
/// source feed. References between records are rewritten with these identifiers.
pub trait Writer {
    /// Prepares the destination
    fn open(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Flushes and commits what was written
    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Writes one record, returns the identifier it was given
    fn add_entity(&mut self, entity: &Entity) -> Result<String, Error>;

    /// Writes several records, returns their identifiers in the same order
    fn add_entities(&mut self, entities: &[Entity]) -> Result<Vec<String>, Error> {
        entities.iter().map(|e| self.add_entity(e)).collect()
    }

    /// Registers a new version of the feed read by `reader`, returns its identifier
    fn create_feed_version(&mut self, _reader: &dyn Reader) -> Result<i64, Error> {
        Err(Error::Unsupported("feed versions"))
    }

    /// Keeps the columns that are not part of the record model
    fn write_extra_columns(&mut self, _enabled: bool) -> Result<(), Error> {
        Err(Error::Unsupported("extra columns"))
    }
}
