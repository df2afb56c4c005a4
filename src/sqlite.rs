//! Writes a feed into a SQLite database
//!
//! Every kind has its own table holding the record as JSON, and the row id is the
//! identifier used by the references. A whole copy runs in one transaction, committed
//! when the writer is closed.
use chrono::Utc;
use gtfs_structures::{Entity, EntityKind, Error, Reader, Record, Writer};
use log::{debug, warn};
use rusqlite::{params, Connection};
use rustc_hash::FxHashSet;
use std::path::Path;

fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(Box::new(e))
}

pub struct SqliteWriter {
    conn: Connection,
    create: bool,
    feed_version_id: Option<i64>,
    tables: FxHashSet<EntityKind>,
    in_transaction: bool,
}

impl SqliteWriter {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Ok(Self::with_connection(
            Connection::open(path).map_err(storage)?,
        ))
    }

    pub fn in_memory() -> Result<Self, Error> {
        Ok(Self::with_connection(
            Connection::open_in_memory().map_err(storage)?,
        ))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            create: false,
            feed_version_id: None,
            tables: FxHashSet::default(),
            in_transaction: false,
        }
    }

    /// Create the tables that do not exist yet
    pub fn create_schema(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Version stored with every record, when it was not created by this writer
    pub fn set_feed_version_id(&mut self, id: i64) {
        self.feed_version_id = Some(id);
    }

    pub fn feed_version_id(&self) -> Option<i64> {
        self.feed_version_id
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn table(&mut self, kind: EntityKind) -> Result<(), Error> {
        if !self.create || self.tables.contains(&kind) {
            return Ok(());
        }
        let table = kind.table_name();
        debug!("creating table {}", table);
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    feed_version_id INTEGER,
                    entity_id TEXT NOT NULL,
                    data TEXT NOT NULL
                )",
                table
            ))
            .map_err(storage)?;
        self.tables.insert(kind);
        Ok(())
    }
}

impl Writer for SqliteWriter {
    fn open(&mut self) -> Result<(), Error> {
        self.conn.execute_batch("BEGIN").map_err(storage)?;
        self.in_transaction = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT").map_err(storage)?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn add_entity(&mut self, entity: &Entity) -> Result<String, Error> {
        let kind = entity.kind();
        self.table(kind)?;
        let data = entity.to_json().map_err(|e| Error::Storage(Box::new(e)))?;
        let sql = format!(
            "INSERT INTO {} (feed_version_id, entity_id, data) VALUES (?1, ?2, ?3)",
            kind.table_name()
        );
        self.conn
            .prepare_cached(&sql)
            .and_then(|mut stmt| {
                stmt.execute(params![
                    self.feed_version_id,
                    entity.entity_key().to_string(),
                    data.to_string()
                ])
            })
            .map_err(storage)?;
        Ok(self.conn.last_insert_rowid().to_string())
    }

    fn create_feed_version(&mut self, reader: &dyn Reader) -> Result<i64, Error> {
        let sha256 = reader.sha256()?;
        if self.create {
            self.conn
                .execute_batch(
                    "CREATE TABLE IF NOT EXISTS feed_versions (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        sha256 TEXT NOT NULL,
                        fetched_at TEXT NOT NULL
                    )",
                )
                .map_err(storage)?;
        }
        self.conn
            .execute(
                "INSERT INTO feed_versions (sha256, fetched_at) VALUES (?1, ?2)",
                params![sha256, Utc::now().to_rfc3339()],
            )
            .map_err(storage)?;
        let id = self.conn.last_insert_rowid();
        self.feed_version_id = Some(id);
        Ok(id)
    }
}

impl Drop for SqliteWriter {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("impossible to roll back the unfinished copy: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copier::{Copier, Options};
    use gtfs_structures::{Agency, CsvReader};

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn copy_into_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");
        let reader = CsvReader::new("gtfs-structure/fixtures/basic").unwrap();

        let mut writer = SqliteWriter::open(&path).unwrap().create_schema(true);
        writer.open().unwrap();
        assert_eq!(1, writer.create_feed_version(&reader).unwrap());
        let options = Options {
            normalize_service_ids: true,
            ..Default::default()
        };
        let result = Copier::new(&reader, &mut writer, options)
            .unwrap()
            .copy()
            .unwrap();
        writer.close().unwrap();
        drop(writer);

        let conn = Connection::open(&path).unwrap();
        assert_eq!(5, count(&conn, "gtfs_stops"));
        assert_eq!(2, count(&conn, "gtfs_trips"));
        assert_eq!(1, count(&conn, "feed_versions"));

        let route_id: i64 = conn
            .query_row("SELECT id FROM gtfs_routes WHERE entity_id = '1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(
            Some(route_id.to_string().as_str()),
            result.entity_map.get(EntityKind::Route, "1")
        );
        let (data, version): (String, i64) = conn
            .query_row(
                "SELECT data, feed_version_id FROM gtfs_trips WHERE entity_id = 'trip1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        let trip: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(route_id.to_string(), trip["route_id"]);
        assert_eq!(1, version);
    }

    #[test]
    fn unclosed_copy_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");
        {
            let mut writer = SqliteWriter::open(&path).unwrap().create_schema(true);
            writer.open().unwrap();
            let agency = Agency {
                id: Some("A".into()),
                name: "Metro".into(),
                ..Default::default()
            };
            assert_eq!("1", writer.add_entity(&agency.into()).unwrap());
        }
        let conn = Connection::open(&path).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE name = 'gtfs_agencies'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(0, tables);
    }

    #[test]
    fn missing_tables_are_a_storage_error() {
        let mut writer = SqliteWriter::in_memory().unwrap();
        writer.open().unwrap();
        let agency = Agency::default();
        assert!(matches!(
            writer.add_entity(&agency.into()),
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            writer.write_extra_columns(true),
            Err(Error::Unsupported(_))
        ));
    }
}
