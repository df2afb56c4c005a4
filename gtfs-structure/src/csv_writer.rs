use crate::entity::{Entity, EntityKind, Record};
use crate::writer::Writer;
use crate::Error;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Writes a feed as CSV files in a directory
///
/// Files are created when their first record is written. The identifier of a written
/// record is its key in the source feed, so the references are kept as they are.
pub struct CsvWriter {
    dir: PathBuf,
    files: HashMap<EntityKind, csv::Writer<File>>,
}

impl CsvWriter {
    /// Writer into `dir`, created if needed when the writer is opened
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
            files: HashMap::new(),
        }
    }

    fn file(&mut self, entity: &Entity) -> Result<&mut csv::Writer<File>, Error> {
        let kind = entity.kind();
        if !self.files.contains_key(&kind) {
            let file_name = kind.filename();
            let file = File::create(self.dir.join(file_name)).map_err(|e| Error::NamedFileIO {
                file_name: file_name.to_owned(),
                source: Box::new(e),
            })?;
            let mut wtr = csv::Writer::from_writer(file);
            if let Some(header) = entity.csv_header() {
                wtr.write_record(&header).map_err(|e| Error::CSVWrite {
                    file_name: file_name.to_owned(),
                    source: e,
                })?;
            }
            self.files.insert(kind, wtr);
        }
        self.files
            .get_mut(&kind)
            .ok_or_else(|| Error::MissingFile(kind.filename().to_owned()))
    }
}

impl Writer for CsvWriter {
    fn open(&mut self) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        for (kind, mut wtr) in self.files.drain() {
            wtr.flush().map_err(|e| Error::NamedFileIO {
                file_name: kind.filename().to_owned(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }

    fn add_entity(&mut self, entity: &Entity) -> Result<String, Error> {
        let wtr = self.file(entity)?;
        entity.write_csv(wtr).map_err(|e| Error::CSVWrite {
            file_name: entity.kind().filename().to_owned(),
            source: e,
        })?;
        Ok(entity.entity_key().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Agency, Level};

    #[test]
    fn files_are_created_on_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = CsvWriter::new(dir.path().join("out"));
        writer.open().unwrap();
        let agency = Agency {
            id: Some("a1".into()),
            name: "Metro".into(),
            url: "https://metro.example".into(),
            timezone: "Europe/Paris".into(),
            ..Default::default()
        };
        let id = writer.add_entity(&agency.into()).unwrap();
        assert_eq!("a1", id);
        writer.close().unwrap();

        let content = std::fs::read_to_string(dir.path().join("out/agency.txt")).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("agency_id,agency_name"));
        assert!(lines.next().unwrap().starts_with("a1,Metro,https://metro.example"));
        assert!(!dir.path().join("out/levels.txt").exists());

        let level = Level {
            id: "l0".into(),
            index: 0.0,
            name: None,
        };
        writer.add_entity(&level.into()).unwrap();
        writer.close().unwrap();
        assert!(dir.path().join("out/levels.txt").exists());
    }
}
