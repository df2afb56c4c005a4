use sha2::{Digest, Sha256};

use crate::error::LineError;
use crate::objects::*;
use crate::reader::{Reader, Row};
use crate::stream::{EntityStream, Sink, DEFAULT_BUFFER};
use crate::Error;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Files that must be present in every feed
const MANDATORY_FILES: [&str; 5] = [
    "agency.txt",
    "routes.txt",
    "stops.txt",
    "trips.txt",
    "stop_times.txt",
];

/// Allows to parameterize how the CSV files are read
#[derive(Derivative, Debug, Clone)]
#[derivative(Default)]
pub struct CsvOptions {
    /// Avoid trimming the fields
    ///
    /// It is quite time consumming
    /// If performance is an issue, and if your data is high quality, you can switch it off
    #[derivative(Default(value = "true"))]
    pub trim_fields: bool,
    /// Number of lines of a grouped file (stop_times.txt, shapes.txt) kept in memory at once
    #[derivative(Default(value = "1_000_000"))]
    pub chunk_size: usize,
    /// Number of records read ahead of the consumer
    #[derivative(Default(value = "DEFAULT_BUFFER"))]
    pub buffer: usize,
}

#[derive(Debug, Clone)]
enum Source {
    Directory(PathBuf),
    Zip {
        path: PathBuf,
        entries: HashMap<String, usize>,
    },
}

impl Source {
    fn contains(&self, file_name: &str) -> bool {
        match self {
            Source::Directory(dir) => dir.join(file_name).is_file(),
            Source::Zip { entries, .. } => entries.contains_key(file_name),
        }
    }

    /// Calls `f` on the content of `file_name`, returns false if the file is absent
    fn read_with<F>(&self, file_name: &str, f: F) -> Result<bool, Error>
    where
        F: FnOnce(&mut dyn Read) -> Result<(), Error>,
    {
        let named = |e: std::io::Error| Error::NamedFileIO {
            file_name: file_name.to_owned(),
            source: Box::new(e),
        };
        match self {
            Source::Directory(dir) => {
                let path = dir.join(file_name);
                if !path.is_file() {
                    return Ok(false);
                }
                let mut file = std::io::BufReader::new(File::open(path).map_err(named)?);
                f(&mut file)?;
            }
            Source::Zip { path, entries } => {
                let Some(index) = entries.get(file_name) else {
                    return Ok(false);
                };
                let file = File::open(path).map_err(named)?;
                let mut archive = zip::ZipArchive::new(std::io::BufReader::new(file))?;
                let mut entry = archive.by_index(*index).map_err(|e| Error::NamedFileIO {
                    file_name: file_name.to_owned(),
                    source: Box::new(e),
                })?;
                f(&mut entry)?;
            }
        }
        Ok(true)
    }
}

/// Reads a feed stored as CSV files, in a directory or in a zip archive
///
/// Nothing is loaded in memory: every table is read lazily from a background thread,
/// and read again from the start each time it is asked for.
///
/// ```
/// use gtfs_structures::{CsvReader, Reader};
/// let mut reader = gtfs_structures::CsvReader::new("fixtures/basic")?.trim_fields(false);
/// reader.open()?;
/// assert_eq!(5, reader.stops().count());
/// # Ok::<(), gtfs_structures::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct CsvReader {
    source: Source,
    options: CsvOptions,
}

impl CsvReader {
    /// Reader over a local zip archive or directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let p = path.as_ref();
        let source = if p.is_file() {
            let mut archive = zip::ZipArchive::new(std::io::BufReader::new(File::open(p)?))?;
            let mut entries = HashMap::new();
            for i in 0..archive.len() {
                let archive_file = archive.by_index(i)?;
                // Some archives put the files in a sub directory
                if let Some(name) = Path::new(archive_file.name())
                    .file_name()
                    .and_then(|f| f.to_str())
                {
                    entries.entry(name.to_owned()).or_insert(i);
                }
            }
            Source::Zip {
                path: p.to_owned(),
                entries,
            }
        } else if p.is_dir() {
            Source::Directory(p.to_owned())
        } else {
            return Err(Error::NotFileNorDirectory(format!("{}", p.display())));
        };
        Ok(Self {
            source,
            options: CsvOptions::default(),
        })
    }

    /// Replaces all the options at once
    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }

    /// Should the fields be trimmed (default: true)
    ///
    /// Returns Self and can be chained
    pub fn trim_fields(mut self, trim_fields: bool) -> Self {
        self.options.trim_fields = trim_fields;
        self
    }

    /// Maximum number of lines of stop_times.txt or shapes.txt held in memory while grouping (default: 1,000,000)
    ///
    /// Returns Self and can be chained
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.options.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of records read ahead of the consumer (default: 1024)
    ///
    /// Returns Self and can be chained
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.options.buffer = buffer;
        self
    }

    fn objects<O>(&self, file_name: &'static str) -> EntityStream<O>
    where
        O: DeserializeOwned + Send + 'static,
    {
        let source = self.source.clone();
        let trim = self.options.trim_fields;
        EntityStream::spawn_with_buffer(self.options.buffer, move |sink| {
            let read = source.read_with(file_name, |reader| {
                for_each_record(reader, file_name, trim, |headers, rec| {
                    sink.send(deserialize_record(headers, rec, file_name))
                })
            });
            send_error(&sink, read);
        })
    }

    /// Groups the lines of `file_name` by the value of `key_column`
    ///
    /// A first pass counts the lines of every key, then the file is read once per
    /// chunk of keys, so that no more than `chunk_size` lines are held in memory.
    /// Groups are produced in the order their key first appears in the file.
    fn grouped<O, T, F>(
        &self,
        file_name: &'static str,
        key_column: &'static str,
        make: F,
    ) -> EntityStream<T>
    where
        O: DeserializeOwned + Send + 'static,
        T: Send + 'static,
        F: Fn(String, Vec<O>) -> T + Send + 'static,
    {
        let source = self.source.clone();
        let trim = self.options.trim_fields;
        let chunk_size = self.options.chunk_size.max(1);
        EntityStream::spawn_with_buffer(self.options.buffer, move |sink| {
            let mut keys: Vec<(String, usize)> = vec![];
            let mut positions: HashMap<String, usize> = HashMap::new();
            let counted = source.read_with(file_name, |reader| {
                for_each_record(reader, file_name, trim, |headers, rec| {
                    let key = column(headers, rec, key_column).unwrap_or_default();
                    match positions.get(key) {
                        Some(&i) => keys[i].1 += 1,
                        None => {
                            positions.insert(key.to_owned(), keys.len());
                            keys.push((key.to_owned(), 1));
                        }
                    }
                    true
                })
            });
            match counted {
                Ok(true) => {}
                other => return send_error(&sink, other),
            }
            drop(positions);

            for chunk in chunks(&keys, chunk_size) {
                let wanted: HashSet<&str> = chunk.iter().map(|(k, _)| k.as_str()).collect();
                let mut groups: HashMap<String, Vec<O>> = HashMap::new();
                let mut open = true;
                let read = source.read_with(file_name, |reader| {
                    for_each_record(reader, file_name, trim, |headers, rec| {
                        let key = column(headers, rec, key_column).unwrap_or_default();
                        if !wanted.contains(key) {
                            return true;
                        }
                        match deserialize_record(headers, rec, file_name) {
                            Ok(obj) => {
                                groups.entry(key.to_owned()).or_default().push(obj);
                                true
                            }
                            Err(e) => {
                                open = sink.send(Err(e));
                                open
                            }
                        }
                    })
                });
                if !open {
                    return;
                }
                if let Err(e) = read {
                    sink.send(Err(e));
                    return;
                }
                for (key, _) in chunk {
                    if let Some(objs) = groups.remove(key.as_str()) {
                        if !sink.send(Ok(make(key.clone(), objs))) {
                            return;
                        }
                    }
                }
            }
        })
    }
}

fn send_error<T>(sink: &Sink<T>, read: Result<bool, Error>) {
    if let Err(e) = read {
        sink.send(Err(e));
    }
}

fn chunks(keys: &[(String, usize)], chunk_size: usize) -> Vec<&[(String, usize)]> {
    let mut result = vec![];
    let mut start = 0;
    let mut lines = 0;
    for (i, (_, count)) in keys.iter().enumerate() {
        lines += count;
        if lines >= chunk_size {
            result.push(&keys[start..=i]);
            start = i + 1;
            lines = 0;
        }
    }
    if start < keys.len() {
        result.push(&keys[start..]);
    }
    result
}

fn column<'r>(
    headers: &csv::StringRecord,
    rec: &'r csv::StringRecord,
    name: &str,
) -> Option<&'r str> {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|i| rec.get(i))
}

fn deserialize_record<O: DeserializeOwned>(
    headers: &csv::StringRecord,
    rec: &csv::StringRecord,
    file_name: &str,
) -> Result<O, Error> {
    rec.deserialize(Some(headers)).map_err(|e| Error::CSVError {
        file_name: file_name.to_owned(),
        source: e,
        line_in_error: Some(LineError {
            headers: headers.into_iter().map(String::from).collect(),
            values: rec.into_iter().map(String::from).collect(),
        }),
    })
}

/// Calls `f` on each line of a CSV file until it returns false
fn for_each_record<F>(
    reader: &mut dyn Read,
    file_name: &str,
    trim: bool,
    mut f: F,
) -> Result<(), Error>
where
    F: FnMut(&csv::StringRecord, &csv::StringRecord) -> bool,
{
    let csv_error = |e: csv::Error| Error::CSVError {
        file_name: file_name.to_owned(),
        source: e,
        line_in_error: None,
    };
    let mut bom = Vec::with_capacity(3);
    (&mut *reader)
        .take(3)
        .read_to_end(&mut bom)
        .map_err(|e| Error::NamedFileIO {
            file_name: file_name.to_owned(),
            source: Box::new(e),
        })?;
    let head: &[u8] = if bom != [0xefu8, 0xbbu8, 0xbfu8] {
        &bom
    } else {
        &[]
    };
    let chained = head.chain(reader);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(if trim {
            csv::Trim::Fields
        } else {
            csv::Trim::None
        })
        .from_reader(chained);
    let headers = reader.headers().map_err(csv_error)?.clone();

    // Pre-allocate a StringRecord for performance reasons
    let mut rec = csv::StringRecord::new();
    while reader.read_record(&mut rec).map_err(csv_error)? {
        if !f(&headers, &rec) {
            break;
        }
    }
    Ok(())
}

impl Reader for CsvReader {
    fn open(&mut self) -> Result<(), Error> {
        for file_name in MANDATORY_FILES {
            if !self.source.contains(file_name) {
                return Err(Error::MissingFile(file_name.to_owned()));
            }
        }
        if !self.source.contains("calendar.txt") && !self.source.contains("calendar_dates.txt") {
            return Err(Error::MissingFile("calendar.txt".to_owned()));
        }
        Ok(())
    }

    fn sha256(&self) -> Result<String, Error> {
        let mut hasher = Sha256::new();
        match &self.source {
            Source::Zip { path, .. } => {
                let mut file = std::io::BufReader::new(File::open(path)?);
                std::io::copy(&mut file, &mut hasher)?;
            }
            Source::Directory(dir) => {
                let mut files = std::fs::read_dir(dir)?
                    .filter_map(|d| d.ok().map(|d| d.path()))
                    .filter(|p| p.is_file())
                    .collect::<Vec<_>>();
                files.sort();
                for path in files {
                    let mut file = std::io::BufReader::new(File::open(path)?);
                    std::io::copy(&mut file, &mut hasher)?;
                }
            }
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn contains(&self, file_name: &str) -> bool {
        self.source.contains(file_name)
    }

    fn agencies(&self) -> EntityStream<Agency> {
        self.objects("agency.txt")
    }

    fn routes(&self) -> EntityStream<Route> {
        self.objects("routes.txt")
    }

    fn levels(&self) -> EntityStream<Level> {
        self.objects("levels.txt")
    }

    fn stops(&self) -> EntityStream<Stop> {
        self.objects("stops.txt")
    }

    fn calendars(&self) -> EntityStream<Calendar> {
        self.objects("calendar.txt")
    }

    fn calendar_dates(&self) -> EntityStream<CalendarDate> {
        self.objects("calendar_dates.txt")
    }

    fn shapes(&self) -> EntityStream<Shape> {
        self.grouped("shapes.txt", "shape_id", Shape::from_points)
    }

    fn trips(&self) -> EntityStream<Trip> {
        self.objects("trips.txt")
    }

    fn stop_times(&self) -> EntityStream<StopTime> {
        self.objects("stop_times.txt")
    }

    fn stop_times_by_trip(&self) -> EntityStream<Vec<StopTime>> {
        self.grouped(
            "stop_times.txt",
            "trip_id",
            |_trip_id, mut stop_times: Vec<StopTime>| {
                stop_times.sort_by_key(|st| st.stop_sequence);
                stop_times
            },
        )
    }

    fn frequencies(&self) -> EntityStream<Frequency> {
        self.objects("frequencies.txt")
    }

    fn transfers(&self) -> EntityStream<Transfer> {
        self.objects("transfers.txt")
    }

    fn pathways(&self) -> EntityStream<Pathway> {
        self.objects("pathways.txt")
    }

    fn fare_attributes(&self) -> EntityStream<FareAttribute> {
        self.objects("fare_attributes.txt")
    }

    fn fare_rules(&self) -> EntityStream<FareRule> {
        self.objects("fare_rules.txt")
    }

    fn feed_infos(&self) -> EntityStream<FeedInfo> {
        self.objects("feed_info.txt")
    }

    fn rows(&self, file_name: &str) -> EntityStream<Row> {
        let source = self.source.clone();
        let trim = self.options.trim_fields;
        let file_name = file_name.to_owned();
        EntityStream::spawn_with_buffer(self.options.buffer, move |sink| {
            let mut shared_headers: Option<Arc<csv::StringRecord>> = None;
            let read = source.read_with(&file_name, |reader| {
                for_each_record(reader, &file_name, trim, |headers, rec| {
                    let headers = shared_headers
                        .get_or_insert_with(|| Arc::new(headers.clone()))
                        .clone();
                    sink.send(Ok(Row::new(headers, rec.clone())))
                })
            });
            send_error(&sink, read);
        })
    }
}
