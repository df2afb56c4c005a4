use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gtfs_copier::{Copier, Marker, Options, Selection, SetterFilter, SqliteWriter};
use gtfs_structures::{CsvReader, CsvWriter, Reader, Writer};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "gtfs-copier", version, about = "Copies, validates and extracts GTFS feeds")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copies a whole feed
    Copy {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Copies the selected records and everything they need
    Extract {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        options: OptionArgs,
        #[command(flatten)]
        extract: ExtractArgs,
    },
}

#[derive(Args)]
struct IoArgs {
    /// Directory or zip archive of the feed
    reader: String,
    /// Output directory, or SQLite database (*.db, *.sqlite or sqlite://path)
    writer: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum SummaryFormat {
    Text,
    Json,
}

#[derive(Args)]
struct OptionArgs {
    /// Write records breaking a rule, with a warning
    #[arg(long)]
    allow_entity_errors: bool,
    /// Write records with unknown references, leaving the references empty
    #[arg(long)]
    allow_reference_errors: bool,
    #[arg(long)]
    normalize_timezones: bool,
    /// Replace extended route types by their basic equivalent
    #[arg(long)]
    use_basic_route_types: bool,
    /// Create calendars for the services only defined by calendar_dates.txt
    #[arg(long)]
    normalize_service_ids: bool,
    #[arg(long)]
    interpolate_stop_times: bool,
    /// Simplify the shapes with this tolerance, in degrees
    #[arg(long, value_name = "TOLERANCE")]
    simplify_shapes: Option<f64>,
    /// Enable an extension, e.g. plus
    #[arg(long = "ext", value_name = "NAME")]
    extensions: Vec<String>,
    /// Errors and warnings kept per file in the summary
    #[arg(long, default_value_t = 1000)]
    error_limit: usize,
    #[arg(long)]
    write_extra_columns: bool,
    /// Existing feed version of the database to write the records with
    #[arg(long)]
    fvid: Option<i64>,
    /// Create the missing database tables
    #[arg(long)]
    create: bool,
    #[arg(long, value_enum, default_value_t = SummaryFormat::Text)]
    summary: SummaryFormat,
}

#[derive(Args)]
struct ExtractArgs {
    #[arg(long = "extract-agency", value_name = "AGENCY_ID")]
    agencies: Vec<String>,
    #[arg(long = "extract-route", value_name = "ROUTE_ID")]
    routes: Vec<String>,
    #[arg(long = "extract-stop", value_name = "STOP_ID")]
    stops: Vec<String>,
    #[arg(long = "extract-trip", value_name = "TRIP_ID")]
    trips: Vec<String>,
    #[arg(long = "extract-calendar", value_name = "SERVICE_ID")]
    calendars: Vec<String>,
    /// Every route of this route_type
    #[arg(long = "extract-route-type", value_name = "CODE")]
    route_types: Vec<i32>,
    /// Override a value of the output
    #[arg(long = "set", value_name = "FILENAME,ID,COLUMN,VALUE")]
    set: Vec<String>,
}

impl From<&OptionArgs> for Options {
    fn from(args: &OptionArgs) -> Self {
        Options {
            allow_entity_errors: args.allow_entity_errors,
            allow_reference_errors: args.allow_reference_errors,
            normalize_timezones: args.normalize_timezones,
            use_basic_route_types: args.use_basic_route_types,
            normalize_service_ids: args.normalize_service_ids,
            interpolate_stop_times: args.interpolate_stop_times,
            simplify_shapes: args.simplify_shapes,
            extensions: args.extensions.clone(),
            error_limit: args.error_limit,
        }
    }
}

impl ExtractArgs {
    fn selection(&self) -> Selection {
        Selection {
            agencies: self.agencies.clone(),
            routes: self.routes.clone(),
            stops: self.stops.clone(),
            trips: self.trips.clone(),
            calendars: self.calendars.clone(),
            route_types: self.route_types.clone(),
        }
    }
}

fn sqlite_path(writer: &str) -> Option<&str> {
    if let Some(path) = writer.strip_prefix("sqlite://") {
        return Some(path);
    }
    if writer.ends_with(".db") || writer.ends_with(".sqlite") {
        return Some(writer);
    }
    None
}

fn open_writer(
    io: &IoArgs,
    args: &OptionArgs,
    reader: &dyn Reader,
    options: &mut Options,
) -> Result<Box<dyn Writer>> {
    let Some(path) = sqlite_path(&io.writer) else {
        let mut writer = CsvWriter::new(&io.writer);
        writer
            .open()
            .with_context(|| format!("impossible to create {}", io.writer))?;
        return Ok(Box::new(writer));
    };

    let mut writer = SqliteWriter::open(path)
        .with_context(|| format!("impossible to open database {}", path))?
        .create_schema(args.create);
    writer.open().context("impossible to start the transaction")?;
    match args.fvid {
        Some(id) => writer.set_feed_version_id(id),
        None => {
            let id = writer
                .create_feed_version(reader)
                .context("impossible to create the feed version")?;
            info!("Created feed version {}", id);
        }
    }
    // the database references services by calendar
    options.normalize_service_ids = true;
    Ok(Box::new(writer))
}

fn run(io: IoArgs, args: OptionArgs, extract: Option<ExtractArgs>) -> Result<()> {
    let mut reader = CsvReader::new(&io.reader)
        .with_context(|| format!("impossible to read feed {}", io.reader))?;
    reader
        .open()
        .with_context(|| format!("invalid feed {}", io.reader))?;
    let mut options = Options::from(&args);
    let mut writer = open_writer(&io, &args, &reader, &mut options)?;
    if args.write_extra_columns {
        if let Err(e) = writer.write_extra_columns(true) {
            warn!("extra columns will not be written: {}", e);
        }
    }

    let mut copier = Copier::new(&reader, &mut *writer, options)?;
    if let Some(extract) = &extract {
        let mut setter = SetterFilter::new();
        for argument in &extract.set {
            setter.add_argument(argument).with_context(|| {
                format!("invalid --set '{}', expected filename,id,column,value", argument)
            })?;
        }
        if !setter.is_empty() {
            copier.add_filter(Box::new(setter));
        }

        let selection = extract.selection();
        if !selection.is_empty() {
            let seeds = selection.seeds(&reader)?;
            let marks = Marker::build(&reader, copier.extensions())?.mark(seeds);
            copier.set_marker(marks);
        }
    }

    let result = copier.copy()?;
    writer.close().context("impossible to finish writing")?;
    reader.close().context("impossible to close the feed")?;

    match args.summary {
        SummaryFormat::Text => result.display_summary(),
        SummaryFormat::Json => println!("{}", result.to_json()?),
    }
    Ok(())
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Copy { io, options } => run(io, options, None),
        Command::Extract {
            io,
            options,
            extract,
        } => run(io, options, Some(extract)),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dispatch(Cli::parse().command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn cli(args: &[&str]) -> Result<()> {
        dispatch(Cli::try_parse_from(args)?.command)
    }

    fn feed_without(dir: &Path, missing: &str) {
        for file in std::fs::read_dir("gtfs-structure/fixtures/basic").unwrap() {
            let path = file.unwrap().path();
            let name = path.file_name().unwrap();
            if name != missing {
                std::fs::copy(&path, dir.join(name)).unwrap();
            }
        }
    }

    #[test]
    fn copy_to_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        cli(&[
            "gtfs-copier",
            "copy",
            "gtfs-structure/fixtures/basic",
            out.to_str().unwrap(),
        ])
        .unwrap();
        assert!(out.join("stops.txt").is_file());
        assert!(out.join("stop_times.txt").is_file());
    }

    #[test]
    fn feed_without_stops_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let feed = dir.path().join("feed");
        std::fs::create_dir(&feed).unwrap();
        feed_without(&feed, "stops.txt");
        let out = dir.path().join("out");

        let error = cli(&[
            "gtfs-copier",
            "copy",
            feed.to_str().unwrap(),
            out.to_str().unwrap(),
        ])
        .unwrap_err();
        assert!(format!("{:#}", error).contains("stops.txt"), "{:#}", error);
        assert!(!out.exists());
    }
}
