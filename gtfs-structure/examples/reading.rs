use gtfs_structures::{CsvReader, Reader};

/// prints some stats about the GTFS given as a cli argument
fn main() {
    let file_path = std::env::args()
        .nth(1)
        .expect("you should put the path of the file to load");

    println!("reading file {}", &file_path);
    let mut reader = match CsvReader::new(&file_path) {
        Ok(r) => r,
        Err(e) => return eprintln!("error: {:?}", e),
    };
    if let Err(e) = reader.open() {
        return eprintln!("error: {:?}", e);
    }

    println!("  Stops: {}", reader.stops().count());
    println!("  Routes: {}", reader.routes().count());
    println!("  Trips: {}", reader.trips().count());
    println!("  Trips with stop times: {}", reader.stop_times_by_trip().count());
    println!("  Shapes: {}", reader.shapes().count());
    match reader.sha256() {
        Ok(hash) => println!("  Sha256: {}", hash),
        Err(e) => eprintln!("error: {:?}", e),
    }
}
