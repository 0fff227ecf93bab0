// shpdump - print the records of a shapefile as a GeoJSON FeatureCollection

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use shptiles::shapefile::{Decimation, ReaderOptions, ShapefileReader};

#[derive(Parser, Debug)]
#[command(name = "shpdump", version, about = "Print shapefile records as GeoJSON")]
struct Args {
    /// Path to the .shp file; the .shx next to it is used when present
    path: PathBuf,

    /// Fail on header inconsistencies instead of warning
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Drop Z values
    #[arg(long, default_value_t = false)]
    flat: bool,

    /// Decimate lines, polygons and multipoints to this resolution
    #[arg(long, num_args = 2, value_names = ["RES_X", "RES_Y"])]
    decimate: Option<Vec<f64>>,

    /// Print only this record (0-based)
    #[arg(long)]
    record: Option<usize>,
}

impl Args {
    fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            strict: self.strict,
            read_3d: !self.flat,
            decimation: match self.decimate.as_deref() {
                Some([res_x, res_y]) => Some(Decimation::new(*res_x, *res_y)),
                _ => None,
            },
        }
    }
}

fn feature(id: i32, geometry: serde_json::Value) -> serde_json::Value {
    json!({
        "type": "Feature",
        "id": id,
        "properties": {},
        "geometry": geometry,
    })
}

fn run(args: Args) -> Result<(), shptiles::shapefile::ShapefileError> {
    let reader = ShapefileReader::open(&args.path, args.reader_options())?;
    let header = reader.header();
    log::info!(
        "{:?}: {} ({} bytes), bbox {:?}",
        args.path,
        header.shape_type,
        header.file_length,
        header.bbox.to_array()
    );

    let mut features = Vec::new();
    let mut skipped = 0usize;
    match args.record {
        Some(n) => {
            let record = reader.record(n)?;
            features.push(feature(n as i32 + 1, record.to_geojson()));
        }
        None => {
            for entry in reader.records() {
                match entry {
                    Ok(entry) => {
                        features.push(feature(entry.record_number, entry.record.to_geojson()))
                    }
                    Err(_) => skipped += 1,
                }
            }
        }
    }
    if skipped > 0 {
        log::warn!("{} records could not be decoded", skipped);
    }

    let collection = json!({
        "type": "FeatureCollection",
        "bbox": header.bbox.to_array(),
        "features": features,
    });
    println!("{}", serde_json::to_string_pretty(&collection).unwrap_or_default());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("shpdump: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let args = Args::try_parse_from([
            "shpdump", "roads.shp", "--strict", "--flat", "--decimate", "0.5", "2", "--record", "3",
        ])
        .unwrap();
        assert_eq!(args.path, PathBuf::from("roads.shp"));
        assert_eq!(args.record, Some(3));
        let options = args.reader_options();
        assert!(options.strict);
        assert!(!options.read_3d);
        assert!(options.decimation.is_some());
    }

    #[test]
    fn test_defaults_and_bad_input() {
        let options = Args::try_parse_from(["shpdump", "a.shp"]).unwrap().reader_options();
        assert!(!options.strict);
        assert!(options.read_3d);
        assert!(options.decimation.is_none());

        assert!(Args::try_parse_from(["shpdump"]).is_err());
        assert!(Args::try_parse_from(["shpdump", "a.shp", "--decimate", "1"]).is_err());
        assert!(Args::try_parse_from(["shpdump", "a.shp", "--record", "x"]).is_err());
    }
}
